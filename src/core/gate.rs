//! 抓取决策 - 判断哪些远端数据集需要重新下载
//!
//! 纯元数据决策，本身不做任何网络 I/O

use crate::remote::RemoteDataset;
use crate::state::models::DatasetMetadata;
use std::collections::BTreeMap;

/// 返回需要重新抓取的数据集子集
///
/// 满足任一条件即重新抓取：无历史元数据、远端时间戳严格更新、强制刷新
pub fn datasets_needing_fetch(
    remote: &[RemoteDataset],
    previous: &BTreeMap<String, DatasetMetadata>,
    force: bool,
) -> Vec<RemoteDataset> {
    remote
        .iter()
        .filter(|dataset| {
            if force {
                return true;
            }
            match previous.get(&dataset.name) {
                None => true,
                Some(meta) => dataset.last_modified > meta.last_synced_remote_timestamp,
            }
        })
        .cloned()
        .collect()
}

/// 返回已从远端列表消失、但仍在本地状态中的数据集名称
///
/// 这些数据集只告警不自动清理（删除语义未确认前不做破坏性操作）
pub fn delisted_datasets(
    remote: &[RemoteDataset],
    previous: &BTreeMap<String, DatasetMetadata>,
) -> Vec<String> {
    previous
        .keys()
        .filter(|name| !remote.iter().any(|d| &d.name == *name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn meta(name: &str, synced: &str) -> DatasetMetadata {
        DatasetMetadata {
            name: name.to_string(),
            last_synced_remote_timestamp: ts(synced),
            last_sync_time: ts(synced),
            archive_content_hash: None,
        }
    }

    fn remote(name: &str, modified: &str) -> RemoteDataset {
        RemoteDataset {
            name: name.to_string(),
            last_modified: ts(modified),
        }
    }

    #[test]
    fn test_unknown_dataset_needs_fetch() {
        let result = datasets_needing_fetch(
            &[remote("a", "2024-01-01T00:00:00Z")],
            &BTreeMap::new(),
            false,
        );
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_strictly_newer_timestamp_triggers_fetch() {
        let mut previous = BTreeMap::new();
        previous.insert("a".to_string(), meta("a", "2024-01-01T00:00:00Z"));
        previous.insert("b".to_string(), meta("b", "2024-01-01T00:00:00Z"));
        previous.insert("c".to_string(), meta("c", "2024-06-01T00:00:00Z"));

        let remote_list = vec![
            remote("a", "2024-02-01T00:00:00Z"), // 更新
            remote("b", "2024-01-01T00:00:00Z"), // 相同
            remote("c", "2024-01-01T00:00:00Z"), // 更旧（不触发）
        ];

        let result = datasets_needing_fetch(&remote_list, &previous, false);
        let names: Vec<&str> = result.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_force_fetches_everything() {
        let mut previous = BTreeMap::new();
        previous.insert("a".to_string(), meta("a", "2024-01-01T00:00:00Z"));

        let result =
            datasets_needing_fetch(&[remote("a", "2024-01-01T00:00:00Z")], &previous, true);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_delisted_detection() {
        let mut previous = BTreeMap::new();
        previous.insert("kept".to_string(), meta("kept", "2024-01-01T00:00:00Z"));
        previous.insert("gone".to_string(), meta("gone", "2024-01-01T00:00:00Z"));

        let delisted = delisted_datasets(&[remote("kept", "2024-01-01T00:00:00Z")], &previous);
        assert_eq!(delisted, vec!["gone"]);
    }
}
