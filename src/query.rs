//! 查询服务 - 对持久化状态的只读过滤与聚合
//!
//! 所有查询都基于一次 load() 得到的同一份状态，查询过程中不重新读取

use crate::state::models::{FileRecord, FileStatus, PersistedState};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// 状态过滤条件
///
/// changed 是查询层概念（added ∪ modified），不会被持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Added,
    Modified,
    Removed,
    Unchanged,
    Changed,
}

impl StatusFilter {
    pub fn matches(&self, status: FileStatus) -> bool {
        match self {
            StatusFilter::Added => status == FileStatus::Added,
            StatusFilter::Modified => status == FileStatus::Modified,
            StatusFilter::Removed => status == FileStatus::Removed,
            StatusFilter::Unchanged => status == FileStatus::Unchanged,
            StatusFilter::Changed => {
                status == FileStatus::Added || status == FileStatus::Modified
            }
        }
    }

    /// 解析用户输入的状态名
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "added" => Some(StatusFilter::Added),
            "modified" => Some(StatusFilter::Modified),
            "removed" => Some(StatusFilter::Removed),
            "unchanged" => Some(StatusFilter::Unchanged),
            "changed" => Some(StatusFilter::Changed),
            _ => None,
        }
    }
}

/// 文件查询条件
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// 按状态过滤
    pub status: Option<StatusFilter>,
    /// 按数据集名称过滤（子串匹配）
    pub dataset: Option<String>,
    /// 按路径正则过滤
    pub pattern: Option<Regex>,
    /// 最大返回条数
    pub limit: Option<usize>,
}

/// 单数据集统计
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total: usize,
    pub added: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// 非 removed 文件的总大小
    pub total_size: u64,
}

/// 按条件查询文件记录，结果按数据集、路径排序
pub fn filter_files(state: &PersistedState, filter: &QueryFilter) -> Vec<FileRecord> {
    let mut results = Vec::new();

    'outer: for (dataset, files) in &state.snapshot.datasets {
        if let Some(wanted) = &filter.dataset {
            if !dataset.contains(wanted.as_str()) {
                continue;
            }
        }

        for (path, record) in files {
            if let Some(status) = &filter.status {
                if !status.matches(record.status) {
                    continue;
                }
            }
            if let Some(pattern) = &filter.pattern {
                if !pattern.is_match(path) {
                    continue;
                }
            }

            results.push(record.clone());
            if let Some(limit) = filter.limit {
                if results.len() >= limit {
                    break 'outer;
                }
            }
        }
    }

    results
}

/// 按数据集聚合各状态的文件数与总大小
pub fn aggregate(state: &PersistedState) -> BTreeMap<String, DatasetStats> {
    let mut stats = BTreeMap::new();

    for (dataset, files) in &state.snapshot.datasets {
        let entry: &mut DatasetStats = stats.entry(dataset.clone()).or_default();
        entry.total = files.len();

        for record in files.values() {
            match record.status {
                FileStatus::Added => entry.added += 1,
                FileStatus::Modified => entry.modified += 1,
                FileStatus::Unchanged => entry.unchanged += 1,
                FileStatus::Removed => entry.removed += 1,
            }
            if record.status != FileStatus::Removed {
                entry.total_size += record.size_bytes;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::PersistedState;

    fn record(dataset: &str, path: &str, status: FileStatus, size: u64) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            dataset: dataset.to_string(),
            fingerprint: "h".to_string(),
            size_bytes: size,
            status,
            last_changed: None,
        }
    }

    fn sample_state() -> PersistedState {
        let mut state = PersistedState::default();
        let laws = state.snapshot.datasets.entry("laws".to_string()).or_default();
        laws.insert("a.xml".to_string(), record("laws", "a.xml", FileStatus::Added, 10));
        laws.insert("b.xml".to_string(), record("laws", "b.xml", FileStatus::Modified, 20));
        laws.insert("c.xml".to_string(), record("laws", "c.xml", FileStatus::Unchanged, 30));
        let regs = state.snapshot.datasets.entry("regs".to_string()).or_default();
        regs.insert("d.xml".to_string(), record("regs", "d.xml", FileStatus::Removed, 40));
        state
    }

    #[test]
    fn test_filter_by_status() {
        let state = sample_state();
        let results = filter_files(
            &state,
            &QueryFilter {
                status: Some(StatusFilter::Added),
                ..Default::default()
            },
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "a.xml");
    }

    #[test]
    fn test_changed_meta_filter() {
        let state = sample_state();
        let results = filter_files(
            &state,
            &QueryFilter {
                status: Some(StatusFilter::Changed),
                ..Default::default()
            },
        );
        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.xml", "b.xml"]);
    }

    #[test]
    fn test_filter_by_dataset_substring_and_pattern() {
        let state = sample_state();
        let results = filter_files(
            &state,
            &QueryFilter {
                dataset: Some("reg".to_string()),
                pattern: Some(Regex::new(r"\.xml$").unwrap()),
                ..Default::default()
            },
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].dataset, "regs");
    }

    #[test]
    fn test_limit_caps_results() {
        let state = sample_state();
        let results = filter_files(
            &state,
            &QueryFilter {
                limit: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_aggregate_counts_and_size() {
        let state = sample_state();
        let stats = aggregate(&state);

        let laws = &stats["laws"];
        assert_eq!(laws.total, 3);
        assert_eq!(laws.added, 1);
        assert_eq!(laws.modified, 1);
        assert_eq!(laws.unchanged, 1);
        assert_eq!(laws.total_size, 60);

        // removed 文件不计入 total_size
        let regs = &stats["regs"];
        assert_eq!(regs.removed, 1);
        assert_eq!(regs.total_size, 0);
    }

    #[test]
    fn test_status_filter_parse() {
        assert_eq!(StatusFilter::parse("Added"), Some(StatusFilter::Added));
        assert_eq!(StatusFilter::parse("changed"), Some(StatusFilter::Changed));
        assert_eq!(StatusFilter::parse("bogus"), None);
    }
}
