//! 持久化状态数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 文件生命周期状态
///
/// 仅由差异引擎在每次对比时重新计算，不是文件的固有属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// 本次更新中新增
    Added,
    /// 本次更新中内容发生变化
    Modified,
    /// 本次更新中消失（记录保留一个周期，等待显式清理）
    Removed,
    /// 存在且内容未变
    Unchanged,
}

impl Default for FileStatus {
    fn default() -> Self {
        FileStatus::Unchanged
    }
}

/// 单个被跟踪文件的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// 数据集内的相对路径，唯一标识
    pub path: String,
    /// 所属数据集名称
    pub dataset: String,
    /// 内容指纹（blake3 截断十六进制）
    pub fingerprint: String,
    /// 文件大小（字节），仅供展示，不参与相等判断
    pub size_bytes: u64,
    /// 最近一次差异计算得出的状态
    #[serde(default)]
    pub status: FileStatus,
    /// 文件新增或变化时对应的数据集远端时间戳
    #[serde(default)]
    pub last_changed: Option<DateTime<Utc>>,
}

/// 单个数据集的文件快照：相对路径 → 文件记录
pub type DatasetSnapshot = BTreeMap<String, FileRecord>;

/// 全部数据集在某一时刻的完整快照
///
/// 构建完成后不可变，差异计算不会修改快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 数据集名称 → 数据集快照
    pub datasets: BTreeMap<String, DatasetSnapshot>,
}

impl Snapshot {
    /// 快照中的文件总数
    pub fn file_count(&self) -> usize {
        self.datasets.values().map(|d| d.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.values().all(|d| d.is_empty())
    }
}

/// 单个远端归档的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// 数据集名称
    pub name: String,
    /// 仅在完整同步成功后更新的远端归档修改时间
    pub last_synced_remote_timestamp: DateTime<Utc>,
    /// 本地最近一次成功同步的时间
    pub last_sync_time: DateTime<Utc>,
    /// 压缩归档本身的内容哈希，仅作为额外的跳过信号
    #[serde(default)]
    pub archive_content_hash: Option<String>,
}

/// 单个数据集一次差异计算的结果
///
/// 三个序列互不相交，按路径排序
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetChanges {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl DatasetChanges {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.modified.is_empty() || !self.removed.is_empty()
    }
}

/// 一次运行产生的完整变更集，按数据集分组
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub datasets: BTreeMap<String, DatasetChanges>,
}

impl ChangeSet {
    pub fn total_added(&self) -> usize {
        self.datasets.values().map(|c| c.added.len()).sum()
    }

    pub fn total_modified(&self) -> usize {
        self.datasets.values().map(|c| c.modified.len()).sum()
    }

    pub fn total_removed(&self) -> usize {
        self.datasets.values().map(|c| c.removed.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.values().all(|c| !c.has_changes())
    }
}

/// 持久化的完整状态
///
/// 由状态存储独占所有权，其余组件只能获得只读视图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// 单调递增的状态版本号，每次成功保存加一
    pub version: u64,
    /// 数据集名称 → 数据集元数据
    pub datasets: BTreeMap<String, DatasetMetadata>,
    /// 最新的完整快照
    pub snapshot: Snapshot,
    /// 最近一次运行的变更集
    pub last_changes: ChangeSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(dataset: &str, path: &str, fp: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            dataset: dataset.to_string(),
            fingerprint: fp.to_string(),
            size_bytes: 10,
            status: FileStatus::Unchanged,
            last_changed: None,
        }
    }

    #[test]
    fn test_snapshot_file_count() {
        let mut snapshot = Snapshot::default();
        snapshot
            .datasets
            .entry("a".to_string())
            .or_default()
            .insert("f1".to_string(), record("a", "f1", "h1"));
        snapshot
            .datasets
            .entry("b".to_string())
            .or_default()
            .insert("f2".to_string(), record("b", "f2", "h2"));

        assert_eq!(snapshot.file_count(), 2);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_changeset_totals() {
        let mut changes = ChangeSet::default();
        changes.datasets.insert(
            "a".to_string(),
            DatasetChanges {
                added: vec!["f1".to_string(), "f2".to_string()],
                modified: vec!["f3".to_string()],
                removed: vec![],
            },
        );

        assert_eq!(changes.total_added(), 2);
        assert_eq!(changes.total_modified(), 1);
        assert_eq!(changes.total_removed(), 0);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_state_roundtrip() {
        let mut state = PersistedState::default();
        state.version = 3;
        state
            .snapshot
            .datasets
            .entry("a".to_string())
            .or_default()
            .insert("f1".to_string(), record("a", "f1", "h1"));

        let json = serde_json::to_string(&state).unwrap();
        let loaded: PersistedState = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, state);
    }
}
