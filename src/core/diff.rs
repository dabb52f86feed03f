//! 差异引擎 - 对比两份快照并分类每个路径
//!
//! 纯函数，无 I/O 无副作用。对比范围以 current 中实际出现的数据集为准：
//! 本次运行未涉及的数据集不会产生虚假的 removed。

use crate::state::models::{
    ChangeSet, DatasetChanges, DatasetSnapshot, FileRecord, FileStatus, Snapshot,
};
use chrono::{DateTime, Utc};

/// 对比单个数据集的新旧文件集合
///
/// 输出序列按路径排序，三类互不相交
pub fn diff_dataset(
    previous: Option<&DatasetSnapshot>,
    current: &DatasetSnapshot,
) -> DatasetChanges {
    let mut changes = DatasetChanges::default();

    for (path, record) in current {
        match previous.and_then(|p| p.get(path)) {
            None => changes.added.push(path.clone()),
            Some(prev) if prev.fingerprint != record.fingerprint => {
                changes.modified.push(path.clone())
            }
            Some(_) => {} // unchanged 不进入变更集
        }
    }

    if let Some(previous) = previous {
        for path in previous.keys() {
            if !current.contains_key(path) {
                changes.removed.push(path.clone());
            }
        }
    }

    // BTreeMap 迭代本身有序，这里兜底保证确定性
    changes.added.sort();
    changes.modified.sort();
    changes.removed.sort();
    changes
}

/// 对比完整快照，首次运行（previous 为 None）时 current 全部视为 added
pub fn diff(previous: Option<&Snapshot>, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (name, files) in &current.datasets {
        let prev_files = previous.and_then(|p| p.datasets.get(name));
        changes
            .datasets
            .insert(name.clone(), diff_dataset(prev_files, files));
    }

    changes
}

/// 生成差异后的数据集快照
///
/// 每条记录带上本次计算出的状态；消失的文件保留为 removed 记录一个周期，
/// 等待显式清理。last_changed 在新增/变化时取数据集远端时间戳，
/// 未变化时沿用旧值。两个输入都不会被修改。
pub fn annotate_dataset(
    previous: Option<&DatasetSnapshot>,
    current: &DatasetSnapshot,
    dataset_version: DateTime<Utc>,
) -> DatasetSnapshot {
    let mut annotated = DatasetSnapshot::new();

    for (path, record) in current {
        let mut record = record.clone();
        match previous.and_then(|p| p.get(path)) {
            None => {
                record.status = FileStatus::Added;
                record.last_changed = Some(dataset_version);
            }
            Some(prev) if prev.fingerprint != record.fingerprint => {
                record.status = FileStatus::Modified;
                record.last_changed = Some(dataset_version);
            }
            Some(prev) => {
                record.status = FileStatus::Unchanged;
                record.last_changed = prev.last_changed.or(Some(dataset_version));
            }
        }
        annotated.insert(path.clone(), record);
    }

    if let Some(previous) = previous {
        for (path, prev) in previous {
            if !current.contains_key(path) {
                annotated.insert(
                    path.clone(),
                    FileRecord {
                        path: prev.path.clone(),
                        dataset: prev.dataset.clone(),
                        fingerprint: prev.fingerprint.clone(),
                        size_bytes: prev.size_bytes,
                        status: FileStatus::Removed,
                        last_changed: Some(dataset_version),
                    },
                );
            }
        }
    }

    annotated
}
