//! 清理已删除文件 - 只作用于状态中确认为 removed 的记录，从不猜测

use crate::error::SyncError;
use crate::state::models::FileStatus;
use crate::state::store::StateStore;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// 清理结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    /// 被删除（或 dry_run 模式下将被删除）的数据集限定路径
    pub paths: Vec<String>,
    /// 从状态中清除的记录数
    pub removed_records: usize,
    /// 实际从磁盘删除的文件数
    pub deleted_files: usize,
    /// 发生清理的数据集
    pub datasets_pruned: Vec<String>,
    pub dry_run: bool,
}

/// 删除 removed 状态的文件并从状态中清除对应记录
///
/// dry_run 模式只报告，不触碰磁盘和状态；
/// 实际清理持有状态锁并以一次原子保存收尾
pub fn prune(
    store: &StateStore,
    extracted_root: &Path,
    dry_run: bool,
) -> Result<PruneReport, SyncError> {
    let _lock = if dry_run { None } else { Some(store.lock()?) };

    let mut state = match store.load() {
        Some(s) => s,
        None => {
            debug!("无历史状态，无需清理");
            return Ok(PruneReport {
                dry_run,
                ..Default::default()
            });
        }
    };

    let mut report = PruneReport {
        dry_run,
        ..Default::default()
    };

    for (dataset, files) in &state.snapshot.datasets {
        let removed: Vec<String> = files
            .iter()
            .filter(|(_, record)| record.status == FileStatus::Removed)
            .map(|(path, _)| path.clone())
            .collect();

        if removed.is_empty() {
            continue;
        }

        report.datasets_pruned.push(dataset.clone());
        for path in &removed {
            report.paths.push(format!("{}/{}", dataset, path));
        }
        report.removed_records += removed.len();
    }

    if dry_run {
        info!(
            "dry_run: {} 条 removed 记录, 涉及 {} 个数据集",
            report.removed_records,
            report.datasets_pruned.len()
        );
        return Ok(report);
    }

    for dataset in &report.datasets_pruned {
        let files = match state.snapshot.datasets.get_mut(dataset) {
            Some(f) => f,
            None => continue,
        };

        let removed: Vec<String> = files
            .iter()
            .filter(|(_, record)| record.status == FileStatus::Removed)
            .map(|(path, _)| path.clone())
            .collect();

        for path in removed {
            let on_disk = extracted_root.join(dataset).join(&path);
            if on_disk.exists() {
                match std::fs::remove_file(&on_disk) {
                    Ok(()) => report.deleted_files += 1,
                    Err(e) => warn!("磁盘文件删除失败: {:?} - {}", on_disk, e),
                }
            }
            files.remove(&path);
        }
    }

    state.version += 1;
    store.save(&state)?;

    info!(
        "清理完成: {} 条记录, {} 个磁盘文件, {} 个数据集",
        report.removed_records,
        report.deleted_files,
        report.datasets_pruned.len()
    );
    Ok(report)
}
