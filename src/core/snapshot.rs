//! 快照构建器 - 遍历解压目录树并计算文件指纹

use crate::core::fingerprint::fingerprint_file;
use crate::state::models::{DatasetSnapshot, FileRecord, FileStatus, Snapshot};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 单个数据集的构建结果
#[derive(Debug, Default)]
pub struct DatasetBuildOutcome {
    /// 路径 → 文件记录（状态统一为 unchanged，由差异引擎改写）
    pub files: DatasetSnapshot,
    /// 不可读文件的告警信息（已从快照中排除，不致命）
    pub warnings: Vec<String>,
}

/// 快照构建器
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    /// 哈希计算的最大并发数
    max_hash_workers: usize,
}

impl SnapshotBuilder {
    pub fn new(max_hash_workers: usize) -> Self {
        Self {
            max_hash_workers: max_hash_workers.max(1),
        }
    }

    /// 构建单个数据集的快照
    ///
    /// 跳过目录与符号链接等非常规文件；单个文件不可读只产生告警，
    /// 不影响其余文件的构建
    pub async fn build_dataset(&self, dataset: &str, dir: &Path) -> Result<DatasetBuildOutcome> {
        let mut outcome = DatasetBuildOutcome::default();
        let mut candidates: Vec<(String, PathBuf, u64)> = Vec::new();
        let mut skipped = 0usize;

        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("遍历目录条目失败: {}", e);
                    outcome.warnings.push(format!("遍历目录条目失败: {}", e));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                if !entry.file_type().is_dir() {
                    skipped += 1;
                }
                continue;
            }

            let rel = match entry.path().strip_prefix(dir) {
                Ok(p) => p.to_string_lossy().replace('\\', "/"),
                Err(_) => continue,
            };

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            candidates.push((rel, entry.path().to_path_buf(), size));
        }

        debug!(
            "数据集 {} 发现 {} 个文件, {} 个非常规条目被跳过",
            dataset,
            candidates.len(),
            skipped
        );

        // 并发计算指纹，信号量限制同时打开的文件数
        let semaphore = Arc::new(Semaphore::new(self.max_hash_workers));
        let mut handles = Vec::with_capacity(candidates.len());

        for (rel, abs, size) in candidates {
            let permit = semaphore.clone().acquire_owned().await?;
            let handle = tokio::spawn(async move {
                let result = tokio::task::spawn_blocking(move || fingerprint_file(&abs)).await;
                drop(permit);
                (rel, size, result)
            });
            handles.push(handle);
        }

        let dataset_name = dataset.to_string();
        for handle in handles {
            let (rel, size, result) = handle.await?;
            match result {
                Ok(Ok(fingerprint)) => {
                    outcome.files.insert(
                        rel.clone(),
                        FileRecord {
                            path: rel,
                            dataset: dataset_name.clone(),
                            fingerprint,
                            size_bytes: size,
                            status: FileStatus::Unchanged,
                            last_changed: None,
                        },
                    );
                }
                Ok(Err(e)) => {
                    warn!("文件不可读，已从快照排除: {} - {}", rel, e);
                    outcome.warnings.push(format!("文件不可读: {} - {}", rel, e));
                }
                Err(e) => {
                    warn!("哈希任务失败: {} - {}", rel, e);
                    outcome.warnings.push(format!("哈希任务失败: {} - {}", rel, e));
                }
            }
        }

        info!(
            "数据集 {} 快照完成: {} 个文件, {} 条告警",
            dataset,
            outcome.files.len(),
            outcome.warnings.len()
        );
        Ok(outcome)
    }

    /// 构建整个解压根目录的快照（每个子目录视为一个数据集）
    pub async fn build(&self, root: &Path) -> Result<(Snapshot, Vec<String>)> {
        let mut snapshot = Snapshot::default();
        let mut warnings = Vec::new();

        let mut dataset_dirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dataset_dirs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }
        dataset_dirs.sort();

        for (name, dir) in dataset_dirs {
            let outcome = self.build_dataset(&name, &dir).await?;
            warnings.extend(outcome.warnings);
            snapshot.datasets.insert(name, outcome.files);
        }

        Ok((snapshot, warnings))
    }
}
