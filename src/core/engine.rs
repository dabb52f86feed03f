//! 同步协调器 - 串联抓取决策、下载、解压、快照、差异与持久化
//!
//! 每个数据集独立走完自己的管线，彼此失败隔离；
//! 整次运行只在所有数据集到达终态后执行一次原子保存。

use crate::config::SyncSettings;
use crate::core::diff::{annotate_dataset, diff_dataset};
use crate::core::fingerprint::fingerprint_bytes;
use crate::core::gate::{datasets_needing_fetch, delisted_datasets};
use crate::core::snapshot::SnapshotBuilder;
use crate::error::SyncError;
use crate::remote::{ArchiveExtractor, RemoteDataset, RemoteSource};
use crate::state::models::{ChangeSet, DatasetChanges, DatasetMetadata, DatasetSnapshot};
use crate::state::store::StateStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// 数据集管线阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStage {
    Fetching,
    Extracting,
    Snapshotting,
    Diffing,
}

/// 同步运行报告
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 成功同步（含归档哈希未变而跳过解压）的数据集数
    pub datasets_synced: u32,
    pub datasets_failed: u32,
    /// 无需更新或被取消而未处理的数据集数
    pub datasets_skipped: u32,
    /// 本次运行的完整变更集
    pub changes: ChangeSet,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// 单个数据集管线的终态
enum DatasetOutcome {
    /// 完整走完管线，携带待合并的快照、变更与元数据
    Synced {
        name: String,
        files: DatasetSnapshot,
        changes: DatasetChanges,
        meta: DatasetMetadata,
        warnings: Vec<String>,
    },
    /// 归档内容哈希与上次一致，仅推进元数据
    SkippedIdentical { name: String, meta: DatasetMetadata },
    /// 被取消，本次不提交
    Cancelled { name: String, stage: SyncStage },
    /// 管线失败，旧状态保持不变，下次运行自动重试
    Failed {
        name: String,
        stage: SyncStage,
        error: SyncError,
    },
}

/// 传给数据集管线任务的上下文
struct DatasetContext {
    dataset: RemoteDataset,
    remote: Arc<dyn RemoteSource>,
    extractor: Arc<dyn ArchiveExtractor>,
    prior_files: Option<DatasetSnapshot>,
    prior_meta: Option<DatasetMetadata>,
    raw_dir: PathBuf,
    extracted_root: PathBuf,
    builder: SnapshotBuilder,
    unreadable_limit: usize,
    force: bool,
    cancelled: Arc<AtomicBool>,
}

/// 同步引擎
pub struct SyncEngine {
    settings: SyncSettings,
    store: StateStore,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(settings: SyncSettings) -> Self {
        let store = StateStore::new(settings.state_file.clone());
        Self {
            settings,
            store,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// 请求取消：进行中的管线完成当前阶段后停止，不提交该数据集
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 运行一次完整同步
    ///
    /// 状态存储级错误（锁冲突、写入失败）中止整次运行并保持旧状态；
    /// 单个数据集的失败只隔离到该数据集，记录在报告中
    pub async fn sync(
        &self,
        remote: Arc<dyn RemoteSource>,
        extractor: Arc<dyn ArchiveExtractor>,
    ) -> Result<SyncReport, SyncError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("开始同步运行 {} (源: {})", run_id, remote.name());

        self.cancelled.store(false, Ordering::SeqCst);

        // 整次运行持有单写者锁，任何退出路径都会释放
        let _lock = self.store.lock()?;
        let previous = self.store.load();

        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let remote_list = match remote.list_datasets().await {
            Ok(list) => list,
            Err(e) => {
                return Err(SyncError::TransientFetch {
                    dataset: remote.name().to_string(),
                    cause: e,
                })
            }
        };

        // 远端下线的数据集只告警，不自动清理
        if let Some(prev) = &previous {
            for name in delisted_datasets(&remote_list, &prev.datasets) {
                warn!("数据集已从远端下线，保留本地记录: {}", name);
                warnings.push(format!("数据集已从远端下线，保留本地记录: {}", name));
            }
        }

        let filtered: Vec<RemoteDataset> = match &self.settings.dataset_filter {
            Some(filter) => remote_list
                .iter()
                .filter(|d| d.name.contains(filter.as_str()))
                .cloned()
                .collect(),
            None => remote_list.clone(),
        };

        let empty_meta = BTreeMap::new();
        let prev_meta = previous.as_ref().map(|p| &p.datasets).unwrap_or(&empty_meta);
        let to_update = datasets_needing_fetch(&filtered, prev_meta, self.settings.force);
        let mut datasets_skipped = (filtered.len() - to_update.len()) as u32;

        info!(
            "远端 {} 个数据集, 过滤后 {} 个, 需要更新 {} 个",
            remote_list.len(),
            filtered.len(),
            to_update.len()
        );

        if to_update.is_empty() {
            return Ok(SyncReport {
                run_id,
                started_at,
                finished_at: Utc::now(),
                datasets_synced: 0,
                datasets_failed: 0,
                datasets_skipped,
                changes: ChangeSet::default(),
                warnings,
                errors,
            });
        }

        // 每个数据集一条独立管线，信号量限制同时进行的下载数
        let semaphore = Arc::new(Semaphore::new(self.settings.max_download_concurrency.max(1)));
        let builder = SnapshotBuilder::new(self.settings.max_hash_workers);
        let mut handles = Vec::with_capacity(to_update.len());

        for dataset in to_update {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let ctx = DatasetContext {
                prior_files: previous
                    .as_ref()
                    .and_then(|p| p.snapshot.datasets.get(&dataset.name).cloned()),
                prior_meta: previous
                    .as_ref()
                    .and_then(|p| p.datasets.get(&dataset.name).cloned()),
                dataset,
                remote: remote.clone(),
                extractor: extractor.clone(),
                raw_dir: self.settings.raw_data_dir.clone(),
                extracted_root: self.settings.extracted_data_dir.clone(),
                builder: builder.clone(),
                unreadable_limit: self.settings.max_unreadable_files,
                force: self.settings.force,
                cancelled: self.cancelled.clone(),
            };

            handles.push(tokio::spawn(async move {
                let outcome = run_dataset(ctx).await;
                drop(permit);
                outcome
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("数据集任务异常: {}", e);
                    errors.push(format!("数据集任务异常: {}", e));
                }
            }
        }

        // 合并而非替换：未参与本次运行的数据集保留上次持久化的记录
        let mut new_state = previous.clone().unwrap_or_default();
        new_state.version += 1;

        let mut changes = ChangeSet::default();
        let mut datasets_synced = 0u32;
        let mut datasets_failed = 0u32;

        for outcome in outcomes {
            match outcome {
                DatasetOutcome::Synced {
                    name,
                    files,
                    changes: dataset_changes,
                    meta,
                    warnings: dataset_warnings,
                } => {
                    datasets_synced += 1;
                    warnings.extend(dataset_warnings);
                    new_state.snapshot.datasets.insert(name.clone(), files);
                    new_state.datasets.insert(name.clone(), meta);
                    changes.datasets.insert(name, dataset_changes);
                }
                DatasetOutcome::SkippedIdentical { name, meta } => {
                    datasets_synced += 1;
                    info!("归档内容未变，仅推进元数据: {}", name);
                    new_state.datasets.insert(name, meta);
                }
                DatasetOutcome::Cancelled { name, stage } => {
                    datasets_skipped += 1;
                    warn!("数据集 {} 在 {:?} 阶段被取消，本次未提交", name, stage);
                    warnings.push(format!("数据集 {} 在 {:?} 阶段被取消，本次未提交", name, stage));
                }
                DatasetOutcome::Failed { name, stage, error } => {
                    datasets_failed += 1;
                    error!("数据集 {} 在 {:?} 阶段失败: {}", name, stage, error);
                    errors.push(format!("数据集 {} 在 {:?} 阶段失败: {}", name, stage, error));
                }
            }
        }

        new_state.last_changes = changes.clone();

        // 有疑问不提交：没有任何可提交的结果时不触碰旧状态
        if datasets_synced > 0 {
            self.store.save(&new_state)?;
        }

        let finished_at = Utc::now();
        info!(
            "同步运行完成 {}: 成功 {}, 失败 {}, 跳过 {}, 新增 {}, 修改 {}, 删除 {}",
            run_id,
            datasets_synced,
            datasets_failed,
            datasets_skipped,
            changes.total_added(),
            changes.total_modified(),
            changes.total_removed()
        );

        Ok(SyncReport {
            run_id,
            started_at,
            finished_at,
            datasets_synced,
            datasets_failed,
            datasets_skipped,
            changes,
            warnings,
            errors,
        })
    }
}

/// 单个数据集的完整管线：下载 → 解压 → 快照 → 差异
///
/// 阶段之间检查取消标志；每个阶段的失败立即终结该数据集
async fn run_dataset(ctx: DatasetContext) -> DatasetOutcome {
    let name = ctx.dataset.name.clone();

    if ctx.cancelled.load(Ordering::SeqCst) {
        return DatasetOutcome::Cancelled {
            name,
            stage: SyncStage::Fetching,
        };
    }

    debug!("开始下载数据集: {}", name);
    let archive = match ctx.remote.fetch(&name).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = SyncError::TransientFetch {
                dataset: name.clone(),
                cause: e,
            };
            return DatasetOutcome::Failed {
                name,
                stage: SyncStage::Fetching,
                error,
            };
        }
    };

    // 保留原始归档，便于排查与重放；写入失败不影响管线
    let raw_path = ctx.raw_dir.join(format!("{}.archive", name));
    if let Err(e) = write_raw_archive(&raw_path, &archive).await {
        warn!("原始归档写入失败: {:?} - {}", raw_path, e);
    }

    let archive_hash = fingerprint_bytes(&archive);

    // 归档内容哈希与上次一致，跳过解压和差异计算，只推进时间戳
    if !ctx.force {
        if let Some(prior) = &ctx.prior_meta {
            if prior.archive_content_hash.as_deref() == Some(archive_hash.as_str()) {
                return DatasetOutcome::SkippedIdentical {
                    meta: dataset_meta(&name, ctx.dataset.last_modified, archive_hash),
                    name,
                };
            }
        }
    }

    if ctx.cancelled.load(Ordering::SeqCst) {
        return DatasetOutcome::Cancelled {
            name,
            stage: SyncStage::Extracting,
        };
    }

    let dest_dir = ctx.extracted_root.join(&name);
    match ctx.extractor.extract(archive, &dest_dir).await {
        Ok(count) => debug!("数据集 {} 解压完成: {} 个文件", name, count),
        Err(e) => {
            let error = SyncError::Extraction {
                dataset: name.clone(),
                cause: e,
            };
            return DatasetOutcome::Failed {
                name,
                stage: SyncStage::Extracting,
                error,
            };
        }
    }

    if ctx.cancelled.load(Ordering::SeqCst) {
        return DatasetOutcome::Cancelled {
            name,
            stage: SyncStage::Snapshotting,
        };
    }

    let build = match ctx.builder.build_dataset(&name, &dest_dir).await {
        Ok(b) => b,
        Err(e) => {
            let error = SyncError::Snapshot {
                dataset: name.clone(),
                cause: e,
            };
            return DatasetOutcome::Failed {
                name,
                stage: SyncStage::Snapshotting,
                error,
            };
        }
    };

    if ctx.unreadable_limit > 0 && build.warnings.len() > ctx.unreadable_limit {
        let error = SyncError::TooManyUnreadable {
            dataset: name.clone(),
            count: build.warnings.len(),
            limit: ctx.unreadable_limit,
        };
        return DatasetOutcome::Failed {
            name,
            stage: SyncStage::Snapshotting,
            error,
        };
    }

    if ctx.cancelled.load(Ordering::SeqCst) {
        return DatasetOutcome::Cancelled {
            name,
            stage: SyncStage::Diffing,
        };
    }

    let changes = diff_dataset(ctx.prior_files.as_ref(), &build.files);
    let files = annotate_dataset(ctx.prior_files.as_ref(), &build.files, ctx.dataset.last_modified);

    debug!(
        "数据集 {} 差异: 新增 {}, 修改 {}, 删除 {}",
        name,
        changes.added.len(),
        changes.modified.len(),
        changes.removed.len()
    );

    DatasetOutcome::Synced {
        meta: dataset_meta(&name, ctx.dataset.last_modified, archive_hash),
        name,
        files,
        changes,
        warnings: build.warnings,
    }
}

fn dataset_meta(name: &str, remote_timestamp: DateTime<Utc>, archive_hash: String) -> DatasetMetadata {
    DatasetMetadata {
        name: name.to_string(),
        last_synced_remote_timestamp: remote_timestamp,
        last_sync_time: Utc::now(),
        archive_content_hash: Some(archive_hash),
    }
}

async fn write_raw_archive(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await
}
