//! corpsync - 批量分发文档语料的本地镜像与增量变化检测引擎
//!
//! 远端只提供整包下载和归档级修改时间，没有文件级校验和。
//! 本引擎负责判断哪些归档需要重新抓取、为解压出的每个文件计算内容指纹、
//! 与上次持久化的快照对比得出 added/modified/removed/unchanged 分类，
//! 并以原子替换方式持久化新状态，保证崩溃不会破坏已有跟踪数据。
//!
//! 下载与解压由外部协作方实现（见 [`remote`] 中的 trait）。

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod query;
pub mod remote;
pub mod state;

pub use config::SyncSettings;
pub use crate::core::{prune, PruneReport, SnapshotBuilder, SyncEngine, SyncReport, SyncStage};
pub use error::SyncError;
pub use query::{aggregate, filter_files, DatasetStats, QueryFilter, StatusFilter};
pub use remote::{ArchiveExtractor, RemoteDataset, RemoteSource};
pub use state::{
    ChangeSet, DatasetChanges, DatasetMetadata, DatasetSnapshot, FileRecord, FileStatus,
    PersistedState, Snapshot, StateStore,
};
