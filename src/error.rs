//! 错误类型定义
//!
//! 区分数据集级别错误（隔离到单个数据集）与状态存储级别错误（中止整次运行）

use std::path::PathBuf;
use thiserror::Error;

/// 同步错误分类
#[derive(Debug, Error)]
pub enum SyncError {
    /// 网络/超时错误，可由调用方在下次运行时重试
    #[error("下载数据集 {dataset} 失败: {cause}")]
    TransientFetch { dataset: String, cause: anyhow::Error },

    /// 归档损坏或不支持，仅该数据集本次运行失败
    #[error("解压数据集 {dataset} 失败: {cause}")]
    Extraction { dataset: String, cause: anyhow::Error },

    /// 快照构建失败（目录树整体不可用）
    #[error("构建数据集 {dataset} 快照失败: {cause}")]
    Snapshot { dataset: String, cause: anyhow::Error },

    /// 不可读文件数量超过容忍上限
    #[error("数据集 {dataset} 不可读文件过多: {count} 个（上限 {limit}）")]
    TooManyUnreadable {
        dataset: String,
        count: usize,
        limit: usize,
    },

    /// 另一个同步进程持有状态锁，本次运行立即失败
    #[error("状态文件已被其他进程锁定: {0:?}")]
    ConcurrentWriteConflict(PathBuf),

    /// 状态文件写入失败，整次运行中止，旧状态保持不变
    #[error("写入状态失败: {0}")]
    StateWrite(#[from] std::io::Error),

    /// 状态序列化失败
    #[error("状态序列化失败: {0}")]
    StateEncode(#[from] serde_json::Error),
}
