//! 远端协作方抽象接口
//!
//! 下载与解压的具体实现由外部提供，引擎只依赖这两个 trait

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 远端数据集条目（归档级元数据，无文件级信息）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDataset {
    /// 数据集名称
    pub name: String,
    /// 归档级修改时间（远端唯一可用的变化信号）
    pub last_modified: DateTime<Utc>,
}

/// 下载协作方接口
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// 列出远端全部数据集及其归档级修改时间
    async fn list_datasets(&self) -> Result<Vec<RemoteDataset>>;

    /// 下载指定数据集的完整归档
    async fn fetch(&self, name: &str) -> Result<Bytes>;

    /// 数据源名称（用于日志）
    fn name(&self) -> &str;
}

/// 解压协作方接口
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// 把归档内容解压到目标目录，返回解出的文件数
    async fn extract(&self, archive: Bytes, dest_dir: &Path) -> Result<usize>;
}
