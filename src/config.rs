//! 同步配置模块
//!
//! 配置是显式传入的值，沿调用链向下传递，不存在进程级隐式状态

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// 数据集名称过滤（子串匹配，None 表示全部）
    #[serde(default)]
    pub dataset_filter: Option<String>,
    /// 原始归档下载目录
    #[serde(default = "default_raw_data_dir")]
    pub raw_data_dir: PathBuf,
    /// 解压后的语料目录（每个数据集一个子目录）
    #[serde(default = "default_extracted_data_dir")]
    pub extracted_data_dir: PathBuf,
    /// 状态文件路径
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// 哈希计算最大并发数
    #[serde(default = "default_hash_workers")]
    pub max_hash_workers: usize,
    /// 数据集下载最大并发数
    #[serde(default = "default_download_concurrency")]
    pub max_download_concurrency: usize,
    /// 单数据集不可读文件容忍上限（0 表示不限制）
    #[serde(default)]
    pub max_unreadable_files: usize,
    /// 忽略时间戳，无条件重新抓取全部数据集
    #[serde(default)]
    pub force: bool,
}

fn default_raw_data_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_extracted_data_dir() -> PathBuf {
    PathBuf::from("data/extracted")
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_hash_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.clamp(1, 32)
}

fn default_download_concurrency() -> usize {
    4
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            dataset_filter: None,
            raw_data_dir: default_raw_data_dir(),
            extracted_data_dir: default_extracted_data_dir(),
            state_file: default_state_file(),
            max_hash_workers: default_hash_workers(),
            max_download_concurrency: default_download_concurrency(),
            max_unreadable_files: 0,
            force: false,
        }
    }
}

impl SyncSettings {
    /// 从 JSON 配置文件加载，文件缺失或无法解析时回退到默认值
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(settings) = serde_json::from_str::<SyncSettings>(&content) {
                    return settings;
                }
            }
        }
        Self::default()
    }

    /// 保存配置到 JSON 文件
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
    }
}
