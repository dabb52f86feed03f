//! 状态持久化 - 原子替换写入与进程级建议锁
//!
//! 保存流程：先把完整新状态写入同目录临时文件并落盘，
//! 再原子重命名覆盖旧文件。任何时刻崩溃，旧状态都完整可读。

use crate::error::SyncError;
use crate::state::models::PersistedState;
use scopeguard::ScopeGuard;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 状态存储管理器
pub struct StateStore {
    path: PathBuf,
}

/// 建议锁守卫，释放时删除锁文件（任何退出路径都会执行）
pub struct StateLock {
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 锁文件路径：状态文件旁的 `<name>.lock`
    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// 临时文件路径：状态文件旁的 `<name>.tmp`
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// 获取单写者建议锁
    ///
    /// 锁已被持有时立即失败，避免多个计划任务互相阻塞
    pub fn lock(&self) -> Result<StateLock, SyncError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = self.lock_path();
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                debug!("已获取状态锁: {:?}", lock_path);
                Ok(StateLock { path: lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(SyncError::ConcurrentWriteConflict(lock_path))
            }
            Err(e) => Err(SyncError::StateWrite(e)),
        }
    }

    /// 加载最近一次完整提交的状态
    ///
    /// 文件缺失、不可读或损坏都视为无历史状态（告警后按首次运行处理），
    /// 读取方不会观察到半新半旧的内容
    pub fn load(&self) -> Option<PersistedState> {
        if !self.path.exists() {
            debug!("状态文件不存在，按首次运行处理: {:?}", self.path);
            return None;
        }

        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) => {
                warn!("状态文件读取失败，按无历史状态处理: {:?} - {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_slice::<PersistedState>(&data) {
            Ok(state) => {
                debug!(
                    "已加载状态 version={}, {} 个数据集, {} 个文件",
                    state.version,
                    state.datasets.len(),
                    state.snapshot.file_count()
                );
                Some(state)
            }
            Err(e) => {
                warn!("状态文件损坏，按无历史状态处理: {:?} - {}", self.path, e);
                None
            }
        }
    }

    /// 原子保存完整状态
    ///
    /// 临时文件写入或重命名失败时旧状态保持不变，临时文件被清理
    pub fn save(&self, state: &PersistedState) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        // 失败时清理残留的临时文件
        let cleanup = scopeguard::guard(temp_path.clone(), |p| {
            let _ = fs::remove_file(&p);
        });

        let mut payload = serde_json::to_vec_pretty(state)?;
        payload.push(b'\n');

        let mut file = File::create(&temp_path)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        ScopeGuard::into_inner(cleanup);

        debug!(
            "状态已保存 version={}, {} 个文件 -> {:?}",
            state.version,
            state.snapshot.file_count(),
            self.path
        );
        Ok(())
    }
}
