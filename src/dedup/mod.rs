// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// 持久化错误类型
///
/// 对运行非致命：加载失败降级为空索引，保存失败仅告警
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O错误
    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 索引文件内容损坏
    #[error("Corrupt index file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// 去重索引
///
/// 已见指纹集合的唯一持有者，所有成员检查都经由内部锁串行化。
/// 对同一指纹的并发check_and_insert保证恰好一次返回true。
pub struct DedupIndex {
    seen: Mutex<HashSet<String>>,
    path: Option<PathBuf>,
}

impl DedupIndex {
    /// 创建仅内存的索引，不做持久化
    pub fn in_memory() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            path: None,
        }
    }

    /// 从磁盘加载索引
    ///
    /// 文件不存在时从空索引开始。文件损坏或不可读时同样从空
    /// 索引开始并告警——数据丢失是可接受的降级，而不是启动失败。
    pub fn load(path: &Path) -> Self {
        let seen = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(fingerprints) => {
                    let set: HashSet<String> = fingerprints.into_iter().collect();
                    info!("Loaded {} fingerprints from {}", set.len(), path.display());
                    set
                }
                Err(e) => {
                    warn!(
                        "Corrupt dedup index at {}, starting empty: {}",
                        path.display(),
                        e
                    );
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                warn!(
                    "Failed to read dedup index at {}, starting empty: {}",
                    path.display(),
                    e
                );
                HashSet::new()
            }
        };

        Self {
            seen: Mutex::new(seen),
            path: Some(path.to_path_buf()),
        }
    }

    /// 原子的检查并插入
    ///
    /// # 参数
    ///
    /// * `fingerprint` - 文章指纹
    ///
    /// # 返回值
    ///
    /// 首次见到该指纹时返回true，否则返回false
    pub fn check_and_insert(&self, fingerprint: &str) -> bool {
        self.seen.lock().insert(fingerprint.to_string())
    }

    /// 索引中的指纹数量
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// 索引是否为空
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    /// 将索引写回磁盘
    ///
    /// 先写临时文件再原子重命名，避免中断产生半写状态。
    /// 仅内存索引直接返回成功。
    pub fn persist(&self) -> Result<(), PersistenceError> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let fingerprints: Vec<String> = {
            let seen = self.seen.lock();
            seen.iter().cloned().collect()
        };

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, serde_json::to_vec(&fingerprints)?)?;
        std::fs::rename(&tmp_path, path)?;

        info!(
            "Persisted {} fingerprints to {}",
            fingerprints.len(),
            path.display()
        );
        Ok(())
    }
}
