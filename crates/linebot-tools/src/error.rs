//! 存储错误类型

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// 文件系统操作失败
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 路径日志不存在
    #[error("Path log not found: {}", .0.display())]
    NotFound(PathBuf),

    /// 非法的路径名称
    #[error("Invalid path name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// 表头不匹配
    #[error("Malformed header in {}: expected {expected:?}, found {found:?}", .path.display())]
    MalformedHeader {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
}

impl StorageError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
