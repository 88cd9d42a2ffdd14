//! 路径存储
//!
//! 所有路径保存在同一个目录下，每条路径一个文件，由用户提供的名称索引：
//!
//! ```text
//! paths/
//! ├── kitchen.csv          # 路径日志
//! └── kitchen.cycles.csv   # 扩展日志（可选）
//! ```

use crate::cycle_log::CycleLogger;
use crate::error::StorageError;
use crate::path_log::PathLog;
use crate::recorder::PathRecorder;
use std::fs;
use std::path::{Path, PathBuf};

const PATH_EXT: &str = "csv";
const CYCLE_SUFFIX: &str = ".cycles.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStore {
    dir: PathBuf,
}

impl PathStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 校验路径名称
    pub fn validate_name(name: &str) -> Result<(), StorageError> {
        let invalid = |reason| {
            Err(StorageError::InvalidName {
                name: name.to_string(),
                reason,
            })
        };

        if name.trim().is_empty() {
            return invalid("must not be empty");
        }
        if name.contains(['/', '\\']) {
            return invalid("must not contain path separators");
        }
        if name == "." || name == ".." {
            return invalid("must not be a relative directory");
        }
        if name.ends_with(".cycles") {
            return invalid("the .cycles suffix is reserved");
        }
        Ok(())
    }

    /// 名称对应的路径日志文件
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        Self::validate_name(name)?;
        Ok(self.dir.join(format!("{}.{}", name, PATH_EXT)))
    }

    /// 名称对应的扩展日志文件
    pub fn cycle_log_path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        Self::validate_name(name)?;
        Ok(self.dir.join(format!("{}{}", name, CYCLE_SUFFIX)))
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io("create directory", &self.dir, e))
    }

    /// 为新路径创建录制器
    pub fn create_recorder(&self, name: &str) -> Result<PathRecorder, StorageError> {
        let path = self.path_for(name)?;
        self.ensure_dir()?;
        PathRecorder::create(name, &path)
    }

    /// 创建扩展日志
    pub fn create_cycle_logger(&self, name: &str) -> Result<CycleLogger, StorageError> {
        let path = self.cycle_log_path_for(name)?;
        self.ensure_dir()?;
        CycleLogger::create(&path)
    }

    /// 加载已保存的路径
    pub fn load(&self, name: &str) -> Result<PathLog, StorageError> {
        let path = self.path_for(name)?;
        PathLog::load(name, &path)
    }

    /// 列出已保存的路径名称（按名称排序）
    ///
    /// 目录不存在时返回空列表。
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io("list", &self.dir, e)),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|file| !file.ends_with(CYCLE_SUFFIX))
            .filter_map(|file| {
                file.strip_suffix(&format!(".{}", PATH_EXT)).map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}
