//! 路径录制器
//!
//! 打开时写入表头；每次 `append` 写一行并立即 flush，进程被异常终止时
//! 已追加的行不会丢失。
//!
//! 时间戳单调性：若系统时钟回拨，新行沿用上一行的时间戳，
//! 保证日志中的时间戳非递减。

use crate::error::StorageError;
use crate::path_log::{PATH_LOG_HEADER, TimestampedCommand};
use crate::timestamp::epoch_seconds;
use linebot_protocol::Command;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct PathRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    name: String,
    rows: usize,
    last_timestamp: Option<f64>,
}

impl PathRecorder {
    /// 创建日志文件并写入表头（已存在的同名文件会被覆盖）
    pub fn create(name: impl Into<String>, path: &Path) -> Result<Self, StorageError> {
        let file = File::create(path).map_err(|e| StorageError::io("create", path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", PATH_LOG_HEADER)
            .and_then(|_| writer.flush())
            .map_err(|e| StorageError::io("write header to", path, e))?;

        let name = name.into();
        info!("Path logging started: {} -> {}", name, path.display());

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            name,
            rows: 0,
            last_timestamp: None,
        })
    }

    /// 追加一行并 flush
    pub fn append(&mut self, mut entry: TimestampedCommand) -> Result<(), StorageError> {
        if let Some(last) = self.last_timestamp
            && (entry.timestamp.is_nan() || entry.timestamp < last)
        {
            warn!(
                "Clock went backwards ({:.6} < {:.6}), reusing previous timestamp",
                entry.timestamp, last
            );
            entry.timestamp = last;
        }

        writeln!(self.writer, "{}", entry.to_row())
            .and_then(|_| self.writer.flush())
            .map_err(|e| StorageError::io("append to", &self.path, e))?;

        self.last_timestamp = Some(entry.timestamp);
        self.rows += 1;
        debug!("Recorded {} at {:.6}", entry.command, entry.timestamp);
        Ok(())
    }

    /// 以当前时间追加命令
    pub fn record(&mut self, command: Command) -> Result<(), StorageError> {
        self.append(TimestampedCommand::new(epoch_seconds(), command))
    }

    /// 关闭日志，返回已写入的行数
    pub fn close(mut self) -> Result<usize, StorageError> {
        self.writer
            .flush()
            .map_err(|e| StorageError::io("flush", &self.path, e))?;
        info!(
            "Path saved: {} ({} rows) -> {}",
            self.name,
            self.rows,
            self.path.display()
        );
        Ok(self.rows)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
