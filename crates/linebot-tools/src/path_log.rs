//! # 路径日志格式
//!
//! 每条学习到的路径保存为一个文本文件：
//!
//! ```text
//! timestamp,command
//! 1718000000.000000,F
//! 1718000000.500000,L
//! 1718000001.200000,F
//! ```
//!
//! 只记录命令切换，不记录逐帧采样；回放时由相邻行的时间差重建节奏。

use crate::error::StorageError;
use crate::timestamp::delta_between;
use linebot_protocol::Command;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 表头
pub const PATH_LOG_HEADER: &str = "timestamp,command";

/// 带时间戳的命令（一行日志）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimestampedCommand {
    /// Unix 纪元秒
    pub timestamp: f64,
    pub command: Command,
}

impl TimestampedCommand {
    pub fn new(timestamp: f64, command: Command) -> Self {
        Self { timestamp, command }
    }

    /// 序列化为一行（不含换行）
    pub fn to_row(&self) -> String {
        format!("{:.6},{}", self.timestamp, self.command.symbol())
    }

    /// 解析一行；格式不对返回 `None`
    pub fn parse_row(row: &str) -> Option<Self> {
        let (ts, symbol) = row.trim().split_once(',')?;
        let timestamp = ts.trim().parse::<f64>().ok().filter(|t| t.is_finite())?;
        let command = Command::from_symbol(symbol).ok()?;
        Some(Self { timestamp, command })
    }
}

/// 内存中的路径日志
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathLog {
    /// 路径名称
    pub name: String,

    /// 按插入顺序排列的命令
    pub entries: Vec<TimestampedCommand>,

    /// 加载时跳过的无效行数
    pub skipped_rows: usize,
}

impl PathLog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            skipped_rows: 0,
        }
    }

    pub fn push(&mut self, entry: TimestampedCommand) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 首行到末行的时间跨度
    pub fn duration(&self) -> Option<Duration> {
        let first = self.entries.first()?;
        let last = self.entries.last()?;
        Some(delta_between(first.timestamp, last.timestamp))
    }

    /// 从文件加载
    ///
    /// 首行必须是表头；之后无法解析的行会被跳过并计入 `skipped_rows`。
    pub fn load(name: impl Into<String>, path: &Path) -> Result<Self, StorageError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.to_path_buf()));
            },
            Err(e) => return Err(StorageError::io("open", path, e)),
        };

        let mut log = PathLog::new(name);
        let mut lines = BufReader::new(file).lines();

        match lines.next() {
            // 空文件：没有表头也没有数据
            None => return Ok(log),
            Some(header) => {
                let header = header.map_err(|e| StorageError::io("read", path, e))?;
                if header.trim() != PATH_LOG_HEADER {
                    return Err(StorageError::MalformedHeader {
                        path: path.to_path_buf(),
                        expected: PATH_LOG_HEADER,
                        found: header,
                    });
                }
            },
        }

        for (index, line) in lines.enumerate() {
            let line = line.map_err(|e| StorageError::io("read", path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match TimestampedCommand::parse_row(&line) {
                Some(entry) => log.push(entry),
                None => {
                    // 行号从 1 开始，表头占第 1 行
                    warn!("{}: skipping malformed row {}: {:?}", path.display(), index + 2, line);
                    log.skipped_rows += 1;
                },
            }
        }

        Ok(log)
    }
}
