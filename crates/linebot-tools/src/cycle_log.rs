//! 扩展日志：每个控制周期一行
//!
//! ```text
//! time,gx,gy,gz,leftPWM,rightPWM
//! 1718000000.033000,12,-4,0,80,80
//! ```
//!
//! 与路径日志不同，这里记录的是逐周期状态（遥测 + 当前命令的左右轮功率），
//! 用于离线分析，不用于回放。

use crate::error::StorageError;
use linebot_protocol::TelemetrySample;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CYCLE_LOG_HEADER: &str = "time,gx,gy,gz,leftPWM,rightPWM";

pub struct CycleLogger {
    writer: BufWriter<File>,
    path: PathBuf,
    rows: usize,
}

impl CycleLogger {
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let file = File::create(path).map_err(|e| StorageError::io("create", path, e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CYCLE_LOG_HEADER)
            .and_then(|_| writer.flush())
            .map_err(|e| StorageError::io("write header to", path, e))?;
        info!("Cycle logging started -> {}", path.display());
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    pub fn log(
        &mut self,
        time: f64,
        sample: TelemetrySample,
        powers: (u8, u8),
    ) -> Result<(), StorageError> {
        writeln!(
            self.writer,
            "{:.6},{},{},{},{},{}",
            time, sample.gx, sample.gy, sample.gz, powers.0, powers.1
        )
        .and_then(|_| self.writer.flush())
        .map_err(|e| StorageError::io("append to", &self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    pub fn close(mut self) -> Result<usize, StorageError> {
        self.writer
            .flush()
            .map_err(|e| StorageError::io("flush", &self.path, e))?;
        info!("Cycle log saved ({} rows) -> {}", self.rows, self.path.display());
        Ok(self.rows)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}
