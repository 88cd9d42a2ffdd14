//! 视觉前端接口
//!
//! 取帧与图像处理不在本 crate 内。控制循环每个周期调用一次
//! [`VisionSource::acquire`]，只关心 [`LineSignal`] 和帧宽。
//!
//! [`ScriptedVision`] 是一个文本前端：外部视觉进程（或录好的文件）每帧写一行，
//! 控制器从 `BufRead` 读取。标准输入这类可能长时间阻塞的输入经
//! [`InterruptibleReader`] 包装后，运行标志清除时取帧会立即返回。
//!
//! ```text
//! # offset 或 none，可选按键 stop / save
//! 320
//! 100
//! none
//! 500 save
//! 320 stop
//! ```

use crate::error::DriverError;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use linebot_protocol::LineSignal;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::trace;

/// 一帧的检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFrame {
    pub signal: LineSignal,
    /// 帧宽（像素）
    pub width: f64,
}

/// 操作者按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKey {
    /// 结束会话
    Stop,
    /// 学习模式下保存当前路径，之后继续巡线但不再录制
    SavePath,
}

/// 视觉帧源
pub trait VisionSource {
    /// 获取下一帧（阻塞）
    ///
    /// 返回错误表示帧源已不可用，会话将终止。
    fn acquire(&mut self) -> Result<LineFrame, DriverError>;

    /// 非阻塞地查询操作者按键
    fn poll_key(&mut self) -> Option<OperatorKey> {
        None
    }
}

impl<T: VisionSource + ?Sized> VisionSource for Box<T> {
    fn acquire(&mut self) -> Result<LineFrame, DriverError> {
        (**self).acquire()
    }

    fn poll_key(&mut self) -> Option<OperatorKey> {
        (**self).poll_key()
    }
}

/// 从文本行读取帧的视觉源
pub struct ScriptedVision<R> {
    reader: R,
    width: f64,
    pending_key: Option<OperatorKey>,
    line_no: usize,
}

impl<R: BufRead> ScriptedVision<R> {
    pub fn new(reader: R, width: f64) -> Self {
        Self {
            reader,
            width,
            pending_key: None,
            line_no: 0,
        }
    }
}

/// 解析一行帧描述
fn parse_frame_line(line: &str) -> Result<(LineSignal, Option<OperatorKey>), String> {
    let mut words = line.split_whitespace();
    let signal = match words.next() {
        Some(word) if word.eq_ignore_ascii_case("none") => LineSignal::NotFound,
        Some(word) => word
            .parse::<f64>()
            .ok()
            .filter(|offset| offset.is_finite())
            .map(LineSignal::found)
            .ok_or_else(|| format!("invalid offset {:?}", word))?,
        None => return Err("empty frame".into()),
    };

    let key = match words.next() {
        None => None,
        Some(word) if word.eq_ignore_ascii_case("stop") => Some(OperatorKey::Stop),
        Some(word) if word.eq_ignore_ascii_case("save") => Some(OperatorKey::SavePath),
        Some(word) => return Err(format!("unknown key {:?}", word)),
    };

    if let Some(extra) = words.next() {
        return Err(format!("unexpected trailing input {:?}", extra));
    }

    Ok((signal, key))
}

impl<R: BufRead> VisionSource for ScriptedVision<R> {
    fn acquire(&mut self) -> Result<LineFrame, DriverError> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| DriverError::Acquisition(format!("frame source read failed: {}", e)))?;
            if read == 0 {
                return Err(DriverError::Acquisition("frame source ended".into()));
            }
            self.line_no += 1;

            let content = line.trim();
            if content.is_empty() || content.starts_with('#') {
                continue;
            }

            let (signal, key) = parse_frame_line(content).map_err(|reason| {
                DriverError::Acquisition(format!("frame {}: {}", self.line_no, reason))
            })?;
            self.pending_key = key;
            trace!("Frame {}: {:?}", self.line_no, signal);

            return Ok(LineFrame {
                signal,
                width: self.width,
            });
        }
    }

    fn poll_key(&mut self) -> Option<OperatorKey> {
        self.pending_key.take()
    }
}

/// 等待输入时检查运行标志的周期
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// 在辅助线程上阻塞读取、本端可被运行标志打断的 `BufRead`
///
/// 辅助线程按行把输入转发过来；本端每 20ms 检查一次 `running`，
/// 清除后读取返回错误。辅助线程在 EOF、读错误或本端被丢弃后退出，
/// 仍阻塞在读上时随进程退出。
pub struct InterruptibleReader {
    chunks: Receiver<io::Result<Vec<u8>>>,
    buf: Vec<u8>,
    pos: usize,
    running: Arc<AtomicBool>,
}

impl InterruptibleReader {
    pub fn spawn<R>(source: R, running: Arc<AtomicBool>) -> Result<Self, DriverError>
    where
        R: Read + Send + 'static,
    {
        let (tx, chunks) = bounded(64);

        std::thread::Builder::new()
            .name("linebot-frames".into())
            .spawn(move || {
                let mut reader = BufReader::new(source);
                loop {
                    let mut line = Vec::new();
                    match reader.read_until(b'\n', &mut line) {
                        Ok(0) => break,
                        Ok(_) => {
                            if tx.send(Ok(line)).is_err() {
                                break;
                            }
                        },
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        },
                    }
                }
                trace!("Frame reader thread exiting");
            })
            .map_err(|e| DriverError::IoThread(format!("failed to spawn frame reader: {}", e)))?;

        Ok(Self {
            chunks,
            buf: Vec::new(),
            pos: 0,
            running,
        })
    }
}

impl BufRead for InterruptibleReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.pos >= self.buf.len() {
            // 不能用 ErrorKind::Interrupted：read_line 会无限重试
            if !self.running.load(Ordering::Acquire) {
                return Err(io::Error::other("frame input interrupted by stop request"));
            }
            match self.chunks.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(chunk)) => {
                    self.buf = chunk;
                    self.pos = 0;
                },
                Ok(Err(e)) => return Err(e),
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => return Ok(&[]),
            }
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}

impl Read for InterruptibleReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}
