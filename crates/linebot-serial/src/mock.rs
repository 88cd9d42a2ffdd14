//! Mock 链路（无硬件，用于测试）
//!
//! `MockTransport::new()` 返回链路本身和一个 [`MockHandle`]：
//! 测试通过句柄注入 MCU 上报的行、读取已写出的字节（带写出时刻），
//! 以及模拟链路断开或单次写失败。

use crate::{RxTransport, SplittableTransport, TransportError, TxTransport};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 一次写出记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentBytes {
    pub at: Instant,
    pub bytes: Vec<u8>,
}

type SentLog = Arc<Mutex<Vec<SentBytes>>>;

const NO_FAILURE: usize = usize::MAX;

/// 写端故障注入
#[derive(Debug)]
struct WriteFaults {
    severed: AtomicBool,
    /// 第几次写尝试（从 0 计）失败一次
    fail_once_at: AtomicUsize,
    attempts: AtomicUsize,
}

impl Default for WriteFaults {
    fn default() -> Self {
        Self {
            severed: AtomicBool::new(false),
            fail_once_at: AtomicUsize::new(NO_FAILURE),
            attempts: AtomicUsize::new(0),
        }
    }
}

pub struct MockTransport {
    incoming: Receiver<String>,
    sent: SentLog,
    faults: Arc<WriteFaults>,
    read_timeout: Duration,
}

/// 测试侧句柄
#[derive(Clone)]
pub struct MockHandle {
    line_tx: Sender<String>,
    sent: SentLog,
    faults: Arc<WriteFaults>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        Self::with_read_timeout(Duration::from_millis(5))
    }

    pub fn with_read_timeout(read_timeout: Duration) -> (Self, MockHandle) {
        let (line_tx, incoming) = unbounded();
        let sent: SentLog = Arc::new(Mutex::new(Vec::new()));
        let faults = Arc::new(WriteFaults::default());

        let transport = Self {
            incoming,
            sent: sent.clone(),
            faults: faults.clone(),
            read_timeout,
        };
        let handle = MockHandle {
            line_tx,
            sent,
            faults,
        };
        (transport, handle)
    }
}

impl MockHandle {
    /// 注入一行 MCU 输出
    pub fn push_line(&self, line: impl Into<String>) {
        let _ = self.line_tx.send(line.into());
    }

    /// 之后的所有写入都返回 `Disconnected`
    pub fn sever_link(&self) {
        self.faults.severed.store(true, Ordering::SeqCst);
    }

    /// 第 `attempt` 次写尝试（从 0 计）返回一次 I/O 错误，之后恢复正常
    pub fn fail_write_once_at(&self, attempt: usize) {
        self.faults.fail_once_at.store(attempt, Ordering::SeqCst);
    }

    /// 全部写出记录
    pub fn writes(&self) -> Vec<SentBytes> {
        self.sent.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// 全部写出的字节（不含时刻）
    pub fn sent_bytes(&self) -> Vec<Vec<u8>> {
        self.writes().into_iter().map(|w| w.bytes).collect()
    }
}

impl SplittableTransport for MockTransport {
    type Rx = MockRx;
    type Tx = MockTx;

    fn split(self) -> Result<(MockRx, MockTx), TransportError> {
        Ok((
            MockRx {
                incoming: self.incoming,
                read_timeout: self.read_timeout,
            },
            MockTx {
                sent: self.sent,
                faults: self.faults,
            },
        ))
    }
}

pub struct MockRx {
    incoming: Receiver<String>,
    read_timeout: Duration,
}

impl RxTransport for MockRx {
    fn try_read_line(&mut self) -> Result<Option<String>, TransportError> {
        match self.incoming.recv_timeout(self.read_timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                // 句柄已全部丢弃：保持超时语义，避免空转
                std::thread::sleep(self.read_timeout);
                Ok(None)
            },
        }
    }
}

pub struct MockTx {
    sent: SentLog,
    faults: Arc<WriteFaults>,
}

impl TxTransport for MockTx {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let attempt = self.faults.attempts.fetch_add(1, Ordering::SeqCst);
        if self.faults.severed.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected("mock link severed".to_string()));
        }
        if self
            .faults
            .fail_once_at
            .compare_exchange(attempt, NO_FAILURE, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock write failed",
            )));
        }
        let mut log = self
            .sent
            .lock()
            .map_err(|_| TransportError::Disconnected("mock log poisoned".to_string()))?;
        log.push(SentBytes {
            at: Instant::now(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_round_trip() {
        let (transport, handle) = MockTransport::new();
        let (mut rx, mut tx) = transport.split().unwrap();

        handle.push_line("IMU:1,2,3");
        assert_eq!(rx.try_read_line().unwrap().as_deref(), Some("IMU:1,2,3"));
        assert_eq!(rx.try_read_line().unwrap(), None);

        tx.send(b"F").unwrap();
        tx.send(b"S").unwrap();
        assert_eq!(handle.sent_bytes(), vec![b"F".to_vec(), b"S".to_vec()]);
    }

    #[test]
    fn test_mock_severed_link() {
        let (transport, handle) = MockTransport::new();
        let (_rx, mut tx) = transport.split().unwrap();

        handle.sever_link();
        assert!(matches!(
            tx.send(b"F"),
            Err(TransportError::Disconnected(_))
        ));
        assert!(handle.writes().is_empty());
    }

    #[test]
    fn test_mock_single_write_failure() {
        let (transport, handle) = MockTransport::new();
        let (_rx, mut tx) = transport.split().unwrap();

        handle.fail_write_once_at(1);
        tx.send(b"F").unwrap();
        assert!(matches!(tx.send(b"L"), Err(TransportError::Io(_))));
        tx.send(b"S").unwrap();
        assert_eq!(handle.sent_bytes(), vec![b"F".to_vec(), b"S".to_vec()]);
    }
}
