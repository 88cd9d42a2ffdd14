//! # Linebot Serial Link Layer
//!
//! 串口链路抽象层：控制循环只写（命令），遥测线程只读（`IMU:` 行）。
//!
//! 同一条链路被 [`SplittableTransport::split`] 分离为独立的读端和写端，
//! 两个方向互不加锁；写端只由控制循环持有，因此不会出现两个线程并发写。

use thiserror::Error;

mod line_buffer;
pub mod serial;

#[cfg(feature = "mock")]
pub mod mock;

pub use line_buffer::LineBuffer;
pub use serial::{SerialConfig, SerialRx, SerialTransport, SerialTx};

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockRx, MockTransport, MockTx, SentBytes};

/// 链路层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Link disconnected: {0}")]
    Disconnected(String),
}

impl TransportError {
    /// 是否为致命错误（链路已断开，重试没有意义）
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Timeout => false,
            TransportError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            TransportError::Serial(_) | TransportError::Disconnected(_) => true,
        }
    }
}

/// 写端：把编码后的命令字节写到链路上
pub trait TxTransport {
    /// 写入全部字节（阻塞直到写完或出错）
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

/// 读端：按行读取 MCU 上报的文本
pub trait RxTransport {
    /// 读取一行（带超时）
    ///
    /// - `Ok(Some(line))`: 一整行，已去掉行尾 `\r\n`
    /// - `Ok(None)`: 超时内没有完整的行（不完整的部分保留到下次）
    fn try_read_line(&mut self) -> Result<Option<String>, TransportError>;
}

/// 可分离为独立读端/写端的链路
pub trait SplittableTransport {
    type Rx: RxTransport + Send + 'static;
    type Tx: TxTransport + Send + 'static;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError>;
}

impl<T: TxTransport + ?Sized> TxTransport for Box<T> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).send(bytes)
    }
}

impl<T: RxTransport + ?Sized> RxTransport for Box<T> {
    fn try_read_line(&mut self) -> Result<Option<String>, TransportError> {
        (**self).try_read_line()
    }
}
