//! UART 链路实现（基于 `serialport`）

use crate::line_buffer::LineBuffer;
use crate::{RxTransport, SplittableTransport, TransportError, TxTransport};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// 串口配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 设备路径（如 `/dev/ttyUSB0`）
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    /// 读超时
    ///
    /// 遥测线程在每次超时边界检查停止标志，因此这个值决定了关闭时的最大等待。
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// 已打开的串口（未分离）
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// 打开串口（8N1，无流控）
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()?;

        info!(
            "Opened serial port: {} at {} baud",
            config.port, config.baud_rate
        );

        Ok(Self {
            port,
            name: config.port.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SplittableTransport for SerialTransport {
    type Rx = SerialRx;
    type Tx = SerialTx;

    fn split(self) -> Result<(SerialRx, SerialTx), TransportError> {
        let reader = self.port.try_clone()?;
        debug!("Serial port {} split into RX/TX halves", self.name);
        Ok((
            SerialRx {
                port: reader,
                buffer: LineBuffer::new(),
            },
            SerialTx { port: self.port },
        ))
    }
}

/// 串口读端
pub struct SerialRx {
    port: Box<dyn SerialPort>,
    buffer: LineBuffer,
}

impl RxTransport for SerialRx {
    fn try_read_line(&mut self) -> Result<Option<String>, TransportError> {
        if let Some(line) = self.buffer.next_line() {
            return Ok(Some(line));
        }

        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(0) => Ok(None),
            Ok(n) => {
                self.buffer.extend(&chunk[..n]);
                Ok(self.buffer.next_line())
            },
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// 串口写端
pub struct SerialTx {
    port: Box<dyn SerialPort>,
}

impl TxTransport for SerialTx {
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}
