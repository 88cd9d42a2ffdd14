//! 协议层错误类型定义

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 未知的命令符号（路径日志中出现了非 `L/R/F/S` 的符号）
    #[error("Unknown command symbol: {0:?}")]
    UnknownSymbol(String),

    /// 遥测行格式错误
    ///
    /// 行以 `IMU:` 开头，但负载不是恰好三个逗号分隔的整数。
    #[error("Malformed telemetry line {line:?}: {reason}")]
    MalformedTelemetry { line: String, reason: String },
}
