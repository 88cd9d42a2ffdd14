//! 驱动层错误类型定义

use linebot_protocol::ProtocolError;
use linebot_serial::TransportError;
use linebot_tools::StorageError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口链路错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 路径日志读写错误
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// 视觉帧获取失败（帧源结束、读取失败或输入无法解析）
    #[error("Frame acquisition failed: {0}")]
    Acquisition(String),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 后台线程错误（启动失败、join 超时或 panic）
    #[error("IO thread error: {0}")]
    IoThread(String),
}

/// 失败类别
///
/// 操作者只凭退出码就能区分故障原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// 配置或用法错误
    Config,
    /// 视觉帧获取失败
    Acquisition,
    /// 串口链路失败
    Transport,
    /// 路径日志不可写或不可读
    Storage,
}

impl FailureClass {
    /// 进程退出码（0 保留给正常结束）
    pub fn exit_code(self) -> i32 {
        match self {
            FailureClass::Config => 2,
            FailureClass::Acquisition => 3,
            FailureClass::Transport => 4,
            FailureClass::Storage => 5,
        }
    }
}

impl DriverError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            DriverError::Transport(_) | DriverError::IoThread(_) => FailureClass::Transport,
            DriverError::Storage(StorageError::InvalidName { .. }) => FailureClass::Config,
            DriverError::Storage(_) => FailureClass::Storage,
            DriverError::Acquisition(_) => FailureClass::Acquisition,
            DriverError::Protocol(_) | DriverError::InvalidConfig(_) => FailureClass::Config,
        }
    }
}
