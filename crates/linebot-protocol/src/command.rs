//! 运动命令定义

use crate::error::ProtocolError;
use std::fmt;

/// 运动命令
///
/// 任一时刻只有一个命令处于“激活”状态。`Stop` 是安全默认值，
/// 也是未检测到线时唯一会下发的命令。
///
/// 差速 PWM 编码下每个命令对应的左右轮功率由 [`crate::DriveSpeeds`] 决定，
/// 命令本身不携带功率，这样录制的路径与编码方式无关。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Command {
    /// 左转
    Left,
    /// 右转
    Right,
    /// 直行
    Forward,
    /// 停止（默认）
    #[default]
    Stop,
}

impl Command {
    /// 全部命令（用于测试和遍历）
    pub const ALL: [Command; 4] = [Command::Left, Command::Right, Command::Forward, Command::Stop];

    /// 单字符符号（同时用于符号编码和路径日志）
    pub const fn symbol(self) -> char {
        match self {
            Command::Left => 'L',
            Command::Right => 'R',
            Command::Forward => 'F',
            Command::Stop => 'S',
        }
    }

    /// 从符号解析命令
    ///
    /// 接受首尾空白和小写符号，其余输入均返回 `UnknownSymbol`。
    pub fn from_symbol(symbol: &str) -> Result<Self, ProtocolError> {
        match symbol.trim() {
            "L" | "l" => Ok(Command::Left),
            "R" | "r" => Ok(Command::Right),
            "F" | "f" => Ok(Command::Forward),
            "S" | "s" => Ok(Command::Stop),
            other => Err(ProtocolError::UnknownSymbol(other.to_string())),
        }
    }

    /// 是否为停止命令
    pub fn is_stop(self) -> bool {
        self == Command::Stop
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Left => "LEFT",
            Command::Right => "RIGHT",
            Command::Forward => "FORWARD",
            Command::Stop => "STOP",
        };
        f.write_str(name)
    }
}
