//! 命令编码
//!
//! 两种互斥的线上编码，一个会话内只能使用其中一种：
//!
//! | 命令 | 符号编码 | 差速 PWM 编码 |
//! |---|---|---|
//! | Left | `L` | `A{turn}B{base}\n` |
//! | Right | `R` | `A{base}B{turn}\n` |
//! | Forward | `F` | `A{base}B{base}\n` |
//! | Stop | `S` | `S\n` |
//!
//! 编码是单向的：不解析设备应答。

use crate::command::Command;

/// 差速 PWM 编码的左右轮功率参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveSpeeds {
    /// 直行以及转弯外侧轮的功率
    pub base_speed: u8,
    /// 转弯内侧轮的功率
    pub turn_speed: u8,
}

impl Default for DriveSpeeds {
    fn default() -> Self {
        Self {
            base_speed: 80,
            turn_speed: 50,
        }
    }
}

impl DriveSpeeds {
    /// 命令对应的 `(left, right)` 功率，`Stop` 为 `(0, 0)`
    pub fn powers(&self, command: Command) -> (u8, u8) {
        match command {
            Command::Left => (self.turn_speed, self.base_speed),
            Command::Right => (self.base_speed, self.turn_speed),
            Command::Forward => (self.base_speed, self.base_speed),
            Command::Stop => (0, 0),
        }
    }
}

/// 线上编码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// 单字节 ASCII 符号，无结束符
    #[default]
    Symbolic,
    /// `A{left}B{right}\n` 文本，换行结束
    DifferentialPwm(DriveSpeeds),
}

/// 命令编码器
///
/// 构造后编码方式不可变，保证一个会话内不会混用两种编码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommandCodec {
    encoding: Encoding,
    /// 符号编码下记录日志用的功率
    symbolic_speeds: DriveSpeeds,
}

impl CommandCodec {
    pub const fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            symbolic_speeds: DriveSpeeds {
                base_speed: 80,
                turn_speed: 50,
            },
        }
    }

    /// 设置符号编码下记录的功率（不影响线上字节；PWM 编码使用编码自带的功率）
    pub fn with_symbolic_speeds(mut self, speeds: DriveSpeeds) -> Self {
        self.symbolic_speeds = speeds;
        self
    }

    pub const fn symbolic() -> Self {
        Self::new(Encoding::Symbolic)
    }

    pub const fn differential_pwm(speeds: DriveSpeeds) -> Self {
        Self::new(Encoding::DifferentialPwm(speeds))
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// 把命令编码为线上字节
    pub fn encode(&self, command: Command) -> Vec<u8> {
        match self.encoding {
            Encoding::Symbolic => vec![command.symbol() as u8],
            Encoding::DifferentialPwm(_) if command.is_stop() => b"S\n".to_vec(),
            Encoding::DifferentialPwm(speeds) => {
                let (left, right) = speeds.powers(command);
                format!("A{}B{}\n", left, right).into_bytes()
            },
        }
    }

    /// 命令对应的左右轮功率（用于逐周期日志）
    ///
    /// 符号编码下功率由 MCU 固件决定，这里记录 [`CommandCodec::with_symbolic_speeds`]
    /// 设置的功率（默认 [`DriveSpeeds::default`]）。
    pub fn powers(&self, command: Command) -> (u8, u8) {
        match self.encoding {
            Encoding::Symbolic => self.symbolic_speeds.powers(command),
            Encoding::DifferentialPwm(speeds) => speeds.powers(command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbolic_encoding() {
        let codec = CommandCodec::symbolic();
        assert_eq!(codec.encode(Command::Left), b"L");
        assert_eq!(codec.encode(Command::Right), b"R");
        assert_eq!(codec.encode(Command::Forward), b"F");
        assert_eq!(codec.encode(Command::Stop), b"S");
    }

    #[test]
    fn test_differential_pwm_encoding() {
        let codec = CommandCodec::differential_pwm(DriveSpeeds {
            base_speed: 80,
            turn_speed: 50,
        });
        assert_eq!(codec.encode(Command::Left), b"A50B80\n");
        assert_eq!(codec.encode(Command::Right), b"A80B50\n");
        assert_eq!(codec.encode(Command::Forward), b"A80B80\n");
        assert_eq!(codec.encode(Command::Stop), b"S\n");
    }

    #[test]
    fn test_pwm_extreme_values() {
        let codec = CommandCodec::differential_pwm(DriveSpeeds {
            base_speed: 255,
            turn_speed: 0,
        });
        assert_eq!(codec.encode(Command::Left), b"A0B255\n");
        assert_eq!(codec.encode(Command::Right), b"A255B0\n");
    }

    #[test]
    fn test_powers() {
        let speeds = DriveSpeeds {
            base_speed: 90,
            turn_speed: 30,
        };
        assert_eq!(speeds.powers(Command::Left), (30, 90));
        assert_eq!(speeds.powers(Command::Right), (90, 30));
        assert_eq!(speeds.powers(Command::Forward), (90, 90));
        assert_eq!(speeds.powers(Command::Stop), (0, 0));

        let codec = CommandCodec::symbolic();
        assert_eq!(codec.powers(Command::Forward), (80, 80));
    }

    #[test]
    fn test_symbolic_speeds_only_affect_powers() {
        let speeds = DriveSpeeds {
            base_speed: 100,
            turn_speed: 20,
        };
        let codec = CommandCodec::symbolic().with_symbolic_speeds(speeds);
        assert_eq!(codec.encode(Command::Left), b"L");
        assert_eq!(codec.powers(Command::Left), (20, 100));
        assert_eq!(codec.powers(Command::Stop), (0, 0));

        // PWM 编码以编码自带的功率为准
        let pwm = CommandCodec::differential_pwm(DriveSpeeds::default()).with_symbolic_speeds(speeds);
        assert_eq!(pwm.powers(Command::Forward), (80, 80));
        assert_eq!(pwm.encode(Command::Forward), b"A80B80\n");
    }

    #[test]
    fn test_default_is_symbolic() {
        assert_eq!(CommandCodec::default().encoding(), Encoding::Symbolic);
    }
}
