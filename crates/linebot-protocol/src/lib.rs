//! # Linebot Protocol
//!
//! 巡线小车与电机控制器（MCU）之间的串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 运动命令及其单字符符号
//! - `signal`: 视觉前端输出（`LineSignal`）与三区决策
//! - `codec`: 命令编码（符号编码 / 差速 PWM 编码）
//! - `telemetry`: `IMU:` 遥测行解析
//!
//! ## 数据流
//!
//! ```text
//! LineSignal --decide()--> Command --CommandCodec::encode()--> bytes --> transport
//! transport --> "IMU:gx,gy,gz" --parse_telemetry_line()--> TelemetrySample
//! ```

pub mod codec;
pub mod command;
mod error;
pub mod signal;
pub mod telemetry;

pub use codec::{CommandCodec, DriveSpeeds, Encoding};
pub use command::Command;
pub use error::ProtocolError;
pub use signal::{LineSignal, decide};
pub use telemetry::{TELEMETRY_TAG, TelemetrySample, parse_telemetry_line};
