//! # Linebot Driver
//!
//! 运行时层：把视觉、决策、串口和路径日志串成一个会话。
//!
//! - 遥测线程（ArcSwap 无锁发布最新样本）
//! - 命令下发（编码 + 下发策略，唯一的写端）
//! - 路径回放（可调速、可取消）
//! - 视觉源接口与文本帧源
//! - 模式控制器（巡线 / 学习 / 回放状态机）
//!
//! # 示例
//!
//! ```rust,no_run
//! use linebot_driver::{ControllerConfig, ModeController, ScriptedVision};
//! use linebot_serial::{SerialConfig, SerialTransport};
//! use linebot_tools::PathStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ControllerConfig::default();
//! let width = config.frame_width;
//! let controller = ModeController::new(config, PathStore::new("paths"))?;
//! let link = SerialTransport::open(&SerialConfig::default())?;
//! let vision = ScriptedVision::new(std::io::stdin().lock(), width);
//! let report = controller.learn(link, vision, "kitchen")?;
//! println!("{:?}", report.reason);
//! # Ok(())
//! # }
//! ```

mod controller;
mod dispatch;
mod error;
pub mod metrics;
pub mod mode;
pub mod replay;
pub mod telemetry;
pub mod vision;

pub use controller::{ControllerConfig, ModeController, SessionReport, TerminationReason};
pub use dispatch::{DispatchPolicy, Dispatcher};
pub use error::{DriverError, FailureClass};
pub use metrics::{MetricsSnapshot, TelemetryMetrics};
pub use mode::{AtomicControllerState, ControllerState, Mode};
pub use replay::{
    MAX_REPLAY_SPEED, PathReplayer, RECOMMENDED_REPLAY_SPEED, ReplayConfig, ReplayOutcome,
    ReplayReport,
};
pub use telemetry::{
    TelemetryConfig, TelemetryContext, TelemetryReader, TelemetrySnapshot, rx_loop,
};
pub use vision::{InterruptibleReader, LineFrame, OperatorKey, ScriptedVision, VisionSource};
