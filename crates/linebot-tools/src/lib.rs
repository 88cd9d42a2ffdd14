//! # Linebot Tools - 路径日志与存储
//!
//! **依赖原则**: 只依赖 `linebot-protocol`，不依赖串口和驱动层
//!
//! ## 包含模块
//!
//! - `path_log` - 路径日志格式（`timestamp,command`，每次命令切换一行）
//! - `recorder` - 路径录制器（逐行写入并立即 flush）
//! - `cycle_log` - 扩展日志（每个控制周期一行，含遥测与左右轮功率）
//! - `store` - 按名称管理保存在目录下的路径
//! - `timestamp` - 时间戳工具

mod cycle_log;
mod error;
pub mod path_log;
mod recorder;
pub mod store;
pub mod timestamp;

pub use cycle_log::{CYCLE_LOG_HEADER, CycleLogger};
pub use error::StorageError;
pub use path_log::{PATH_LOG_HEADER, PathLog, TimestampedCommand};
pub use recorder::PathRecorder;
pub use store::PathStore;
pub use timestamp::epoch_seconds;
