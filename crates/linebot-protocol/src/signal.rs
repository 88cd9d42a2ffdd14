//! 视觉信号与三区决策
//!
//! 视觉前端（取帧、灰度、模糊、阈值、轮廓、质心）不在本 crate 内，
//! 这里只消费它的输出 [`LineSignal`]。

use crate::command::Command;

/// 每个控制周期由视觉前端产生一次的线检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSignal {
    /// 检测到线，`offset` 为质心的横向像素坐标，取值范围 `[0, frame_width)`
    Found { offset: f64 },
    /// 未检测到线
    NotFound,
}

impl LineSignal {
    pub fn found(offset: f64) -> Self {
        LineSignal::Found { offset }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, LineSignal::Found { .. })
    }
}

/// 三区决策：把横向偏移映射为运动命令
///
/// - `NotFound` → `Stop`
/// - `offset < W/3` → `Left`
/// - `offset > 2W/3` → `Right`
/// - 其余 → `Forward`
///
/// 纯函数，无内部状态，无滞回：偏移恰好在分界线附近抖动时，
/// 相邻周期会交替输出不同命令，这里保持原样不做平滑。
///
/// 非有限的偏移或非正的帧宽无法分区，按安全默认值返回 `Stop`。
pub fn decide(signal: LineSignal, frame_width: f64) -> Command {
    let offset = match signal {
        LineSignal::NotFound => return Command::Stop,
        LineSignal::Found { offset } => offset,
    };

    if !offset.is_finite() || !frame_width.is_finite() || frame_width <= 0.0 {
        return Command::Stop;
    }

    if offset < frame_width / 3.0 {
        Command::Left
    } else if offset > 2.0 * frame_width / 3.0 {
        Command::Right
    } else {
        Command::Forward
    }
}
