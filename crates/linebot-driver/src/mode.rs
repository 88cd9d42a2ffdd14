//! 会话模式与控制器状态
//!
//! 模式在启动时选定一次，整个会话内不变；控制器状态随会话推进：
//!
//! ```text
//! SelectingMode ─┬─> Following ─┐
//!                ├─> Learning  ──┼─> Terminated
//!                └─> Replaying ──┘
//! ```
//!
//! 学习模式中按下保存键后，状态从 `Learning` 转为 `Following`。

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 会话模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 巡线
    Follow,
    /// 巡线并录制命令切换
    Learn,
    /// 回放已保存的路径（不进入控制循环）
    Replay,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Follow => "follow",
            Mode::Learn => "learn",
            Mode::Replay => "replay",
        };
        f.write_str(name)
    }
}

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ControllerState {
    #[default]
    SelectingMode = 0,
    Following = 1,
    Learning = 2,
    Replaying = 3,
    Terminated = 4,
}

impl ControllerState {
    /// 从 u8 转换
    ///
    /// 无效值视为 `Terminated`。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::SelectingMode,
            1 => Self::Following,
            2 => Self::Learning,
            3 => Self::Replaying,
            _ => Self::Terminated,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 进入某个模式后的初始状态
    pub fn entered(mode: Mode) -> Self {
        match mode {
            Mode::Follow => Self::Following,
            Mode::Learn => Self::Learning,
            Mode::Replay => Self::Replaying,
        }
    }

    pub fn is_terminated(self) -> bool {
        self == Self::Terminated
    }
}

/// 控制器状态（原子版本，用于线程间共享）
///
/// 控制循环写，其他线程（如状态显示、测试）读。
#[derive(Debug, Default)]
pub struct AtomicControllerState {
    inner: AtomicU8,
}

impl AtomicControllerState {
    pub fn new(state: ControllerState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> ControllerState {
        ControllerState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ControllerState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }
}
