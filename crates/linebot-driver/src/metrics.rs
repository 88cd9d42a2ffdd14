//! 遥测线程指标
//!
//! 计数器由遥测线程以 `Relaxed` 递增，读取方通过 [`TelemetryMetrics::snapshot`]
//! 拿到一份普通结构体副本。

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TelemetryMetrics {
    /// 收到的完整行数（含非遥测行）
    pub lines_total: AtomicU64,
    /// 成功发布的遥测样本数
    pub samples_published: AtomicU64,
    /// 被丢弃的格式错误遥测行数
    pub parse_errors: AtomicU64,
    /// 读超时次数（超时内没有完整的行）
    pub timeouts: AtomicU64,
    /// 非超时的读错误次数
    pub read_errors: AtomicU64,
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lines_total: u64,
    pub samples_published: u64,
    pub parse_errors: u64,
    pub timeouts: u64,
    pub read_errors: u64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_total: self.lines_total.load(Ordering::Relaxed),
            samples_published: self.samples_published.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}
