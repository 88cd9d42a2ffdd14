//! # 时间戳处理
//!
//! 路径日志使用 Unix 纪元秒（浮点），回放只依赖相邻行之间的差值。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 当前时间（Unix 纪元秒，微秒精度）
pub fn epoch_seconds() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

/// 两个时间戳之间的间隔
///
/// 负值（时钟回拨或乱序）和无法表示的值都截断为 0。
pub fn delta_between(previous: f64, current: f64) -> Duration {
    let delta = current - previous;
    if delta > 0.0 {
        Duration::try_from_secs_f64(delta).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_seconds_is_recent() {
        // 2020-01-01 之后
        assert!(epoch_seconds() > 1_577_836_800.0);
    }

    #[test]
    fn test_delta_between() {
        assert_eq!(delta_between(10.0, 10.5), Duration::from_millis(500));
        assert_eq!(delta_between(10.5, 10.0), Duration::ZERO);
        assert_eq!(delta_between(10.0, 10.0), Duration::ZERO);
        assert_eq!(delta_between(10.0, f64::NAN), Duration::ZERO);
    }
}
