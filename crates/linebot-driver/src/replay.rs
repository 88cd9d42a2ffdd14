//! 路径回放
//!
//! 按日志顺序重新下发命令：首行立即下发，之后每行在距上一行
//! `(t[i] - t[i-1]) / speed` 之后下发。等待以不超过 10ms 的切片进行，
//! 每个切片都检查 `running` 标志，清除后立即返回 `Cancelled`。
//!
//! 日志缺失或为空时什么都不下发，只记录警告。

use crate::error::DriverError;
use linebot_protocol::Command;
use linebot_tools::timestamp::delta_between;
use linebot_tools::{PathLog, PathStore, StorageError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 最大回放速度倍数
pub const MAX_REPLAY_SPEED: f64 = 5.0;

/// 超过该倍数时给出警告
pub const RECOMMENDED_REPLAY_SPEED: f64 = 2.0;

const WAIT_SLICE: Duration = Duration::from_millis(10);

/// 回放配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayConfig {
    /// 速度倍数（1.0 = 原始节奏）
    pub speed: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), DriverError> {
        if !(self.speed > 0.0 && self.speed <= MAX_REPLAY_SPEED) {
            return Err(DriverError::InvalidConfig(format!(
                "replay speed must be in (0, {}], got {}",
                MAX_REPLAY_SPEED, self.speed
            )));
        }
        Ok(())
    }
}

/// 回放结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// 全部行已下发
    Completed,
    /// 运行标志被清除，提前结束
    Cancelled,
    /// 日志不存在
    Missing,
    /// 日志没有任何有效行
    Empty,
    /// 文件存在但表头不是路径日志表头
    Unreadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    pub outcome: ReplayOutcome,
    /// 已下发的行数
    pub dispatched: usize,
    /// 加载时跳过的无效行数
    pub skipped_rows: usize,
}

impl ReplayReport {
    fn nothing(outcome: ReplayOutcome) -> Self {
        Self {
            outcome,
            dispatched: 0,
            skipped_rows: 0,
        }
    }
}

pub struct PathReplayer {
    speed: f64,
    running: Arc<AtomicBool>,
}

impl PathReplayer {
    pub fn new(config: ReplayConfig, running: Arc<AtomicBool>) -> Result<Self, DriverError> {
        config.validate()?;
        if config.speed > RECOMMENDED_REPLAY_SPEED {
            warn!(
                "Replay speed {:.2}x exceeds the recommended {:.1}x",
                config.speed, RECOMMENDED_REPLAY_SPEED
            );
        }
        Ok(Self {
            speed: config.speed,
            running,
        })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// 从存储中按名称加载并回放
    ///
    /// 缺失、空或表头不符的日志不算错误，只体现在 [`ReplayOutcome`] 里。
    pub fn replay_named<F>(
        &self,
        store: &PathStore,
        name: &str,
        dispatch: F,
    ) -> Result<ReplayReport, DriverError>
    where
        F: FnMut(Command) -> Result<(), DriverError>,
    {
        match store.load(name) {
            Ok(log) => self.replay(&log, dispatch),
            Err(StorageError::NotFound(path)) => {
                warn!("Path '{}' not found at {}, nothing to replay", name, path.display());
                Ok(ReplayReport::nothing(ReplayOutcome::Missing))
            },
            Err(e @ StorageError::MalformedHeader { .. }) => {
                warn!("Path '{}' is not a path log ({}), nothing to replay", name, e);
                Ok(ReplayReport::nothing(ReplayOutcome::Unreadable))
            },
            Err(e) => Err(e.into()),
        }
    }

    /// 回放一条已加载的路径
    ///
    /// `dispatch` 返回错误时立即中止并向上传播。
    pub fn replay<F>(&self, log: &PathLog, mut dispatch: F) -> Result<ReplayReport, DriverError>
    where
        F: FnMut(Command) -> Result<(), DriverError>,
    {
        let mut report = ReplayReport {
            outcome: ReplayOutcome::Completed,
            dispatched: 0,
            skipped_rows: log.skipped_rows,
        };

        let Some(first) = log.entries.first() else {
            warn!("Path '{}' has no commands, nothing to replay", log.name);
            report.outcome = ReplayOutcome::Empty;
            return Ok(report);
        };

        info!(
            "Replaying '{}': {} commands over {:.2}s at {:.2}x",
            log.name,
            log.len(),
            log.duration().unwrap_or_default().as_secs_f64(),
            self.speed
        );

        // 以起点为基准累积计划时刻，避免逐行 sleep 的误差累积
        let start = Instant::now();
        let mut offset = Duration::ZERO;
        let mut previous = first.timestamp;

        for entry in &log.entries {
            let delta = delta_between(previous, entry.timestamp).as_secs_f64() / self.speed;
            offset = offset.saturating_add(Duration::try_from_secs_f64(delta).unwrap_or(Duration::MAX));
            previous = entry.timestamp;

            if !self.wait_until(start.checked_add(offset)) {
                info!("Replay cancelled after {} commands", report.dispatched);
                report.outcome = ReplayOutcome::Cancelled;
                return Ok(report);
            }

            dispatch(entry.command)?;
            report.dispatched += 1;
        }

        info!("Replay of '{}' completed ({} commands)", log.name, report.dispatched);
        Ok(report)
    }

    /// 等到 `deadline`；等待期间运行标志被清除则返回 false
    ///
    /// `None` 表示时刻超出 `Instant` 的表示范围，只能等待取消。
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        loop {
            if !self.running.load(Ordering::Acquire) {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => WAIT_SLICE,
            };
            if deadline.is_some() && remaining.is_zero() {
                return true;
            }
            spin_sleep::sleep(remaining.min(WAIT_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linebot_tools::TimestampedCommand;

    fn log_of(rows: &[(f64, Command)]) -> PathLog {
        let mut log = PathLog::new("test");
        for (ts, cmd) in rows {
            log.push(TimestampedCommand::new(*ts, *cmd));
        }
        log
    }

    fn replayer(speed: f64) -> PathReplayer {
        PathReplayer::new(ReplayConfig { speed }, Arc::new(AtomicBool::new(true))).unwrap()
    }

    #[test]
    fn test_speed_validation() {
        let running = Arc::new(AtomicBool::new(true));
        for speed in [0.0, -1.0, 5.01, f64::NAN] {
            assert!(PathReplayer::new(ReplayConfig { speed }, running.clone()).is_err());
        }
        assert!(PathReplayer::new(ReplayConfig { speed: 5.0 }, running).is_ok());
    }

    #[test]
    fn test_replay_order_and_timing() {
        let log = log_of(&[
            (100.0, Command::Forward),
            (100.2, Command::Left),
            (100.3, Command::Forward),
        ]);
        let start = Instant::now();
        let mut seen = Vec::new();
        let report = replayer(1.0)
            .replay(&log, |cmd| {
                seen.push((cmd, start.elapsed()));
                Ok(())
            })
            .unwrap();

        assert_eq!(report.outcome, ReplayOutcome::Completed);
        assert_eq!(report.dispatched, 3);
        let cmds: Vec<_> = seen.iter().map(|(c, _)| *c).collect();
        assert_eq!(cmds, vec![Command::Forward, Command::Left, Command::Forward]);

        // 首行立即下发
        assert!(seen[0].1 < Duration::from_millis(50));
        let gap1 = seen[1].1 - seen[0].1;
        let gap2 = seen[2].1 - seen[1].1;
        assert!((gap1.as_secs_f64() - 0.2).abs() < 0.05, "gap1 = {:?}", gap1);
        assert!((gap2.as_secs_f64() - 0.1).abs() < 0.05, "gap2 = {:?}", gap2);
    }

    #[test]
    fn test_speed_scales_delays() {
        let log = log_of(&[(0.0, Command::Forward), (0.4, Command::Right)]);
        let start = Instant::now();
        replayer(4.0).replay(&log, |_| Ok(())).unwrap();
        let elapsed = start.elapsed().as_secs_f64();
        assert!((elapsed - 0.1).abs() < 0.05, "elapsed = {}", elapsed);
    }

    #[test]
    fn test_backwards_timestamps_dispatch_immediately() {
        let log = log_of(&[(10.0, Command::Forward), (9.0, Command::Left)]);
        let start = Instant::now();
        let report = replayer(1.0).replay(&log, |_| Ok(())).unwrap();
        assert_eq!(report.dispatched, 2);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_empty_log() {
        let mut calls = 0;
        let report = replayer(1.0)
            .replay(&PathLog::new("empty"), |_| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(report.outcome, ReplayOutcome::Empty);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_cancel_during_wait() {
        let running = Arc::new(AtomicBool::new(true));
        let replayer = PathReplayer::new(ReplayConfig::default(), running.clone()).unwrap();
        let log = log_of(&[(0.0, Command::Forward), (30.0, Command::Left)]);

        let canceller = {
            let running = running.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                running.store(false, Ordering::Release);
            })
        };

        let start = Instant::now();
        let mut seen = Vec::new();
        let report = replayer
            .replay(&log, |cmd| {
                seen.push(cmd);
                Ok(())
            })
            .unwrap();
        canceller.join().unwrap();

        assert_eq!(report.outcome, ReplayOutcome::Cancelled);
        assert_eq!(seen, vec![Command::Forward]);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_dispatch_error_aborts() {
        let log = log_of(&[(0.0, Command::Forward), (0.0, Command::Left)]);
        let result = replayer(1.0).replay(&log, |_| {
            Err(DriverError::Transport(linebot_serial::TransportError::Disconnected(
                "gone".into(),
            )))
        });
        assert!(matches!(result, Err(DriverError::Transport(_))));
    }

    #[test]
    fn test_replay_named_missing_and_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = PathStore::new(dir.path());
        let replayer = replayer(1.0);

        let report = replayer.replay_named(&store, "ghost", |_| Ok(())).unwrap();
        assert_eq!(report.outcome, ReplayOutcome::Missing);

        std::fs::write(dir.path().join("imu.csv"), "time,gx,gy,gz,leftPWM,rightPWM\n").unwrap();
        let report = replayer.replay_named(&store, "imu", |_| Ok(())).unwrap();
        assert_eq!(report.outcome, ReplayOutcome::Unreadable);

        assert!(matches!(
            replayer.replay_named(&store, "../escape", |_| Ok(())),
            Err(DriverError::Storage(StorageError::InvalidName { .. }))
        ));
    }
}
