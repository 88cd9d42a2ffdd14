//! 遥测读取线程
//!
//! 后台线程持有链路读端，逐行读取 MCU 上报；`IMU:` 行解析成功后，
//! 以一次 `ArcSwap::store` 整体替换最新快照。控制循环随时 `load`，
//! 看到的要么是初始默认值，要么是某一行完整解析出的三元组，不会出现新旧字段混合。
//!
//! 格式错误的行直接丢弃，已发布的样本保持不变。

use crate::error::DriverError;
use crate::metrics::{MetricsSnapshot, TelemetryMetrics};
use arc_swap::ArcSwap;
use linebot_protocol::{TelemetrySample, parse_telemetry_line};
use linebot_serial::RxTransport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, trace, warn};

/// 遥测线程配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// 停止时等待线程退出的最长时间（毫秒）
    pub join_timeout_ms: u64,
    /// 非致命读错误后的退避时间（毫秒）
    pub error_backoff_ms: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: 2000,
            error_backoff_ms: 100,
        }
    }
}

/// 最新遥测快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub sample: TelemetrySample,

    /// 样本序号（0 = 初始默认值，之后每发布一次加 1）
    pub seq: u64,
}

/// 线程间共享的遥测状态
///
/// 单写者（遥测线程）多读者，读端无锁。
#[derive(Debug, Default)]
pub struct TelemetryContext {
    latest: ArcSwap<TelemetrySnapshot>,
}

impl TelemetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取最新快照
    pub fn latest(&self) -> TelemetrySnapshot {
        **self.latest.load()
    }

    /// 整体发布一个新样本，返回其序号
    pub fn publish(&self, sample: TelemetrySample) -> u64 {
        let seq = self.latest.load().seq + 1;
        self.latest.store(Arc::new(TelemetrySnapshot { sample, seq }));
        seq
    }
}

/// 处理一行 MCU 输出
fn handle_line(line: &str, ctx: &TelemetryContext, metrics: &TelemetryMetrics) {
    match parse_telemetry_line(line) {
        Ok(Some(sample)) => {
            let seq = ctx.publish(sample);
            metrics.samples_published.fetch_add(1, Ordering::Relaxed);
            trace!("Telemetry #{}: {:?}", seq, sample.as_tuple());
        },
        Ok(None) => {
            trace!("Ignoring non-telemetry line: {:?}", line);
        },
        Err(e) => {
            metrics.parse_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Discarding malformed telemetry: {}", e);
        },
    }
}

/// 遥测线程主循环
///
/// 每次读取都有超时上限，因此每个超时边界都会检查一次 `is_running`。
///
/// # 参数
/// - `rx`: 链路读端
/// - `ctx`: 共享遥测状态
/// - `config`: 线程配置
/// - `is_running`: 运行标志；遇到致命读错误时本线程将其置为 false 并退出
/// - `metrics`: 指标
pub fn rx_loop(
    mut rx: impl RxTransport,
    ctx: Arc<TelemetryContext>,
    config: TelemetryConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<TelemetryMetrics>,
) {
    let backoff = Duration::from_millis(config.error_backoff_ms);

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("Telemetry thread: is_running flag is false, exiting");
            break;
        }

        match rx.try_read_line() {
            Ok(Some(line)) => {
                metrics.lines_total.fetch_add(1, Ordering::Relaxed);
                handle_line(&line, &ctx, &metrics);
            },
            Ok(None) => {
                metrics.timeouts.fetch_add(1, Ordering::Relaxed);
            },
            Err(e) if !e.is_fatal() => {
                metrics.read_errors.fetch_add(1, Ordering::Relaxed);
                warn!("Telemetry read error: {}, retrying in {:?}", e, backoff);
                spin_sleep::sleep(backoff);
            },
            Err(e) => {
                metrics.read_errors.fetch_add(1, Ordering::Relaxed);
                error!("Telemetry thread: fatal read error: {}, exiting", e);
                // Release: All writes before this are visible to threads that see the false value
                is_running.store(false, Ordering::Release);
                break;
            },
        }
    }

    trace!("Telemetry thread: loop exited");
}

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<(), DriverError> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // watchdog 线程代为 join，主线程只等待通道
        std::thread::spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(DriverError::IoThread("telemetry thread panicked".into())),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(DriverError::IoThread(format!(
                "telemetry thread did not exit within {:?}",
                timeout
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DriverError::IoThread(
                "telemetry thread panicked during join".into(),
            )),
        }
    }
}

/// 遥测读取器（拥有后台线程）
///
/// Drop 时会通知线程退出并在超时内等待。
pub struct TelemetryReader {
    ctx: Arc<TelemetryContext>,
    metrics: Arc<TelemetryMetrics>,
    is_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl TelemetryReader {
    /// 启动遥测线程
    pub fn spawn<R>(rx: R, config: TelemetryConfig) -> Result<Self, DriverError>
    where
        R: RxTransport + Send + 'static,
    {
        let ctx = Arc::new(TelemetryContext::new());
        let metrics = Arc::new(TelemetryMetrics::new());
        let is_running = Arc::new(AtomicBool::new(true));
        let join_timeout = Duration::from_millis(config.join_timeout_ms);

        let ctx_clone = ctx.clone();
        let metrics_clone = metrics.clone();
        let is_running_clone = is_running.clone();

        let thread = std::thread::Builder::new()
            .name("linebot-telemetry".into())
            .spawn(move || rx_loop(rx, ctx_clone, config, is_running_clone, metrics_clone))
            .map_err(|e| DriverError::IoThread(format!("failed to spawn telemetry thread: {}", e)))?;

        info!("Telemetry thread started");

        Ok(Self {
            ctx,
            metrics,
            is_running,
            thread: Some(thread),
            join_timeout,
        })
    }

    /// 共享状态句柄（可交给其他线程读取）
    pub fn context(&self) -> Arc<TelemetryContext> {
        self.ctx.clone()
    }

    /// 最新快照（无锁）
    pub fn latest(&self) -> TelemetrySnapshot {
        self.ctx.latest()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 线程是否仍在运行
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 通知线程退出并等待
    ///
    /// 可重复调用；第二次起直接返回 `Ok`。
    pub fn shutdown(&mut self) -> Result<(), DriverError> {
        self.is_running.store(false, Ordering::Release);

        match self.thread.take() {
            Some(handle) => {
                handle.join_timeout(self.join_timeout)?;
                info!("Telemetry thread stopped");
                Ok(())
            },
            None => Ok(()),
        }
    }
}

impl Drop for TelemetryReader {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("{}", e);
        }
    }
}
