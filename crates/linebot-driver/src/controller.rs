//! 模式控制器
//!
//! 巡线与学习共用同一个控制循环，区别只在于是否录制命令切换；
//! 回放不进入控制循环，直接交给 [`PathReplayer`]。
//!
//! 每个周期严格按顺序执行：
//!
//! 1. 从视觉源取帧
//! 2. 三区决策
//! 3. 按策略下发；学习模式下每次实际下发都追加一行路径日志
//! 4. 读取最新遥测快照（可选写入逐周期日志）
//! 5. 检查终止条件（中断标志、停止键、取帧失败）
//!
//! 无论从哪条路径结束，终止阶段都会无条件下发 `Stop`、关闭日志、
//! 释放视觉源、停止并等待遥测线程，最后才释放链路。

use crate::dispatch::{DispatchPolicy, Dispatcher};
use crate::error::{DriverError, FailureClass};
use crate::metrics::MetricsSnapshot;
use crate::mode::{AtomicControllerState, ControllerState, Mode};
use crate::replay::{PathReplayer, ReplayConfig, ReplayOutcome};
use crate::telemetry::{TelemetryConfig, TelemetryReader};
use crate::vision::{OperatorKey, VisionSource};
use linebot_protocol::{Command, CommandCodec, DriveSpeeds, Encoding, decide};
use linebot_serial::{RxTransport, SplittableTransport, TxTransport};
use linebot_tools::{CycleLogger, PathRecorder, PathStore, epoch_seconds};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, trace, warn};

/// 控制器配置
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// 线上编码（一个会话内固定）
    pub encoding: Encoding,
    /// 符号编码下逐周期日志记录的左右轮功率（PWM 编码以编码自带的功率为准）
    pub drive_speeds: DriveSpeeds,
    /// 下发策略（学习模式强制为 `OnChange`）
    pub dispatch_policy: DispatchPolicy,
    /// 视觉源未给出有效帧宽时使用的帧宽（像素）
    pub frame_width: f64,
    pub telemetry: TelemetryConfig,
    pub replay: ReplayConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Symbolic,
            drive_speeds: DriveSpeeds::default(),
            dispatch_policy: DispatchPolicy::OnChange,
            frame_width: 640.0,
            telemetry: TelemetryConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), DriverError> {
        if !self.frame_width.is_finite() || self.frame_width <= 0.0 {
            return Err(DriverError::InvalidConfig(format!(
                "frame width must be positive, got {}",
                self.frame_width
            )));
        }
        if self.telemetry.join_timeout_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "telemetry join timeout must be non-zero".into(),
            ));
        }
        self.replay.validate()
    }
}

/// 会话结束原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// 外部中断（Ctrl-C）
    Interrupted,
    /// 操作者按下停止键
    StopKey,
    AcquisitionFailed(String),
    TransportFailed(String),
    StorageFailed(String),
    /// 回放结束（包括取消、缺失、为空）
    ReplayFinished(ReplayOutcome),
}

impl TerminationReason {
    /// 会话中途出现的错误对应的结束原因
    ///
    /// 配置类错误在会话进行中只可能来自帧源，按取帧失败处理。
    pub fn from_error(error: &DriverError) -> Self {
        match error.failure_class() {
            FailureClass::Transport => Self::TransportFailed(error.to_string()),
            FailureClass::Storage => Self::StorageFailed(error.to_string()),
            FailureClass::Acquisition | FailureClass::Config => {
                Self::AcquisitionFailed(error.to_string())
            },
        }
    }

    /// 失败类别；正常结束返回 `None`
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            Self::AcquisitionFailed(_) => Some(FailureClass::Acquisition),
            Self::TransportFailed(_) => Some(FailureClass::Transport),
            Self::StorageFailed(_) => Some(FailureClass::Storage),
            Self::Interrupted | Self::StopKey | Self::ReplayFinished(_) => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.failure_class().map_or(0, FailureClass::exit_code)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted => write!(f, "interrupted"),
            Self::StopKey => write!(f, "stop key pressed"),
            Self::AcquisitionFailed(e) => write!(f, "acquisition failed: {}", e),
            Self::TransportFailed(e) => write!(f, "transport failed: {}", e),
            Self::StorageFailed(e) => write!(f, "storage failed: {}", e),
            Self::ReplayFinished(outcome) => write!(f, "replay finished ({:?})", outcome),
        }
    }
}

/// 会话报告
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub mode: Mode,
    pub reason: TerminationReason,
    /// 执行的控制周期数（回放为 0）
    pub cycles: u64,
    /// 实际写到链路上的命令数（含终止时的 `Stop`）
    pub dispatched: u64,
    /// 写入路径日志的行数
    pub recorded: usize,
    pub telemetry: MetricsSnapshot,
}

/// 一次会话持有的资源
struct Session<Tx: TxTransport> {
    mode: Mode,
    dispatcher: Dispatcher<Tx>,
    recorder: Option<PathRecorder>,
    cycle_log: Option<CycleLogger>,
    telemetry: Option<TelemetryReader>,
    cycles: u64,
    recorded: usize,
}

impl<Tx: TxTransport> Session<Tx> {
    fn new(mode: Mode, dispatcher: Dispatcher<Tx>) -> Self {
        Self {
            mode,
            dispatcher,
            recorder: None,
            cycle_log: None,
            telemetry: None,
            cycles: 0,
            recorded: 0,
        }
    }
}

/// 模式控制器
pub struct ModeController {
    config: ControllerConfig,
    store: PathStore,
    cycle_log: Option<String>,
    running: Arc<AtomicBool>,
    state: Arc<AtomicControllerState>,
}

impl ModeController {
    pub fn new(config: ControllerConfig, store: PathStore) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            cycle_log: None,
            running: Arc::new(AtomicBool::new(true)),
            state: Arc::new(AtomicControllerState::default()),
        })
    }

    /// 巡线/学习时同时写逐周期日志 `<name>.cycles.csv`
    pub fn with_cycle_log(mut self, name: impl Into<String>) -> Self {
        self.cycle_log = Some(name.into());
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn store(&self) -> &PathStore {
        &self.store
    }

    /// 运行标志；清除后控制循环在取帧返回后结束，回放在下一个等待切片结束
    ///
    /// 每个会话结束时重新置位，同一个控制器可以继续开始下一个会话。
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn state(&self) -> ControllerState {
        self.state.get()
    }

    /// 状态句柄（可交给其他线程观察）
    pub fn state_handle(&self) -> Arc<AtomicControllerState> {
        self.state.clone()
    }

    /// 巡线
    pub fn follow<T, V>(&self, transport: T, vision: V) -> Result<SessionReport, DriverError>
    where
        T: SplittableTransport,
        V: VisionSource,
    {
        self.check_cycle_log_name()?;
        Ok(self.run_loop(Mode::Follow, transport, vision, None))
    }

    /// 巡线并录制到名为 `path` 的路径日志
    ///
    /// 日志无法创建时会话在驱动之前就结束（`StorageFailed`）。
    pub fn learn<T, V>(
        &self,
        transport: T,
        vision: V,
        path: &str,
    ) -> Result<SessionReport, DriverError>
    where
        T: SplittableTransport,
        V: VisionSource,
    {
        PathStore::validate_name(path)?;
        self.check_cycle_log_name()?;
        Ok(self.run_loop(Mode::Learn, transport, vision, Some(path)))
    }

    /// 回放名为 `path` 的路径
    ///
    /// 不启动遥测线程；路径缺失或为空只体现在报告里。
    pub fn replay<T>(&self, transport: T, path: &str) -> Result<SessionReport, DriverError>
    where
        T: SplittableTransport,
    {
        PathStore::validate_name(path)?;
        let replayer = PathReplayer::new(self.config.replay, self.running.clone())?;

        self.state.set(ControllerState::SelectingMode);
        let (rx, tx) = match transport.split() {
            Ok(halves) => halves,
            Err(e) => return Ok(self.link_unavailable(Mode::Replay, e)),
        };
        drop(rx);

        let codec = self.codec();
        let mut session = Session::new(
            Mode::Replay,
            Dispatcher::new(tx, codec, DispatchPolicy::EveryCycle),
        );

        self.state.set(ControllerState::Replaying);
        info!("Entering replay mode: '{}'", path);

        let dispatcher = &mut session.dispatcher;
        let result = replayer.replay_named(&self.store, path, |command| {
            dispatcher.force(command).map_err(DriverError::from)
        });

        let mut reason = match result {
            Ok(report) => {
                if report.skipped_rows > 0 {
                    warn!("Skipped {} malformed rows in '{}'", report.skipped_rows, path);
                }
                TerminationReason::ReplayFinished(report.outcome)
            },
            Err(e) => {
                error!("Replay aborted: {}", e);
                TerminationReason::from_error(&e)
            },
        };

        self.finish(&mut session, &mut reason);
        Ok(self.teardown(session, reason))
    }

    fn codec(&self) -> CommandCodec {
        CommandCodec::new(self.config.encoding).with_symbolic_speeds(self.config.drive_speeds)
    }

    fn check_cycle_log_name(&self) -> Result<(), DriverError> {
        if let Some(name) = &self.cycle_log {
            PathStore::validate_name(name)?;
        }
        Ok(())
    }

    /// 链路无法分离时没有写端可用，只能直接结束
    fn link_unavailable(&self, mode: Mode, e: linebot_serial::TransportError) -> SessionReport {
        error!("Failed to open transport halves: {}; final STOP not sent", e);
        self.state.set(ControllerState::Terminated);
        self.running.store(true, Ordering::Release);
        SessionReport {
            mode,
            reason: TerminationReason::TransportFailed(e.to_string()),
            cycles: 0,
            dispatched: 0,
            recorded: 0,
            telemetry: MetricsSnapshot::default(),
        }
    }

    fn effective_policy(&self, mode: Mode) -> DispatchPolicy {
        if mode == Mode::Learn && self.config.dispatch_policy == DispatchPolicy::EveryCycle {
            warn!("Recording logs command transitions only, using send-on-change dispatch");
            return DispatchPolicy::OnChange;
        }
        self.config.dispatch_policy
    }

    fn frame_width(&self, reported: f64) -> f64 {
        if reported.is_finite() && reported > 0.0 {
            reported
        } else {
            self.config.frame_width
        }
    }

    fn run_loop<T, V>(
        &self,
        mode: Mode,
        transport: T,
        mut vision: V,
        learn_path: Option<&str>,
    ) -> SessionReport
    where
        T: SplittableTransport,
        V: VisionSource,
    {
        self.state.set(ControllerState::SelectingMode);
        let (rx, tx) = match transport.split() {
            Ok(halves) => halves,
            Err(e) => return self.link_unavailable(mode, e),
        };

        let codec = self.codec();
        let dispatcher = Dispatcher::new(tx, codec, self.effective_policy(mode));
        let mut session = Session::new(mode, dispatcher);

        let mut reason = match self.open(&mut session, rx, learn_path) {
            Ok(()) => {
                self.state.set(ControllerState::entered(mode));
                info!("Entering {} mode ({:?})", mode, self.config.encoding);
                self.drive(&mut session, &mut vision)
            },
            Err(reason) => reason,
        };

        self.finish(&mut session, &mut reason);
        drop(vision);
        self.teardown(session, reason)
    }

    /// 打开日志并启动遥测线程
    fn open<Tx, Rx>(
        &self,
        session: &mut Session<Tx>,
        rx: Rx,
        learn_path: Option<&str>,
    ) -> Result<(), TerminationReason>
    where
        Tx: TxTransport,
        Rx: RxTransport + Send + 'static,
    {
        let storage_failed = |e: linebot_tools::StorageError| {
            error!("{}", e);
            TerminationReason::StorageFailed(e.to_string())
        };

        if let Some(name) = learn_path {
            session.recorder = Some(self.store.create_recorder(name).map_err(storage_failed)?);
        }
        if let Some(name) = &self.cycle_log {
            session.cycle_log = Some(self.store.create_cycle_logger(name).map_err(storage_failed)?);
        }

        let telemetry = TelemetryReader::spawn(rx, self.config.telemetry.clone()).map_err(|e| {
            error!("{}", e);
            TerminationReason::from_error(&e)
        })?;
        session.telemetry = Some(telemetry);
        Ok(())
    }

    /// 控制循环
    fn drive<Tx, V>(&self, session: &mut Session<Tx>, vision: &mut V) -> TerminationReason
    where
        Tx: TxTransport,
        V: VisionSource,
    {
        let mut telemetry_lost = false;

        loop {
            if !self.running.load(Ordering::Acquire) {
                info!("Interrupt received");
                return TerminationReason::Interrupted;
            }

            // 1. 取帧
            let acquired = vision.acquire();
            // 取帧可能阻塞很久，中断期间到达的帧不再决策下发
            if !self.running.load(Ordering::Acquire) {
                info!("Interrupt received while acquiring a frame");
                return TerminationReason::Interrupted;
            }
            let frame = match acquired {
                Ok(frame) => frame,
                Err(e) => {
                    error!("{}", e);
                    return TerminationReason::from_error(&e);
                },
            };
            session.cycles += 1;

            // 2. 决策
            let command = decide(frame.signal, self.frame_width(frame.width));

            // 3. 下发与录制
            match session.dispatcher.dispatch(command) {
                Ok(true) => {
                    if let Some(recorder) = session.recorder.as_mut()
                        && let Err(e) = recorder.record(command)
                    {
                        error!("Recording failed: {}", e);
                        return TerminationReason::StorageFailed(e.to_string());
                    }
                },
                Ok(false) => {},
                Err(e) => {
                    error!("Dispatch of {} failed: {}", command, e);
                    return TerminationReason::TransportFailed(e.to_string());
                },
            }

            // 4. 遥测
            let snapshot = session.telemetry.as_ref().map(|t| t.latest()).unwrap_or_default();
            trace!(
                "Cycle {}: {:?} -> {}, imu #{} {:?}",
                session.cycles,
                frame.signal,
                command,
                snapshot.seq,
                snapshot.sample.as_tuple()
            );
            if !telemetry_lost && session.telemetry.as_ref().is_some_and(|t| !t.is_alive()) {
                telemetry_lost = true;
                warn!("Telemetry thread has exited, samples will no longer update");
            }
            if let Some(cycle_log) = session.cycle_log.as_mut() {
                let powers = session.dispatcher.codec().powers(command);
                if let Err(e) = cycle_log.log(epoch_seconds(), snapshot.sample, powers) {
                    error!("Cycle logging failed: {}", e);
                    return TerminationReason::StorageFailed(e.to_string());
                }
            }

            // 5. 终止条件
            match vision.poll_key() {
                Some(OperatorKey::Stop) => {
                    info!("Stop key pressed");
                    return TerminationReason::StopKey;
                },
                Some(OperatorKey::SavePath) => {
                    if let Err(reason) = self.save_path(session) {
                        return reason;
                    }
                },
                None => {},
            }
        }
    }

    /// 关闭录制器，之后继续巡线
    fn save_path<Tx: TxTransport>(&self, session: &mut Session<Tx>) -> Result<(), TerminationReason> {
        let Some(recorder) = session.recorder.take() else {
            debug!("Save key ignored: not recording");
            return Ok(());
        };

        let rows = recorder.close().map_err(|e| {
            error!("Saving path failed: {}", e);
            TerminationReason::StorageFailed(e.to_string())
        })?;
        session.recorded += rows;
        self.state.set(ControllerState::Following);
        info!("Path saved ({} commands), continuing in follow mode", rows);
        Ok(())
    }

    /// 终止阶段前半：下发 `Stop` 并关闭日志
    ///
    /// 关闭日志失败只在原本正常结束时改写结束原因，不覆盖更早的故障。
    fn finish<Tx: TxTransport>(&self, session: &mut Session<Tx>, reason: &mut TerminationReason) {
        self.state.set(ControllerState::Terminated);
        info!("Terminating {} session: {}", session.mode, reason);

        if let Err(e) = session.dispatcher.force(Command::Stop) {
            error!("Failed to send final STOP: {}", e);
        }

        if let Some(recorder) = session.recorder.take() {
            match recorder.close() {
                Ok(rows) => session.recorded += rows,
                Err(e) => {
                    error!("Closing path log failed: {}", e);
                    if reason.failure_class().is_none() {
                        *reason = TerminationReason::StorageFailed(e.to_string());
                    }
                },
            }
        }

        if let Some(cycle_log) = session.cycle_log.take()
            && let Err(e) = cycle_log.close()
        {
            error!("Closing cycle log failed: {}", e);
            if reason.failure_class().is_none() {
                *reason = TerminationReason::StorageFailed(e.to_string());
            }
        }
    }

    /// 终止阶段后半：停止遥测线程，然后释放链路
    fn teardown<Tx: TxTransport>(
        &self,
        mut session: Session<Tx>,
        reason: TerminationReason,
    ) -> SessionReport {
        let telemetry = match session.telemetry.take() {
            Some(mut reader) => {
                if let Err(e) = reader.shutdown() {
                    error!("{}", e);
                }
                reader.metrics()
            },
            None => MetricsSnapshot::default(),
        };

        let report = SessionReport {
            mode: session.mode,
            reason,
            cycles: session.cycles,
            dispatched: session.dispatcher.dispatched(),
            recorded: session.recorded,
            telemetry,
        };
        drop(session);
        self.running.store(true, Ordering::Release);

        info!(
            "Session ended: {} cycles, {} commands sent, {} recorded, telemetry {:?}",
            report.cycles, report.dispatched, report.recorded, report.telemetry
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::LineFrame;
    use linebot_protocol::LineSignal;
    use linebot_serial::TransportError;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// 写端：记录字节，可设置从第 n 次写开始失败，或只让第 n 次写失败
    #[derive(Clone, Default)]
    struct SharedTx {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        attempts: Arc<AtomicUsize>,
        fail_after: Option<usize>,
        fail_once_at: Option<usize>,
    }

    impl TxTransport for SharedTx {
        fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            let mut sent = self.sent.lock().unwrap();
            if self.fail_after.is_some_and(|n| sent.len() >= n) {
                return Err(TransportError::Disconnected("severed".into()));
            }
            if self.fail_once_at == Some(attempt) {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "write failed",
                )));
            }
            sent.push(bytes.to_vec());
            Ok(())
        }
    }

    struct IdleRx;

    impl RxTransport for IdleRx {
        fn try_read_line(&mut self) -> Result<Option<String>, TransportError> {
            std::thread::sleep(std::time::Duration::from_millis(1));
            Ok(None)
        }
    }

    struct FakeLink {
        tx: SharedTx,
    }

    impl SplittableTransport for FakeLink {
        type Rx = IdleRx;
        type Tx = SharedTx;

        fn split(self) -> Result<(IdleRx, SharedTx), TransportError> {
            Ok((IdleRx, self.tx))
        }
    }

    struct FrameList {
        frames: VecDeque<(Option<f64>, Option<OperatorKey>)>,
        key: Option<OperatorKey>,
    }

    impl FrameList {
        fn new(frames: &[(Option<f64>, Option<OperatorKey>)]) -> Self {
            Self {
                frames: frames.iter().copied().collect(),
                key: None,
            }
        }
    }

    impl VisionSource for FrameList {
        fn acquire(&mut self) -> Result<LineFrame, DriverError> {
            let (offset, key) = self
                .frames
                .pop_front()
                .ok_or_else(|| DriverError::Acquisition("no more frames".into()))?;
            self.key = key;
            Ok(LineFrame {
                signal: offset.map_or(LineSignal::NotFound, LineSignal::found),
                width: 600.0,
            })
        }

        fn poll_key(&mut self) -> Option<OperatorKey> {
            self.key.take()
        }
    }

    fn controller(dir: &tempfile::TempDir) -> ModeController {
        ModeController::new(ControllerConfig::default(), PathStore::new(dir.path())).unwrap()
    }

    fn sent(tx: &SharedTx) -> Vec<Vec<u8>> {
        tx.sent.lock().unwrap().clone()
    }

    #[test]
    fn test_config_validation() {
        assert!(ControllerConfig::default().validate().is_ok());

        let mut config = ControllerConfig {
            frame_width: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DriverError::InvalidConfig(_))));

        config.frame_width = 640.0;
        config.telemetry.join_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.telemetry.join_timeout_ms = 100;
        config.replay.speed = 6.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_follow_until_stop_key() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        let tx = SharedTx::default();
        let vision = FrameList::new(&[
            (Some(300.0), None),
            (Some(300.0), None),
            (Some(50.0), None),
            (None, Some(OperatorKey::Stop)),
            (Some(300.0), None),
        ]);

        let report = ctl.follow(FakeLink { tx: tx.clone() }, vision).unwrap();

        assert_eq!(report.reason, TerminationReason::StopKey);
        assert_eq!(report.cycles, 4);
        // F, L, S（决策）, S（终止）
        assert_eq!(sent(&tx), vec![b"F".to_vec(), b"L".to_vec(), b"S".to_vec(), b"S".to_vec()]);
        assert_eq!(report.dispatched, 4);
        assert_eq!(ctl.state(), ControllerState::Terminated);
        assert_eq!(report.reason.exit_code(), 0);
    }

    #[test]
    fn test_acquisition_failure_sends_stop() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        let tx = SharedTx::default();
        let vision = FrameList::new(&[(Some(500.0), None)]);

        let report = ctl.follow(FakeLink { tx: tx.clone() }, vision).unwrap();

        assert!(matches!(report.reason, TerminationReason::AcquisitionFailed(_)));
        assert_eq!(report.reason.exit_code(), 3);
        assert_eq!(sent(&tx), vec![b"R".to_vec(), b"S".to_vec()]);
    }

    #[test]
    fn test_transport_failure_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        let tx = SharedTx {
            fail_after: Some(1),
            ..Default::default()
        };
        let vision = FrameList::new(&[(Some(300.0), None), (Some(10.0), None), (Some(300.0), None)]);

        let report = ctl.follow(FakeLink { tx: tx.clone() }, vision).unwrap();

        assert!(matches!(report.reason, TerminationReason::TransportFailed(_)));
        assert_eq!(report.reason.exit_code(), 4);
        assert_eq!(report.cycles, 2);
        assert_eq!(sent(&tx), vec![b"F".to_vec()]);
    }

    #[test]
    fn test_interrupt_before_first_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        ctl.running_flag().store(false, Ordering::Release);
        let tx = SharedTx::default();

        let report = ctl
            .follow(FakeLink { tx: tx.clone() }, FrameList::new(&[(Some(1.0), None)]))
            .unwrap();

        assert_eq!(report.reason, TerminationReason::Interrupted);
        assert_eq!(report.cycles, 0);
        assert_eq!(sent(&tx), vec![b"S".to_vec()]);
    }

    #[test]
    fn test_transient_write_failure_still_sends_stop() {
        for (encoding, expected) in [
            (Encoding::Symbolic, vec![b"F".to_vec(), b"S".to_vec()]),
            (
                Encoding::DifferentialPwm(linebot_protocol::DriveSpeeds::default()),
                vec![b"A80B80\n".to_vec(), b"S\n".to_vec()],
            ),
        ] {
            let dir = tempfile::tempdir().unwrap();
            let ctl = ModeController::new(
                ControllerConfig {
                    encoding,
                    ..Default::default()
                },
                PathStore::new(dir.path()),
            )
            .unwrap();
            // 第二次写（转向命令）失败，之后链路恢复
            let tx = SharedTx {
                fail_once_at: Some(1),
                ..Default::default()
            };
            let vision = FrameList::new(&[(Some(300.0), None), (Some(10.0), None), (Some(300.0), None)]);

            let report = ctl.follow(FakeLink { tx: tx.clone() }, vision).unwrap();

            assert!(matches!(report.reason, TerminationReason::TransportFailed(_)));
            assert_eq!(report.reason.exit_code(), 4);
            assert_eq!(report.cycles, 2);
            assert_eq!(sent(&tx), expected);
            assert_eq!(report.dispatched, 2);
        }
    }

    /// 第二次取帧时模拟操作者按下 Ctrl-C，然后才返回一帧转向
    struct InterruptedVision {
        running: Arc<AtomicBool>,
        calls: usize,
    }

    impl VisionSource for InterruptedVision {
        fn acquire(&mut self) -> Result<LineFrame, DriverError> {
            self.calls += 1;
            if self.calls == 2 {
                std::thread::sleep(std::time::Duration::from_millis(20));
                self.running.store(false, Ordering::Release);
                return Ok(LineFrame {
                    signal: LineSignal::found(10.0),
                    width: 600.0,
                });
            }
            Ok(LineFrame {
                signal: LineSignal::found(300.0),
                width: 600.0,
            })
        }
    }

    #[test]
    fn test_interrupt_during_acquire_skips_pending_frame() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        let tx = SharedTx::default();
        let vision = InterruptedVision {
            running: ctl.running_flag(),
            calls: 0,
        };

        let report = ctl.follow(FakeLink { tx: tx.clone() }, vision).unwrap();

        assert_eq!(report.reason, TerminationReason::Interrupted);
        assert_eq!(report.cycles, 1);
        // 中断后到达的转向帧没有下发
        assert_eq!(sent(&tx), vec![b"F".to_vec(), b"S".to_vec()]);
    }

    #[test]
    fn test_running_flag_rearmed_after_session() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        ctl.running_flag().store(false, Ordering::Release);

        let report = ctl
            .follow(FakeLink { tx: SharedTx::default() }, FrameList::new(&[(Some(1.0), None)]))
            .unwrap();
        assert_eq!(report.reason, TerminationReason::Interrupted);
        assert!(ctl.running_flag().load(Ordering::Acquire));

        let tx = SharedTx::default();
        let report = ctl
            .follow(
                FakeLink { tx: tx.clone() },
                FrameList::new(&[(Some(300.0), Some(OperatorKey::Stop))]),
            )
            .unwrap();
        assert_eq!(report.reason, TerminationReason::StopKey);
        assert_eq!(report.cycles, 1);
        assert_eq!(sent(&tx), vec![b"F".to_vec(), b"S".to_vec()]);
    }

    #[test]
    fn test_learn_records_transitions_and_save_key() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = ModeController::new(
            ControllerConfig {
                dispatch_policy: DispatchPolicy::EveryCycle,
                ..Default::default()
            },
            PathStore::new(dir.path()),
        )
        .unwrap();
        let tx = SharedTx::default();
        let vision = FrameList::new(&[
            (Some(300.0), None),
            (Some(300.0), None),
            (Some(50.0), Some(OperatorKey::SavePath)),
            (Some(550.0), None),
            (None, Some(OperatorKey::Stop)),
        ]);

        let report = ctl.learn(FakeLink { tx: tx.clone() }, vision, "hall").unwrap();

        assert_eq!(report.mode, Mode::Learn);
        assert_eq!(report.reason, TerminationReason::StopKey);
        // 学习模式强制 send-on-change
        assert_eq!(
            sent(&tx),
            vec![b"F".to_vec(), b"L".to_vec(), b"R".to_vec(), b"S".to_vec(), b"S".to_vec()]
        );
        // 保存键之后不再录制
        assert_eq!(report.recorded, 2);
        let log = ctl.store().load("hall").unwrap();
        let cmds: Vec<_> = log.entries.iter().map(|e| e.command).collect();
        assert_eq!(cmds, vec![Command::Forward, Command::Left]);
    }

    #[test]
    fn test_learn_open_failure_is_storage_failure() {
        let dir = tempfile::tempdir().unwrap();
        // 路径目录位置被一个普通文件占用
        let blocker = dir.path().join("paths");
        std::fs::write(&blocker, "not a directory").unwrap();
        let ctl = ModeController::new(ControllerConfig::default(), PathStore::new(&blocker)).unwrap();
        let tx = SharedTx::default();

        let report = ctl
            .learn(FakeLink { tx: tx.clone() }, FrameList::new(&[(Some(1.0), None)]), "x")
            .unwrap();

        assert!(matches!(report.reason, TerminationReason::StorageFailed(_)));
        assert_eq!(report.reason.exit_code(), 5);
        assert_eq!(report.cycles, 0);
        assert_eq!(sent(&tx), vec![b"S".to_vec()]);
    }

    #[test]
    fn test_invalid_names_rejected_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        let result = ctl.learn(
            FakeLink {
                tx: SharedTx::default(),
            },
            FrameList::new(&[]),
            "../x",
        );
        assert!(matches!(result, Err(ref e) if e.failure_class() == FailureClass::Config));
        assert_eq!(ctl.state(), ControllerState::SelectingMode);
    }

    #[test]
    fn test_cycle_log_rows() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = ModeController::new(
            ControllerConfig {
                encoding: Encoding::DifferentialPwm(linebot_protocol::DriveSpeeds::default()),
                ..Default::default()
            },
            PathStore::new(dir.path()),
        )
        .unwrap()
        .with_cycle_log("run");
        let vision = FrameList::new(&[(Some(300.0), None), (None, Some(OperatorKey::Stop))]);

        ctl.follow(
            FakeLink {
                tx: SharedTx::default(),
            },
            vision,
        )
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join("run.cycles.csv")).unwrap();
        let rows: Vec<_> = content.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with(",0,0,0,80,80"), "{}", rows[0]);
        assert!(rows[1].ends_with(",0,0,0,0,0"), "{}", rows[1]);
    }

    #[test]
    fn test_cycle_log_uses_configured_symbolic_speeds() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = ModeController::new(
            ControllerConfig {
                drive_speeds: DriveSpeeds {
                    base_speed: 100,
                    turn_speed: 20,
                },
                ..Default::default()
            },
            PathStore::new(dir.path()),
        )
        .unwrap()
        .with_cycle_log("sym");
        let tx = SharedTx::default();
        let vision = FrameList::new(&[(Some(10.0), None), (Some(300.0), Some(OperatorKey::Stop))]);

        ctl.follow(FakeLink { tx: tx.clone() }, vision).unwrap();

        // 线上仍是符号编码
        assert_eq!(sent(&tx), vec![b"L".to_vec(), b"F".to_vec(), b"S".to_vec()]);
        let content = std::fs::read_to_string(dir.path().join("sym.cycles.csv")).unwrap();
        let rows: Vec<_> = content.lines().skip(1).collect();
        assert!(rows[0].ends_with(",20,100"), "{}", rows[0]);
        assert!(rows[1].ends_with(",100,100"), "{}", rows[1]);
    }

    #[test]
    fn test_replay_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctl = controller(&dir);
        let tx = SharedTx::default();

        let report = ctl.replay(FakeLink { tx: tx.clone() }, "ghost").unwrap();

        assert_eq!(report.reason, TerminationReason::ReplayFinished(ReplayOutcome::Missing));
        assert_eq!(report.reason.exit_code(), 0);
        // 只有终止时的 STOP
        assert_eq!(sent(&tx), vec![b"S".to_vec()]);
    }

    #[test]
    fn test_reason_mapping() {
        assert_eq!(
            TerminationReason::from_error(&DriverError::Acquisition("eof".into())).failure_class(),
            Some(FailureClass::Acquisition)
        );
        assert_eq!(
            TerminationReason::from_error(&DriverError::IoThread("spawn".into())).failure_class(),
            Some(FailureClass::Transport)
        );
        assert_eq!(TerminationReason::StopKey.failure_class(), None);
    }
}
