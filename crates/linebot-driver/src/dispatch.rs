//! 命令下发
//!
//! [`Dispatcher`] 独占链路写端，是唯一向 MCU 写命令的地方。

use linebot_protocol::{Command, CommandCodec};
use linebot_serial::{TransportError, TxTransport};
use tracing::debug;

/// 下发策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// 每个周期都发送，即使命令没有变化
    EveryCycle,
    /// 只在命令变化时发送（录制时强制使用）
    #[default]
    OnChange,
}

pub struct Dispatcher<T: TxTransport> {
    tx: T,
    codec: CommandCodec,
    policy: DispatchPolicy,
    last_dispatched: Option<Command>,
    dispatched: u64,
}

impl<T: TxTransport> Dispatcher<T> {
    pub fn new(tx: T, codec: CommandCodec, policy: DispatchPolicy) -> Self {
        Self {
            tx,
            codec,
            policy,
            last_dispatched: None,
            dispatched: 0,
        }
    }

    pub fn codec(&self) -> &CommandCodec {
        &self.codec
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// 最近一次成功下发的命令
    pub fn last_dispatched(&self) -> Option<Command> {
        self.last_dispatched
    }

    /// 已成功下发的命令数
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// 按策略下发
    ///
    /// 返回 `Ok(true)` 表示本次确实写到了链路上。写失败时 `last_dispatched` 不更新。
    pub fn dispatch(&mut self, command: Command) -> Result<bool, TransportError> {
        if self.policy == DispatchPolicy::OnChange && self.last_dispatched == Some(command) {
            return Ok(false);
        }
        self.force(command)?;
        Ok(true)
    }

    /// 无条件下发（回放行、终止时的 `Stop`）
    pub fn force(&mut self, command: Command) -> Result<(), TransportError> {
        let bytes = self.codec.encode(command);
        self.tx.send(&bytes)?;
        self.last_dispatched = Some(command);
        self.dispatched += 1;
        debug!("Dispatched {} ({:?})", command, String::from_utf8_lossy(&bytes));
        Ok(())
    }
}
