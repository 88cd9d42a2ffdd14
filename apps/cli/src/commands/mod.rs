//! 命令定义和实现

pub mod config;
pub mod follow;
pub mod learn;
pub mod list;
pub mod replay;

pub use config::ConfigCommand;
pub use follow::FollowCommand;
pub use learn::LearnCommand;
pub use list::ListCommand;
pub use replay::ReplayCommand;

use crate::config::{CliConfig, DispatchKind, EncodingKind};
use anyhow::{Context, Result};
use clap::Args;
use linebot_driver::{
    InterruptibleReader, ScriptedVision, SessionReport, TerminationReason, VisionSource,
};
use linebot_serial::SerialTransport;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// 串口与存储参数（覆盖配置文件）
#[derive(Args, Debug, Default, Clone)]
pub struct LinkArgs {
    /// 串口设备
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 命令编码
    #[arg(short, long, value_enum)]
    pub encoding: Option<EncodingKind>,

    /// 路径保存目录
    #[arg(long)]
    pub paths_dir: Option<PathBuf>,
}

impl LinkArgs {
    pub fn apply(&self, config: &mut CliConfig) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(dir) = &self.paths_dir {
            config.paths_dir = dir.clone();
        }
    }
}

/// 控制循环参数（巡线和学习共用）
#[derive(Args, Debug, Default, Clone)]
pub struct LoopArgs {
    /// 帧输入文件（每行 `<offset>|none [stop|save]`），默认读标准输入
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// 帧宽（像素）
    #[arg(long)]
    pub frame_width: Option<f64>,

    /// 下发策略
    #[arg(long, value_enum)]
    pub dispatch: Option<DispatchKind>,

    /// 同时写逐周期日志 `<name>.cycles.csv`
    #[arg(long, value_name = "NAME")]
    pub cycle_log: Option<String>,
}

impl LoopArgs {
    pub fn apply(&self, config: &mut CliConfig) {
        if let Some(width) = self.frame_width {
            config.frame_width = width;
        }
        if let Some(dispatch) = self.dispatch {
            config.dispatch = dispatch;
        }
    }

    /// 打开帧源
    ///
    /// 读取在辅助线程上进行，`running` 清除后阻塞中的取帧立即返回。
    pub fn vision(
        &self,
        frame_width: f64,
        running: Arc<AtomicBool>,
    ) -> Result<Box<dyn VisionSource>> {
        let reader = match &self.input {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("failed to open frame input {}", path.display()))?;
                InterruptibleReader::spawn(file, running)?
            },
            None => InterruptibleReader::spawn(std::io::stdin(), running)?,
        };
        Ok(Box::new(ScriptedVision::new(reader, frame_width)))
    }
}

/// 打开串口
pub fn open_link(config: &CliConfig) -> Result<SerialTransport> {
    let serial = config.serial_config();
    println!("⏳ 打开串口 {} @ {} baud...", serial.port, serial.baud_rate);
    let link = SerialTransport::open(&serial)?;
    info!("Serial link open: {} @ {}", serial.port, serial.baud_rate);
    println!("✅ 已连接");
    Ok(link)
}

/// 注册 Ctrl-C 处理器
///
/// 清除运行标志，会话走正常终止流程（发送 STOP、保存日志）。
/// 重复按下不会跳过终止流程。
pub fn install_interrupt_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        if running.swap(false, Ordering::SeqCst) {
            eprintln!();
            eprintln!("🛑 收到停止信号，正在停止...");
        } else {
            eprintln!("⏳ 正在停止，等待发送 STOP...");
        }
    })
    .context("failed to install Ctrl-C handler")
}

/// 打印会话报告
pub fn print_report(report: &SessionReport) {
    println!();
    match &report.reason {
        TerminationReason::Interrupted => println!("⚠️  会话被中断"),
        TerminationReason::StopKey => println!("✅ 会话已停止"),
        TerminationReason::ReplayFinished(outcome) => println!("✅ 回放结束: {:?}", outcome),
        failure => println!("❌ 会话失败: {}", failure),
    }
    println!("   模式: {}", report.mode);
    println!("   周期: {}", report.cycles);
    println!("   下发: {}", report.dispatched);
    if report.recorded > 0 {
        println!("   录制: {} 条命令", report.recorded);
    }
    println!(
        "   遥测: {} 条样本 / {} 行 (丢弃 {})",
        report.telemetry.samples_published,
        report.telemetry.lines_total,
        report.telemetry.parse_errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_args_override_config() {
        let mut config = CliConfig::default();
        let args = LinkArgs {
            port: Some("/dev/ttyACM1".into()),
            encoding: Some(EncodingKind::Pwm),
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.encoding, EncodingKind::Pwm);
    }

    #[test]
    fn test_loop_args_override_config() {
        let mut config = CliConfig::default();
        LoopArgs {
            frame_width: Some(320.0),
            dispatch: Some(DispatchKind::EveryCycle),
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.frame_width, 320.0);
        assert_eq!(config.dispatch, DispatchKind::EveryCycle);
    }

    #[test]
    fn test_missing_frame_input() {
        let args = LoopArgs {
            input: Some(PathBuf::from("/nonexistent/frames.txt")),
            ..Default::default()
        };
        assert!(args.vision(640.0, Arc::new(AtomicBool::new(true))).is_err());
    }

    #[test]
    fn test_frame_file_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.txt");
        std::fs::write(&path, "100\nnone stop\n").unwrap();

        let args = LoopArgs {
            input: Some(path),
            ..Default::default()
        };
        let mut vision = args.vision(600.0, Arc::new(AtomicBool::new(true))).unwrap();
        let frame = vision.acquire().unwrap();
        assert_eq!(frame.width, 600.0);
        assert!(frame.signal.is_found());
        assert!(!vision.acquire().unwrap().signal.is_found());
    }
}
