//! # linebot
//!
//! 巡线小车命令行工具。
//!
//! ```bash
//! # 巡线（帧来自外部视觉进程）
//! vision-frontend | linebot follow --port /dev/ttyUSB0
//!
//! # 学习一条路径，帧输入中出现 `save` 时保存
//! vision-frontend | linebot learn kitchen --encoding pwm
//!
//! # 回放
//! linebot replay kitchen --speed 1.5
//!
//! # 列出已保存的路径
//! linebot list
//! ```
//!
//! 退出码：0 正常，2 配置/用法错误，3 取帧失败，4 串口失败，5 存储失败。

use anyhow::Result;
use clap::{Parser, Subcommand};
use linebot_driver::{DriverError, FailureClass};
use linebot_serial::TransportError;
use linebot_tools::StorageError;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod commands;
mod config;

use commands::{ConfigCommand, FollowCommand, LearnCommand, ListCommand, ReplayCommand};
use config::CliConfig;

/// linebot - 巡线小车控制器
#[derive(Parser, Debug)]
#[command(name = "linebot")]
#[command(about = "Line-following robot controller with path learning and replay", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（默认 `<config_dir>/linebot/config.toml`）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 巡线
    Follow {
        #[command(flatten)]
        args: FollowCommand,
    },

    /// 巡线并录制路径
    Learn {
        #[command(flatten)]
        args: LearnCommand,
    },

    /// 回放已保存的路径
    Replay {
        #[command(flatten)]
        args: ReplayCommand,
    },

    /// 列出已保存的路径
    List {
        #[command(flatten)]
        args: ListCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_tracing(verbose: bool) {
    let directive = if verbose { "linebot=debug" } else { "linebot=info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match directive.parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<i32> {
    let (config, path) = CliConfig::load(cli.config.as_deref())?;
    debug!("Resolved config ({}): {:?}", path.display(), config);

    match cli.command {
        Commands::Follow { args } => args.execute(config),
        Commands::Learn { args } => args.execute(config),
        Commands::Replay { args } => args.execute(config),
        Commands::List { args } => args.execute(config.paths_dir),
        Commands::Config(cmd) => cmd.execute(&config, &path),
    }
}

/// 按错误链中最具体的错误确定退出码
fn exit_code_for(error: &anyhow::Error) -> i32 {
    let class = error.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<DriverError>() {
            Some(e.failure_class())
        } else if let Some(e) = cause.downcast_ref::<StorageError>() {
            Some(match e {
                StorageError::InvalidName { .. } => FailureClass::Config,
                _ => FailureClass::Storage,
            })
        } else if cause.downcast_ref::<TransportError>().is_some() {
            Some(FailureClass::Transport)
        } else {
            None
        }
    });
    class.unwrap_or(FailureClass::Config).exit_code()
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            exit_code_for(&e)
        },
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
