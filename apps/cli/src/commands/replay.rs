//! replay 命令
//!
//! 按原始节奏回放已保存的路径

use super::{LinkArgs, install_interrupt_handler, open_link, print_report};
use crate::config::CliConfig;
use anyhow::Result;
use clap::Args;
use linebot_driver::{MAX_REPLAY_SPEED, ModeController, RECOMMENDED_REPLAY_SPEED};
use linebot_tools::PathStore;
use std::io::Write;

/// 回放命令参数
#[derive(Args, Debug)]
pub struct ReplayCommand {
    /// 路径名称
    pub name: String,

    /// 回放速度倍数（1.0 = 原始节奏）
    ///
    /// - 1.0x: 原始速度（推荐）
    /// - > 2.0x: 需要特别小心
    /// - 最大值: 5.0x
    #[arg(short, long, default_value_t = 1.0)]
    pub speed: f64,

    /// 跳过回放前确认
    #[arg(short = 'y', long)]
    pub yes: bool,

    #[command(flatten)]
    pub link: LinkArgs,
}

impl ReplayCommand {
    /// 执行回放，返回退出码
    pub fn execute(&self, mut config: CliConfig) -> Result<i32> {
        self.link.apply(&mut config);

        // 速度在这里校验，避免确认之后才报错
        let controller = ModeController::new(
            config.controller_config(self.speed),
            PathStore::new(&config.paths_dir),
        )?;

        println!("════════════════════════════════════════");
        println!("           回放模式");
        println!("════════════════════════════════════════");
        println!();
        println!("📁 路径: {}", self.name);
        println!("⚡ 速度: {:.2}x (最大 {:.1}x)", self.speed, MAX_REPLAY_SPEED);
        if self.speed > RECOMMENDED_REPLAY_SPEED {
            println!("⚠️  警告: 速度超过推荐值 ({:.1}x)", RECOMMENDED_REPLAY_SPEED);
        }
        println!();

        if !self.yes && !confirm("即将开始回放，确定要继续吗？[y/N] ")? {
            println!("❌ 操作已取消");
            return Ok(0);
        }

        install_interrupt_handler(controller.running_flag())?;
        let link = open_link(&config)?;

        println!("💡 提示: 按 Ctrl-C 可随时停止回放");
        let report = controller.replay(link, &self.name)?;
        print_report(&report);
        Ok(report.reason.exit_code())
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase().starts_with('y'))
}
