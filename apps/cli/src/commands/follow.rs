//! follow 命令
//!
//! 巡线：逐帧决策并下发命令，不录制

use super::{LinkArgs, LoopArgs, install_interrupt_handler, open_link, print_report};
use crate::config::CliConfig;
use anyhow::Result;
use clap::Args;
use linebot_driver::ModeController;
use linebot_tools::PathStore;

/// 巡线命令参数
#[derive(Args, Debug, Default)]
pub struct FollowCommand {
    #[command(flatten)]
    pub link: LinkArgs,

    #[command(flatten)]
    pub frames: LoopArgs,
}

impl FollowCommand {
    /// 执行巡线，返回退出码
    pub fn execute(&self, mut config: CliConfig) -> Result<i32> {
        self.link.apply(&mut config);
        self.frames.apply(&mut config);

        let mut controller = ModeController::new(
            config.controller_config(1.0),
            PathStore::new(&config.paths_dir),
        )?;
        if let Some(name) = &self.frames.cycle_log {
            controller = controller.with_cycle_log(name);
        }
        install_interrupt_handler(controller.running_flag())?;

        let vision = self.frames.vision(config.frame_width, controller.running_flag())?;
        let link = open_link(&config)?;

        println!("🚗 巡线中... 按 Ctrl-C 停止");
        let report = controller.follow(link, vision)?;
        print_report(&report);
        Ok(report.reason.exit_code())
    }
}
