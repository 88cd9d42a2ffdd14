//! learn 命令
//!
//! 巡线并把命令切换录制为一条命名路径

use super::{LinkArgs, LoopArgs, install_interrupt_handler, open_link, print_report};
use crate::config::CliConfig;
use anyhow::Result;
use clap::Args;
use linebot_driver::ModeController;
use linebot_tools::PathStore;

/// 学习命令参数
#[derive(Args, Debug, Default)]
pub struct LearnCommand {
    /// 路径名称（保存为 `<paths_dir>/<name>.csv`，同名文件会被覆盖）
    pub name: String,

    #[command(flatten)]
    pub link: LinkArgs,

    #[command(flatten)]
    pub frames: LoopArgs,
}

impl LearnCommand {
    /// 执行学习，返回退出码
    pub fn execute(&self, mut config: CliConfig) -> Result<i32> {
        self.link.apply(&mut config);
        self.frames.apply(&mut config);

        let store = PathStore::new(&config.paths_dir);
        PathStore::validate_name(&self.name)?;

        let mut controller = ModeController::new(config.controller_config(1.0), store)?;
        if let Some(name) = &self.frames.cycle_log {
            controller = controller.with_cycle_log(name);
        }
        install_interrupt_handler(controller.running_flag())?;

        let vision = self.frames.vision(config.frame_width, controller.running_flag())?;
        let link = open_link(&config)?;

        println!("📝 学习路径 '{}'... 帧输入中的 `save` 保存路径，`stop` 或 Ctrl-C 结束", self.name);
        let report = controller.learn(link, vision, &self.name)?;
        print_report(&report);
        if report.recorded > 0 {
            println!(
                "💾 已保存: {}",
                controller.store().dir().join(format!("{}.csv", self.name)).display()
            );
        }
        Ok(report.reason.exit_code())
    }
}
