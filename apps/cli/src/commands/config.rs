//! config 命令
//!
//! 查看或生成配置文件

use crate::config::CliConfig;
use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::fs;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置
    Show,

    /// 写入默认配置文件
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(&self, config: &CliConfig, path: &Path) -> Result<i32> {
        match self {
            ConfigCommand::Show => {
                let source = if path.exists() { "" } else { "（文件不存在，使用默认值）" };
                println!("# 配置文件: {}{}", path.display(), source);
                print!("{}", config.to_toml()?);
            },
            ConfigCommand::Init { force } => {
                write_default(path, *force)?;
                println!("✅ 已写入默认配置: {}", path.display());
            },
        }
        Ok(0)
    }
}

fn write_default(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let content = format!("# linebot configuration\n\n{}", CliConfig::default().to_toml()?);
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
