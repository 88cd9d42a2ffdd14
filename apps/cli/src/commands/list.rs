//! list 命令
//!
//! 列出已保存的路径

use anyhow::Result;
use clap::Args;
use linebot_tools::PathStore;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub struct ListCommand {
    /// 路径保存目录（覆盖配置）
    #[arg(long)]
    pub paths_dir: Option<PathBuf>,
}

impl ListCommand {
    pub fn execute(&self, default_dir: PathBuf) -> Result<i32> {
        let store = PathStore::new(self.paths_dir.clone().unwrap_or(default_dir));
        let names = store.list()?;

        if names.is_empty() {
            println!("(没有已保存的路径: {})", store.dir().display());
            return Ok(0);
        }

        println!("已保存的路径 ({}):", store.dir().display());
        for name in names {
            match store.load(&name) {
                Ok(log) => println!(
                    "  {:<20} {:>4} 条命令  {:>7.2}s",
                    name,
                    log.len(),
                    log.duration().unwrap_or_default().as_secs_f64()
                ),
                Err(e) => println!("  {:<20} (无法读取: {})", name, e),
            }
        }
        Ok(0)
    }
}
