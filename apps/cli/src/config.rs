//! CLI 配置文件
//!
//! 默认位置 `<config_dir>/linebot/config.toml`，可用 `--config` 指定。
//! 文件中缺省的项取默认值，命令行参数再覆盖文件中的值。
//!
//! ```toml
//! encoding = "pwm"
//! base_speed = 80
//! turn_speed = 50
//! dispatch = "on-change"
//! paths_dir = "paths"
//! frame_width = 640.0
//!
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! read_timeout_ms = 100
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use linebot_driver::{ControllerConfig, DispatchPolicy, ReplayConfig};
use linebot_protocol::{DriveSpeeds, Encoding};
use linebot_serial::SerialConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 线上编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingKind {
    /// 单字节 L/R/F/S
    #[default]
    Symbolic,
    /// `A{left}B{right}\n`
    Pwm,
}

/// 下发策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchKind {
    #[default]
    OnChange,
    EveryCycle,
}

impl From<DispatchKind> for DispatchPolicy {
    fn from(kind: DispatchKind) -> Self {
        match kind {
            DispatchKind::OnChange => DispatchPolicy::OnChange,
            DispatchKind::EveryCycle => DispatchPolicy::EveryCycle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSection {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub encoding: EncodingKind,
    /// 直行以及转弯外侧轮功率（PWM 编码）
    pub base_speed: u8,
    /// 转弯内侧轮功率（PWM 编码）
    pub turn_speed: u8,
    pub dispatch: DispatchKind,
    /// 路径保存目录
    pub paths_dir: PathBuf,
    /// 帧宽（像素）
    pub frame_width: f64,
    pub serial: SerialSection,
}

impl Default for CliConfig {
    fn default() -> Self {
        let speeds = DriveSpeeds::default();
        Self {
            encoding: EncodingKind::default(),
            base_speed: speeds.base_speed,
            turn_speed: speeds.turn_speed,
            dispatch: DispatchKind::default(),
            paths_dir: PathBuf::from("paths"),
            frame_width: 640.0,
            serial: SerialSection::default(),
        }
    }
}

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("cannot determine the user config directory")?;
    path.push("linebot");
    path.push("config.toml");
    Ok(path)
}

impl CliConfig {
    /// 加载配置
    ///
    /// 显式指定的文件必须存在；默认位置的文件不存在时使用默认配置。
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        if explicit.is_none() && !path.exists() {
            return Ok((Self::default(), path));
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok((config, path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn drive_speeds(&self) -> DriveSpeeds {
        DriveSpeeds {
            base_speed: self.base_speed,
            turn_speed: self.turn_speed,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self.encoding {
            EncodingKind::Symbolic => Encoding::Symbolic,
            EncodingKind::Pwm => Encoding::DifferentialPwm(self.drive_speeds()),
        }
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
        }
    }

    /// 解析为控制器配置
    pub fn controller_config(&self, replay_speed: f64) -> ControllerConfig {
        ControllerConfig {
            encoding: self.encoding(),
            drive_speeds: self.drive_speeds(),
            dispatch_policy: self.dispatch.into(),
            frame_width: self.frame_width,
            replay: ReplayConfig {
                speed: replay_speed,
            },
            ..Default::default()
        }
    }
}
