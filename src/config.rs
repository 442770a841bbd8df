//! 配置文件：`$XDG_CONFIG_HOME/netindicator/config.toml`
//!
//! 所有字段都有默认值，文件不存在时使用默认配置。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{IndicatorError, Result};
use crate::modules::links::LinkFilter;
use crate::modules::network::DEFAULT_SYSFS_ROOT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Stdout,
    Waybar,
    Notification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// 采样间隔（秒），至少 1
    pub interval_secs: u64,
    /// 网卡扫描间隔（秒）
    pub scan_interval_secs: u64,
    /// 屏幕 / 省电状态轮询间隔（秒）
    pub run_state_poll_secs: u64,
    pub sink: SinkKind,
    /// 以这些前缀开头的网卡不计入
    pub ignore_prefixes: Vec<String>,
    /// 计入 VPN 隧道、网桥等虚拟网卡；其流量通常已在物理网卡上计过一次
    pub include_virtual: bool,
    pub sysfs_root: PathBuf,
    pub watch_run_state: bool,
    /// 状态栏文本后追加时间
    pub timestamp: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            scan_interval_secs: 2,
            run_state_poll_secs: 5,
            sink: SinkKind::Stdout,
            ignore_prefixes: vec!["lo".to_string()],
            include_virtual: false,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            watch_run_state: true,
            timestamp: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml_edit::de::from_str(text).map_err(|err| IndicatorError::Config(err.to_string()))
    }

    /// 读取配置文件；文件不存在时返回默认配置
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)
                .map_err(|err| IndicatorError::Config(format!("{}: {}", path.display(), err))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn load_default() -> Result<Self> {
        match default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("interval_secs", self.interval_secs),
            ("scan_interval_secs", self.scan_interval_secs),
            ("run_state_poll_secs", self.run_state_poll_secs),
        ];
        for (name, value) in positive.iter() {
            if *value < 1 {
                return Err(IndicatorError::InvalidConfiguration(format!(
                    "{} must be at least 1 second",
                    name
                )));
            }
        }
        if self.ignore_prefixes.iter().any(String::is_empty) {
            // 空前缀会忽略所有网卡
            return Err(IndicatorError::InvalidConfiguration(
                "ignore_prefixes must not contain an empty prefix".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn run_state_poll(&self) -> Duration {
        Duration::from_secs(self.run_state_poll_secs)
    }

    pub fn link_filter(&self) -> LinkFilter {
        LinkFilter::new(self.ignore_prefixes.clone(), self.include_virtual)
    }
}

/// `$XDG_CONFIG_HOME/netindicator/config.toml`，未设置时退回 `~/.config`
pub fn default_path() -> Option<PathBuf> {
    config_dir(
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
    .map(|dir| dir.join("netindicator").join("config.toml"))
}

fn config_dir(xdg: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    match xdg {
        Some(dir) if dir.is_absolute() => Some(dir),
        _ => home.map(|home| home.join(".config")),
    }
}
