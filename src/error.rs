use std::path::PathBuf;

use thiserror::Error;

/// 读取单个网卡计数器时的错误
#[derive(Error, Debug)]
pub enum CounterError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid counter value {value:?} in {path}")]
    Parse { path: PathBuf, value: String },
}

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("display sink error: {0}")]
    Sink(String),

    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("no tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = IndicatorError> = std::result::Result<T, E>;
