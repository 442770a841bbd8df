use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;
use crate::error::{IndicatorError, Result};

/// 日志写到 stderr，stdout 留给状态栏输出
///
/// 过滤级别优先取 `RUST_LOG`，否则使用配置中的 `level`。
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|err| IndicatorError::Config(format!("invalid log level {:?}: {}", level, err)))?,
    };

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|err| IndicatorError::Config(err.to_string()))
}
