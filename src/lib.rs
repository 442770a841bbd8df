//! 网速指示器：按固定间隔采样各网卡字节计数，汇总为上传/下载速率，
//! 仅在显示内容变化时重新绘制。

pub mod config;
pub mod error;
pub mod lock_utils;
pub mod logging;
pub mod modules;

pub use error::{CounterError, IndicatorError, Result};
