use std::convert::TryFrom;
use std::ops::{Add, AddAssign};

/// 一次计数器读数（毫秒时间戳 + 累计字节数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reading {
    pub time_ms: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

/// 上传/下载速率，单位 B/s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct AggregateRate {
    pub tx_bytes_per_sec: u64,
    pub rx_bytes_per_sec: u64,
}

impl AggregateRate {
    pub const ZERO: AggregateRate = AggregateRate {
        tx_bytes_per_sec: 0,
        rx_bytes_per_sec: 0,
    };

    pub fn new(tx_bytes_per_sec: u64, rx_bytes_per_sec: u64) -> Self {
        Self {
            tx_bytes_per_sec,
            rx_bytes_per_sec,
        }
    }
}

impl Add for AggregateRate {
    type Output = AggregateRate;

    fn add(self, other: AggregateRate) -> AggregateRate {
        AggregateRate {
            tx_bytes_per_sec: self.tx_bytes_per_sec.saturating_add(other.tx_bytes_per_sec),
            rx_bytes_per_sec: self.rx_bytes_per_sec.saturating_add(other.rx_bytes_per_sec),
        }
    }
}

impl AddAssign for AggregateRate {
    fn add_assign(&mut self, other: AggregateRate) {
        *self = *self + other;
    }
}

/// Δbytes / Δt，向下取整。时间没有前进或计数没有增长时为 0。
pub fn byte_rate(prev_bytes: u64, curr_bytes: u64, elapsed_ms: u64) -> u64 {
    if elapsed_ms == 0 || curr_bytes <= prev_bytes {
        return 0;
    }
    // u128 整数运算，避免浮点截断误差
    let delta = u128::from(curr_bytes - prev_bytes);
    let rate = delta * 1000 / u128::from(elapsed_ms);
    u64::try_from(rate).unwrap_or(u64::MAX)
}

/// 两次读数之间的速率。
///
/// 任何非单调的观测（时钟未前进、任一计数器未严格增长，包括网卡重启导致的
/// 计数器归零）都按 0 处理，上传和下载一起置零。
pub fn sample_rate(prev: &Reading, curr: &Reading) -> AggregateRate {
    if curr.time_ms <= prev.time_ms
        || curr.tx_bytes <= prev.tx_bytes
        || curr.rx_bytes <= prev.rx_bytes
    {
        return AggregateRate::ZERO;
    }

    let elapsed_ms = curr.time_ms - prev.time_ms;
    AggregateRate {
        tx_bytes_per_sec: byte_rate(prev.tx_bytes, curr.tx_bytes, elapsed_ms),
        rx_bytes_per_sec: byte_rate(prev.rx_bytes, curr.rx_bytes, elapsed_ms),
    }
}

/// 是否为非单调观测（不同于单纯的空闲）
pub fn is_non_monotonic(prev: &Reading, curr: &Reading) -> bool {
    curr.time_ms <= prev.time_ms || curr.tx_bytes < prev.tx_bytes || curr.rx_bytes < prev.rx_bytes
}
