//! 字节速率 → 显示单位
//!
//! 千比特阶段向上取整（有流量时不会显示 0），兆比特阶段四舍五入（数值大时
//! ±0.5 Mbit 不重要，避免跳动）。

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Kbit,
    Mbit,
}

impl RateUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            RateUnit::Kbit => "Kbit",
            RateUnit::Mbit => "Mbit",
        }
    }

    pub fn initial(self) -> char {
        match self {
            RateUnit::Kbit => 'K',
            RateUnit::Mbit => 'M',
        }
    }

    fn bits(self) -> u64 {
        match self {
            RateUnit::Kbit => 1000,
            RateUnit::Mbit => 1_000_000,
        }
    }
}

/// 一位/两位数为 Narrow，图标中需补一个空格保持等宽
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitWidth {
    Narrow,
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattedRate {
    pub value: u64,
    pub unit: RateUnit,
    pub width: DigitWidth,
}

pub fn format_rate(bytes_per_sec: u64) -> FormattedRate {
    let bits = bytes_per_sec.saturating_mul(8);

    // 向上取整到 Kbit
    let kbits = bits / 1000 + u64::from(bits % 1000 != 0);

    let (value, unit) = if kbits >= 1000 {
        // 四舍五入到 Mbit
        ((kbits + 500) / 1000, RateUnit::Mbit)
    } else {
        (kbits, RateUnit::Kbit)
    };

    let width = if value < 100 {
        DigitWidth::Narrow
    } else {
        DigitWidth::Wide
    };

    FormattedRate { value, unit, width }
}

impl FormattedRate {
    /// 图标中的一行，例如 "12 K"、"345M"
    pub fn glyph_line(&self) -> String {
        let pad = match self.width {
            DigitWidth::Narrow => " ",
            DigitWidth::Wide => "",
        };
        format!("{}{}{}", self.value, pad, self.unit.initial())
    }

    /// 该显示值对应的字节速率
    pub fn approx_bytes_per_sec(&self) -> u64 {
        self.value.saturating_mul(self.unit.bits()) / 8
    }
}

impl fmt::Display for FormattedRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/s", self.value, self.unit.as_str())
    }
}
