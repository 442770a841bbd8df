use tracing::warn;

use super::format::{format_rate, FormattedRate};
use super::glyph::Glyph;
use super::rate::AggregateRate;
use crate::error::Result;

/// 显示端：接收标题和图标，或者撤下指示器
pub trait DisplaySink {
    fn show(&mut self, title: &str, glyph: &Glyph, ongoing: bool) -> Result<()>;
    fn dismiss(&mut self) -> Result<()>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn show(&mut self, title: &str, glyph: &Glyph, ongoing: bool) -> Result<()> {
        (**self).show(title, glyph, ongoing)
    }

    fn dismiss(&mut self) -> Result<()> {
        (**self).dismiss()
    }
}

pub fn build_title(tx: &FormattedRate, rx: &FormattedRate) -> String {
    format!("Network • T: {} • R: {}", tx, rx)
}

pub fn build_glyph(tx: &FormattedRate, rx: &FormattedRate) -> Glyph {
    Glyph::new(tx.glyph_line(), rx.glyph_line())
}

/// 持有"上次显示的值"，决定是否重新生成内容并推送到显示端
pub struct IndicatorRenderer<S> {
    sink: S,
    visible: bool,
    last: Option<AggregateRate>,
    title: String,
    glyph: Glyph,
    renders: u64,
}

impl<S: DisplaySink> IndicatorRenderer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            visible: false,
            last: None,
            title: String::new(),
            glyph: Glyph::default(),
            renders: 0,
        }
    }

    pub fn hide(&mut self) {
        if self.visible {
            if let Err(err) = self.sink.dismiss() {
                warn!(%err, "failed to dismiss indicator");
            }
        }
        self.visible = false;
    }

    /// 值没变时跳过重新生成，但仍然把现有内容推给显示端：
    /// 常驻型显示端需要定期刷新才能保持常驻。
    pub fn update(&mut self, rate: AggregateRate) {
        if self.last != Some(rate) {
            let tx = format_rate(rate.tx_bytes_per_sec);
            let rx = format_rate(rate.rx_bytes_per_sec);
            self.title = build_title(&tx, &rx);
            self.glyph = build_glyph(&tx, &rx);
            self.last = Some(rate);
            self.renders += 1;
        }

        if let Err(err) = self.sink.show(&self.title, &self.glyph, true) {
            warn!(%err, "failed to show indicator");
        }
        self.visible = true;
    }

    /// 忘掉上次显示的值，下一次 update 必定重新生成
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn last_rate(&self) -> Option<AggregateRate> {
        self.last
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn glyph(&self) -> &Glyph {
        &self.glyph
    }

    /// 内容重新生成的次数
    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
