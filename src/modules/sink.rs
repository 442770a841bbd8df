//! 状态栏输出：每次推送写一行到 stdout

use std::io::{self, Write};

use chrono::Local;
use serde::Serialize;

use super::glyph::Glyph;
use super::render::DisplaySink;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// 纯文本，例如 `▲12 K ▼345K`
    Plain,
    /// waybar custom 模块的 JSON 行
    Waybar,
}

#[derive(Serialize)]
struct WaybarLine<'a> {
    text: String,
    tooltip: &'a str,
    class: &'a str,
}

pub struct LineSink<W> {
    out: W,
    format: LineFormat,
    timestamp: bool,
}

impl LineSink<io::Stdout> {
    pub fn stdout(format: LineFormat, timestamp: bool) -> Self {
        Self::new(io::stdout(), format, timestamp)
    }
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W, format: LineFormat, timestamp: bool) -> Self {
        Self {
            out,
            format,
            timestamp,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn text(&self, glyph: &Glyph) -> String {
        let mut text = format!("▲{} ▼{}", glyph.top(), glyph.bottom());
        if self.timestamp {
            text.push(' ');
            text.push_str(&Local::now().format("%H:%M:%S").to_string());
        }
        text
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> DisplaySink for LineSink<W> {
    fn show(&mut self, title: &str, glyph: &Glyph, _ongoing: bool) -> Result<()> {
        let text = self.text(glyph);
        let line = match self.format {
            LineFormat::Plain => text,
            LineFormat::Waybar => waybar_line(text, title, "active"),
        };
        self.write_line(&line)
    }

    fn dismiss(&mut self) -> Result<()> {
        let line = match self.format {
            LineFormat::Plain => String::new(),
            LineFormat::Waybar => waybar_line(String::new(), "", "hidden"),
        };
        self.write_line(&line)
    }
}

fn waybar_line(text: String, tooltip: &str, class: &str) -> String {
    // 只含字符串字段，序列化不会失败
    serde_json::to_string(&WaybarLine {
        text,
        tooltip,
        class,
    })
    .unwrap_or_default()
}
