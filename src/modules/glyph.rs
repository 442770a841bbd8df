//! 两行文字的小图标
//!
//! 内置 3x5 点阵字体，只覆盖图标会用到的字符（数字、空格、K、M），
//! 绘制到固定 24x24 的 RGBA 方块上：上行上传，下行下载。

pub const GLYPH_SIZE: usize = 24;

const CHAR_WIDTH: usize = 3;
const CHAR_HEIGHT: usize = 5;
const CHAR_ADVANCE: usize = CHAR_WIDTH + 1;
const TOP_LINE_Y: usize = 5;
const BOTTOM_LINE_Y: usize = 14;

/// 每行 3 位，高位在左
fn bitmap(c: char) -> [u8; CHAR_HEIGHT] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'M' => [0b101, 0b111, 0b111, 0b101, 0b101],
        _ => [0; CHAR_HEIGHT],
    }
}

/// 方形 RGBA 位图，白字透明底
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pixels: Vec<u8>,
}

impl Raster {
    fn blank() -> Self {
        Self {
            pixels: vec![0; GLYPH_SIZE * GLYPH_SIZE * 4],
        }
    }

    pub fn size(&self) -> usize {
        GLYPH_SIZE
    }

    pub fn rowstride(&self) -> usize {
        GLYPH_SIZE * 4
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn is_lit(&self, x: usize, y: usize) -> bool {
        x < GLYPH_SIZE && y < GLYPH_SIZE && self.pixels[(y * GLYPH_SIZE + x) * 4 + 3] != 0
    }

    #[cfg(test)]
    fn lit_pixels(&self) -> usize {
        self.pixels.chunks(4).filter(|px| px[3] != 0).count()
    }

    fn put(&mut self, x: usize, y: usize) {
        if x >= GLYPH_SIZE || y >= GLYPH_SIZE {
            return;
        }
        let offset = (y * GLYPH_SIZE + x) * 4;
        self.pixels[offset..offset + 4].copy_from_slice(&[0xff, 0xff, 0xff, 0xff]);
    }

    /// 水平居中绘制一行，超出边界的部分裁掉
    fn draw_line(&mut self, text: &str, top: usize) {
        let count = text.chars().count();
        if count == 0 {
            return;
        }
        let width = count * CHAR_ADVANCE - 1;
        let left = GLYPH_SIZE.saturating_sub(width) / 2;

        for (i, c) in text.chars().enumerate() {
            let rows = bitmap(c);
            let x0 = left + i * CHAR_ADVANCE;
            for (dy, row) in rows.iter().enumerate() {
                for dx in 0..CHAR_WIDTH {
                    if row & (0b100u8 >> dx) != 0 {
                        self.put(x0 + dx, top + dy);
                    }
                }
            }
        }
    }
}

/// 图标内容：文字 + 对应位图
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    top: String,
    bottom: String,
    raster: Raster,
}

impl Glyph {
    pub fn new(top: impl Into<String>, bottom: impl Into<String>) -> Self {
        let top = top.into();
        let bottom = bottom.into();
        let mut raster = Raster::blank();
        raster.draw_line(&top, TOP_LINE_Y);
        raster.draw_line(&bottom, BOTTOM_LINE_Y);
        Self {
            top,
            bottom,
            raster,
        }
    }

    pub fn top(&self) -> &str {
        &self.top
    }

    pub fn bottom(&self) -> &str {
        &self.bottom
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }
}

impl Default for Glyph {
    fn default() -> Self {
        Self::new("", "")
    }
}
