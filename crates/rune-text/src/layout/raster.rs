use hashbrown::HashMap;

use crate::fixed::F26Dot6;
use crate::font::{FontBackend, GlyphBitmap};
use crate::layout::TextAlign;
use crate::layout::line_breaker::{ShapedText, advance_of};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterParams {
    /// Straight-alpha sRGB text color.
    pub color: [u8; 4],
    pub align: TextAlign,
    /// Output size in pixels; lines are aligned within `width`.
    pub width: u32,
    pub height: u32,
}

/// Premultiplied RGBA8 bitmap of rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextBitmap {
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.pixels[((y * self.width + x) * 4 + 3) as usize]
    }
}

/// Paint glyph coverage for every line of `shaped` into a new bitmap.
pub fn rasterize(shaped: &ShapedText, font: &dyn FontBackend, params: &RasterParams) -> TextBitmap {
    let (w, h) = (params.width, params.height);
    let mut coverage = vec![0u8; w as usize * h as usize];
    let mut glyphs: HashMap<char, GlyphBitmap> = HashMap::new();
    let px = shaped.font_size;
    let width_fx = F26Dot6::from_int(w as i32);

    for (index, line) in shaped.lines.iter().enumerate() {
        let offset = match params.align {
            TextAlign::Left => F26Dot6::ZERO,
            TextAlign::Center => F26Dot6((width_fx - line.width).raw() / 2),
            TextAlign::Right => width_fx - line.width,
        };
        let baseline = (shaped.line_height * index as i32 + shaped.ascent).round_px();
        let mut pen = offset;
        let mut prev = None;
        let ellipsis = if line.ellipsis { shaped.ellipsis.as_str() } else { "" };
        let run = shaped.chars[line.range.clone()].iter().copied().chain(ellipsis.chars());
        for ch in run {
            if let Some(p) = prev {
                pen += F26Dot6::from_f32(font.kerning(p, ch, px));
            }
            let glyph = glyphs.entry(ch).or_insert_with(|| font.rasterize(ch, px));
            blit(&mut coverage, w, h, glyph, pen.round_px(), baseline);
            pen += advance_of(font, None, ch, px, shaped.letter_spacing);
            prev = Some(ch);
        }
    }

    let [r, g, b, a] = params.color;
    let mut pixels = Vec::with_capacity(coverage.len() * 4);
    for c in coverage {
        let alpha = (c as u32 * a as u32 + 127) / 255;
        let premul = |v: u8| ((v as u32 * alpha + 127) / 255) as u8;
        pixels.extend_from_slice(&[premul(r), premul(g), premul(b), alpha as u8]);
    }
    TextBitmap {
        width: w,
        height: h,
        pixels,
    }
}

fn blit(coverage: &mut [u8], w: u32, h: u32, glyph: &GlyphBitmap, pen_x: i32, baseline: i32) {
    let left = pen_x + glyph.xmin;
    let top = baseline - glyph.ymin - glyph.height as i32;
    for gy in 0..glyph.height {
        let y = top + gy as i32;
        if y < 0 || y >= h as i32 {
            continue;
        }
        for gx in 0..glyph.width {
            let x = left + gx as i32;
            if x < 0 || x >= w as i32 {
                continue;
            }
            let dst = &mut coverage[y as usize * w as usize + x as usize];
            *dst = (*dst).max(glyph.coverage[gy * glyph.width + gx]);
        }
    }
}
