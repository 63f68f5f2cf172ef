use hashbrown::HashSet;

use crate::font::{FontBackend, GlyphBitmap, LineMetrics};

/// Metrics-only font where every glyph is a solid box of fixed advance.
///
/// Useful headless and in tests: layout results are exact and independent of
/// any font file on the host.
#[derive(Debug, Clone)]
pub struct BoxFont {
    /// Advance as a fraction of the em size.
    advance_em: f32,
    ascent_em: f32,
    descent_em: f32,
    missing: HashSet<char>,
}

impl Default for BoxFont {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl BoxFont {
    pub fn new(advance_em: f32) -> Self {
        Self {
            advance_em,
            ascent_em: 0.8,
            descent_em: 0.2,
            missing: HashSet::new(),
        }
    }

    /// Report `chars` as absent from the face.
    pub fn without_glyphs(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.missing.extend(chars);
        self
    }
}

impl FontBackend for BoxFont {
    fn advance(&self, ch: char, px: f32) -> f32 {
        if ch == '\n' || !self.has_glyph(ch) {
            return 0.0;
        }
        self.advance_em * px
    }

    fn kerning(&self, _left: char, _right: char, _px: f32) -> f32 {
        0.0
    }

    fn line_metrics(&self, px: f32) -> LineMetrics {
        LineMetrics {
            ascent: self.ascent_em * px,
            descent: self.descent_em * px,
            line_gap: 0.0,
        }
    }

    fn has_glyph(&self, ch: char) -> bool {
        !self.missing.contains(&ch)
    }

    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap {
        if ch.is_whitespace() || !self.has_glyph(ch) {
            return GlyphBitmap::default();
        }
        // Leave a one pixel gutter on the right so adjacent boxes stay distinct.
        let width = ((self.advance_em * px).round() as usize).saturating_sub(1).max(1);
        let height = ((self.ascent_em * px).round() as usize).max(1);
        GlyphBitmap {
            xmin: 0,
            ymin: 0,
            width,
            height,
            coverage: vec![255; width * height],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_advance_scales_with_size() {
        let f = BoxFont::new(0.5);
        assert_eq!(f.advance('a', 20.0), 10.0);
        assert_eq!(f.line_metrics(20.0).line_height(), 20.0);
    }

    #[test]
    fn missing_glyphs_have_no_advance() {
        let f = BoxFont::default().without_glyphs(['…']);
        assert!(!f.has_glyph('…'));
        assert_eq!(f.advance('…', 20.0), 0.0);
        assert!(f.rasterize('…', 20.0).coverage.is_empty());
    }
}
