/// Font-level vertical metrics in font units.
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    /// Ascent above baseline (positive).
    pub ascent: f32,
    /// Descent below baseline (positive).
    pub descent: f32,
    /// Line gap (leading).
    pub line_gap: f32,
    /// Units per em.
    pub units_per_em: f32,
}

impl FontMetrics {
    /// Scale metrics to pixel size, where `font_size` is in logical pixels
    /// (px per em).
    pub fn scale_to_pixels(&self, font_size: f32) -> LineMetrics {
        let scale = if self.units_per_em != 0.0 {
            font_size / self.units_per_em
        } else {
            1.0
        };
        LineMetrics {
            ascent: self.ascent * scale,
            descent: self.descent * scale,
            line_gap: self.line_gap * scale,
        }
    }
}

/// Vertical metrics in pixels for one font size.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineMetrics {
    pub ascent: f32,
    /// Positive magnitude below the baseline.
    pub descent: f32,
    pub line_gap: f32,
}

impl LineMetrics {
    /// Calculate line height (ascent + descent + line_gap).
    pub fn line_height(&self) -> f32 {
        self.ascent + self.descent + self.line_gap
    }
}
