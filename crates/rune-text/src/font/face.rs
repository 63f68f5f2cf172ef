use std::fmt;
use std::path::Path;
use std::sync::Arc;

use fontdue::{Font, FontSettings};

use crate::font::{FontBackend, FontError, FontMetrics, GlyphBitmap, LineMetrics, Result};

/// Loaded font face backed by a font file (TTF/OTF/TTC).
///
/// Thin wrapper around `fontdue::Font`; cloning shares the parsed face.
#[derive(Clone)]
pub struct FontFace {
    font: Arc<Font>,
    metrics: FontMetrics,
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("name", &self.font.name())
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl FontFace {
    /// Create a font face from raw bytes and a face index within the file.
    pub fn from_bytes(data: &[u8], index: u32) -> Result<Self> {
        let settings = FontSettings {
            collection_index: index,
            ..FontSettings::default()
        };
        let font = Font::from_bytes(data, settings)
            .map_err(|e| FontError::InvalidFont(e.to_string()))?;
        let units_per_em = font.units_per_em();
        let metrics = match font.horizontal_line_metrics(units_per_em) {
            Some(lm) => FontMetrics {
                ascent: lm.ascent,
                descent: lm.descent.abs(),
                line_gap: lm.line_gap.max(0.0),
                units_per_em,
            },
            None => FontMetrics {
                ascent: units_per_em * 0.8,
                descent: units_per_em * 0.2,
                line_gap: 0.0,
                units_per_em,
            },
        };
        Ok(Self {
            font: Arc::new(font),
            metrics,
        })
    }

    /// Create a font face from a font file on disk.
    pub fn from_path(path: impl AsRef<Path>, index: u32) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data, index)
    }

    /// Font metrics in font units.
    pub fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    pub fn name(&self) -> Option<&str> {
        self.font.name()
    }
}

impl FontBackend for FontFace {
    fn advance(&self, ch: char, px: f32) -> f32 {
        self.font.metrics(ch, px).advance_width
    }

    fn kerning(&self, left: char, right: char, px: f32) -> f32 {
        self.font.horizontal_kern(left, right, px).unwrap_or(0.0)
    }

    fn line_metrics(&self, px: f32) -> LineMetrics {
        self.metrics.scale_to_pixels(px)
    }

    fn has_glyph(&self, ch: char) -> bool {
        self.font.lookup_glyph_index(ch) != 0
    }

    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap {
        let (m, coverage) = self.font.rasterize(ch, px);
        GlyphBitmap {
            xmin: m.xmin,
            ymin: m.ymin,
            width: m.width,
            height: m.height,
            coverage,
        }
    }
}
