pub mod box_font;
pub mod face;
pub mod metrics;

pub use box_font::BoxFont;
pub use face::FontFace;
pub use metrics::{FontMetrics, LineMetrics};

use core::fmt;

/// Errors that can occur while working with fonts.
#[derive(Debug)]
pub enum FontError {
    Io(std::io::Error),
    InvalidFont(String),
}

impl fmt::Display for FontError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontError::Io(err) => write!(f, "font I/O error: {err}"),
            FontError::InvalidFont(reason) => write!(f, "invalid font data: {reason}"),
        }
    }
}

impl std::error::Error for FontError {}

impl From<std::io::Error> for FontError {
    fn from(err: std::io::Error) -> Self {
        FontError::Io(err)
    }
}

/// Convenient result alias for font-related operations.
pub type Result<T> = std::result::Result<T, FontError>;

/// Coverage bitmap for a single glyph.
///
/// `xmin`/`ymin` place the bitmap relative to the pen position on the
/// baseline; `ymin` is the offset of the bottom row, positive upwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphBitmap {
    pub xmin: i32,
    pub ymin: i32,
    pub width: usize,
    pub height: usize,
    pub coverage: Vec<u8>,
}

/// Per-codepoint queries the shaper and rasterizer need from a font.
///
/// Implementations are shared between the owner thread and loader workers.
pub trait FontBackend: Send + Sync {
    /// Horizontal advance of `ch` at `px` pixels per em.
    fn advance(&self, ch: char, px: f32) -> f32;

    /// Pair kerning adjustment between `left` and `right`.
    fn kerning(&self, left: char, right: char, px: f32) -> f32;

    fn line_metrics(&self, px: f32) -> LineMetrics;

    fn has_glyph(&self, ch: char) -> bool;

    fn rasterize(&self, ch: char, px: f32) -> GlyphBitmap;
}
