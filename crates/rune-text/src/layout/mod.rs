pub mod line_breaker;
pub mod raster;

pub use line_breaker::{LineSpan, ShapeParams, ShapedText, shape};
pub use raster::{RasterParams, TextBitmap, rasterize};

/// Line wrapping strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    /// Do not perform automatic wrapping (only explicit newlines).
    NoWrap,
    /// Wrap at the last space where possible, falling back to a hard break
    /// inside long words.
    #[default]
    BreakWord,
    /// Break at any codepoint once the line is full.
    BreakAll,
}

/// What to do with content past the vertical limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextOverflow {
    #[default]
    Clip,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}
