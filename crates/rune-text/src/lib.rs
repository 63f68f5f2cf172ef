//! rune-text: text shaping and line breaking for the scene graph.
//!
//! - font faces behind the [`FontBackend`] trait (fontdue, or the metrics-only [`BoxFont`])
//! - greedy line breaking in 26.6 fixed point with clip/ellipsis overflow
//! - coverage rasterization into premultiplied RGBA

pub mod fixed;
pub mod font;
pub mod layout;
pub mod unicode;

pub use fixed::F26Dot6;
pub use font::{
    BoxFont, FontBackend, FontError, FontFace, FontMetrics, GlyphBitmap, LineMetrics,
};
pub use layout::{
    LineSpan, RasterParams, ShapeParams, ShapedText, TextAlign, TextBitmap, TextOverflow,
    WrapMode, rasterize, shape,
};
pub use unicode::TextTransform;
