//! engine-core: geometry, colors, renderer sinks and image decoding shared by
//! the scene graph.

mod color;
mod display_list;
mod error;
mod image_decode;
mod pixmap;
mod scene;
mod sink;

pub use display_list::{DisplayList, DrawCall, RecordingSink};
pub use error::{DecodeError, RendererError};
pub use image_decode::{
    DEFAULT_MAX_IMAGE_DIMENSION, DecodedImage, ImageCrateDecoder, ImageDecoder, ImageSource,
    PixelFormat, ResizeHint,
};
pub use pixmap::{PixmapSink, pixmap_from_premul};
pub use scene::*;
pub use sink::{
    ImageFilter, RenderSink, TextureFormat, TextureHandle, TextureKind, premultiply_into,
};
