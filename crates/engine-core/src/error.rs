use std::path::PathBuf;

use thiserror::Error;

use crate::sink::TextureHandle;

/// Failures reported by a [`RenderSink`](crate::RenderSink) implementation.
///
/// Callers skip the affected draw for the current frame; nothing is retried
/// within the frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RendererError {
    #[error("texture allocation failed for {width}x{height}")]
    TextureAllocation { width: u32, height: u32 },
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureHandle),
    #[error("pixel buffer of {actual} bytes does not match texture size ({expected} bytes)")]
    PixelSizeMismatch { expected: usize, actual: usize },
    #[error("texture {0:?} is not CPU writable")]
    NotWritable(TextureHandle),
    #[error("texture {0:?} is already locked")]
    AlreadyLocked(TextureHandle),
    #[error("failed to encode surface: {0}")]
    Encode(String),
}

/// Missing or corrupt external content.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("unsupported or corrupt image data: {0}")]
    Image(String),
    #[error("image dimensions {width}x{height} exceed the {max} pixel limit")]
    TooLarge { width: u32, height: u32, max: u32 },
    #[error("image has zero area")]
    Empty,
    #[error("invalid font data: {0}")]
    Font(String),
    #[error("no source registered for {0}")]
    NotFound(String),
}
