use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits};

use crate::error::DecodeError;
use crate::sink::{TextureFormat, premultiply_into};

/// Default guard against decoding absurdly large images.
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 8192;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

/// Target size requested by the consumer; the decoder scales to it exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResizeHint {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA, straight alpha.
    Rgba8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub format: PixelFormat,
}

impl DecodedImage {
    /// Pixels converted to what a sink with `format` accepts.
    pub fn to_texture_pixels(&self, format: TextureFormat) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => premultiply_into(format, &self.pixels),
        }
    }

    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Decodes encoded image bytes. Runs on loader worker threads.
pub trait ImageDecoder: Send + Sync {
    fn decode(
        &self,
        source: &ImageSource,
        resize: Option<ResizeHint>,
    ) -> Result<DecodedImage, DecodeError>;
}

/// PNG/JPEG/GIF/WebP decoder backed by the `image` crate.
#[derive(Clone, Debug)]
pub struct ImageCrateDecoder {
    max_dimension: u32,
}

impl Default for ImageCrateDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGE_DIMENSION)
    }
}

impl ImageCrateDecoder {
    pub fn new(max_dimension: u32) -> Self {
        Self { max_dimension }
    }

    /// Reads the header first so oversized images fail before any pixel
    /// buffer is allocated.
    fn load(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
        let reader = || {
            ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()
                .map_err(|e| DecodeError::Image(e.to_string()))
        };
        let (width, height) = reader()?
            .into_dimensions()
            .map_err(|e| DecodeError::Image(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(DecodeError::Empty);
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(DecodeError::TooLarge {
                width,
                height,
                max: self.max_dimension,
            });
        }

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        let mut reader = reader()?;
        reader.limits(limits);
        reader.decode().map_err(|e| DecodeError::Image(e.to_string()))
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode(
        &self,
        source: &ImageSource,
        resize: Option<ResizeHint>,
    ) -> Result<DecodedImage, DecodeError> {
        let img = match source {
            ImageSource::Bytes(bytes) => self.load(bytes)?,
            ImageSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|e| DecodeError::Io {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                self.load(&bytes)?
            }
        };
        let (width, height) = (img.width(), img.height());

        let img = match resize {
            Some(hint) if hint.width > 0 && hint.height > 0 && (hint.width, hint.height) != (width, height) => {
                let w = hint.width.min(self.max_dimension);
                let h = hint.height.min(self.max_dimension);
                img.resize_exact(w, h, FilterType::Triangle)
            }
            _ => img,
        };

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        tracing::trace!(width, height, "decoded image");
        Ok(DecodedImage {
            width,
            height,
            pixels: rgba.into_raw(),
            format: PixelFormat::Rgba8,
        })
    }
}
