//! Renderer sink: the single-threaded backend interface the compositor drives.
//!
//! The sink owns textures and receives draw calls in composite order. It is
//! only ever used from the owner thread.

use crate::error::RendererError;
use crate::scene::{ColorLinPremul, Rect, Transform2D};

/// Opaque texture handle issued by a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

/// How a texture will be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    /// Uploaded once through `update_texture`.
    Static,
    /// CPU writable via `lock_texture` / `unlock_texture`.
    Streaming,
    /// Can be bound with `set_render_target`.
    RenderTarget,
}

/// Byte order of texture pixels. Both formats are premultiplied, 4 bytes per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8Premul,
    Bgra8Premul,
}

/// Sampling filter for image draws.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageFilter {
    Nearest,
    #[default]
    Linear,
}

pub trait RenderSink {
    /// Pixel layout expected by `update_texture` and `lock_texture`.
    fn texture_format(&self) -> TextureFormat;

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        kind: TextureKind,
    ) -> Result<TextureHandle, RendererError>;

    /// Replace the full contents of a texture (`width * height * 4` bytes).
    fn update_texture(&mut self, texture: TextureHandle, pixels: &[u8]) -> Result<(), RendererError>;

    /// Map a streaming texture for CPU writes. Must be followed by `unlock_texture`.
    fn lock_texture(&mut self, texture: TextureHandle) -> Result<&mut [u8], RendererError>;

    fn unlock_texture(&mut self, texture: TextureHandle);

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)>;

    /// `None` targets the presentation surface.
    fn set_render_target(&mut self, target: Option<TextureHandle>) -> Result<(), RendererError>;

    /// Device-space clip applied to subsequent draws. `None` disables clipping.
    fn set_clip(&mut self, clip: Option<Rect>);

    fn fill_rect(&mut self, transform: &Transform2D, rect: Rect, color: ColorLinPremul);

    fn stroke_rect(&mut self, transform: &Transform2D, rect: Rect, width: f32, color: ColorLinPremul);

    fn draw_image(
        &mut self,
        transform: &Transform2D,
        src: Rect,
        dest: Rect,
        texture: TextureHandle,
        filter: ImageFilter,
        opacity: f32,
    );

    fn present(&mut self);
}

/// Convert straight-alpha RGBA8 pixels into the sink's premultiplied layout.
pub fn premultiply_into(format: TextureFormat, rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let a = px[3] as u32;
        let premul = |c: u8| ((c as u32 * a + 127) / 255) as u8;
        let (r, g, b) = (premul(px[0]), premul(px[1]), premul(px[2]));
        match format {
            TextureFormat::Rgba8Premul => out.extend_from_slice(&[r, g, b, px[3]]),
            TextureFormat::Bgra8Premul => out.extend_from_slice(&[b, g, r, px[3]]),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_halves_color_at_half_alpha() {
        let out = premultiply_into(TextureFormat::Rgba8Premul, &[255, 100, 0, 128]);
        assert_eq!(out, vec![128, 50, 0, 128]);
    }

    #[test]
    fn premultiply_swizzles_for_bgra() {
        let out = premultiply_into(TextureFormat::Bgra8Premul, &[10, 20, 30, 255]);
        assert_eq!(out, vec![30, 20, 10, 255]);
    }
}
