use std::collections::HashMap;

use crate::error::RendererError;
use crate::scene::*;
use crate::sink::{ImageFilter, RenderSink, TextureFormat, TextureHandle, TextureKind};

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    FillRect {
        transform: Transform2D,
        rect: Rect,
        color: ColorLinPremul,
    },
    StrokeRect {
        transform: Transform2D,
        rect: Rect,
        width: f32,
        color: ColorLinPremul,
    },
    DrawImage {
        transform: Transform2D,
        src: Rect,
        dest: Rect,
        texture: TextureHandle,
        filter: ImageFilter,
        opacity: f32,
    },
    SetClip(Option<Rect>),
    SetRenderTarget(Option<TextureHandle>),
    Present,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayList {
    pub commands: Vec<DrawCall>,
}

impl DisplayList {
    /// Draw calls that put pixels on screen (fills, strokes, images).
    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter(|c| {
            matches!(
                c,
                DrawCall::FillRect { .. } | DrawCall::StrokeRect { .. } | DrawCall::DrawImage { .. }
            )
        })
    }

    pub fn fill_rects(&self) -> Vec<(Transform2D, Rect, ColorLinPremul)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCall::FillRect {
                    transform,
                    rect,
                    color,
                } => Some((*transform, *rect, *color)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug)]
struct RecordedTexture {
    width: u32,
    height: u32,
    kind: TextureKind,
    pixels: Vec<u8>,
    locked: bool,
}

/// Sink that keeps textures in memory and records every call.
///
/// Used by tests and headless tooling to inspect the exact draw-call
/// sequence a frame produced.
#[derive(Debug)]
pub struct RecordingSink {
    list: DisplayList,
    textures: HashMap<TextureHandle, RecordedTexture>,
    next_texture: u32,
    format: TextureFormat,
    fail_allocations: bool,
    frames_presented: u64,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            list: DisplayList::default(),
            textures: HashMap::new(),
            next_texture: 1,
            format: TextureFormat::Rgba8Premul,
            fail_allocations: false,
            frames_presented: 0,
        }
    }

    /// Make every subsequent `create_texture` fail, to exercise skip paths.
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.list
    }

    /// Take the recorded calls, leaving an empty list behind.
    pub fn take(&mut self) -> DisplayList {
        std::mem::take(&mut self.list)
    }

    pub fn clear(&mut self) {
        self.list.commands.clear();
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_pixels(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.pixels.as_slice())
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }
}

impl RenderSink for RecordingSink {
    fn texture_format(&self) -> TextureFormat {
        self.format
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        kind: TextureKind,
    ) -> Result<TextureHandle, RendererError> {
        if self.fail_allocations || width == 0 || height == 0 {
            return Err(RendererError::TextureAllocation { width, height });
        }
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            handle,
            RecordedTexture {
                width,
                height,
                kind,
                pixels: vec![0; width as usize * height as usize * 4],
                locked: false,
            },
        );
        Ok(handle)
    }

    fn update_texture(&mut self, texture: TextureHandle, pixels: &[u8]) -> Result<(), RendererError> {
        let tex = self
            .textures
            .get_mut(&texture)
            .ok_or(RendererError::UnknownTexture(texture))?;
        let expected = tex.width as usize * tex.height as usize * 4;
        if pixels.len() != expected {
            return Err(RendererError::PixelSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        tex.pixels.copy_from_slice(pixels);
        Ok(())
    }

    fn lock_texture(&mut self, texture: TextureHandle) -> Result<&mut [u8], RendererError> {
        let tex = self
            .textures
            .get_mut(&texture)
            .ok_or(RendererError::UnknownTexture(texture))?;
        if tex.kind != TextureKind::Streaming {
            return Err(RendererError::NotWritable(texture));
        }
        if tex.locked {
            return Err(RendererError::AlreadyLocked(texture));
        }
        tex.locked = true;
        Ok(tex.pixels.as_mut_slice())
    }

    fn unlock_texture(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.get_mut(&texture) {
            tex.locked = false;
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|t| (t.width, t.height))
    }

    fn set_render_target(&mut self, target: Option<TextureHandle>) -> Result<(), RendererError> {
        if let Some(t) = target {
            match self.textures.get(&t) {
                Some(tex) if tex.kind == TextureKind::RenderTarget => {}
                Some(_) => return Err(RendererError::NotWritable(t)),
                None => return Err(RendererError::UnknownTexture(t)),
            }
        }
        self.list.commands.push(DrawCall::SetRenderTarget(target));
        Ok(())
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.list.commands.push(DrawCall::SetClip(clip));
    }

    fn fill_rect(&mut self, transform: &Transform2D, rect: Rect, color: ColorLinPremul) {
        self.list.commands.push(DrawCall::FillRect {
            transform: *transform,
            rect,
            color,
        });
    }

    fn stroke_rect(&mut self, transform: &Transform2D, rect: Rect, width: f32, color: ColorLinPremul) {
        self.list.commands.push(DrawCall::StrokeRect {
            transform: *transform,
            rect,
            width,
            color,
        });
    }

    fn draw_image(
        &mut self,
        transform: &Transform2D,
        src: Rect,
        dest: Rect,
        texture: TextureHandle,
        filter: ImageFilter,
        opacity: f32,
    ) {
        self.list.commands.push(DrawCall::DrawImage {
            transform: *transform,
            src,
            dest,
            texture,
            filter,
            opacity,
        });
    }

    fn present(&mut self) {
        self.frames_presented += 1;
        self.list.commands.push(DrawCall::Present);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let mut sink = RecordingSink::new();
        let t = Transform2D::identity();
        sink.fill_rect(&t, Rect::new(0.0, 0.0, 4.0, 4.0), ColorLinPremul::rgba(255, 0, 0, 255));
        sink.set_clip(None);
        sink.present();
        let list = sink.take();
        assert_eq!(list.commands.len(), 3);
        assert_eq!(list.fill_rects().len(), 1);
        assert!(matches!(list.commands[2], DrawCall::Present));
        assert!(sink.display_list().commands.is_empty());
    }

    #[test]
    fn streaming_texture_lock_cycle() {
        let mut sink = RecordingSink::new();
        let tex = sink.create_texture(2, 1, TextureKind::Streaming).unwrap();
        {
            let px = sink.lock_texture(tex).unwrap();
            px[0] = 9;
        }
        assert_eq!(sink.lock_texture(tex), Err(RendererError::AlreadyLocked(tex)));
        sink.unlock_texture(tex);
        assert_eq!(sink.texture_pixels(tex).unwrap()[0], 9);
    }

    #[test]
    fn static_textures_reject_lock_and_bad_sizes() {
        let mut sink = RecordingSink::new();
        let tex = sink.create_texture(1, 1, TextureKind::Static).unwrap();
        assert_eq!(sink.lock_texture(tex), Err(RendererError::NotWritable(tex)));
        assert!(matches!(
            sink.update_texture(tex, &[0; 3]),
            Err(RendererError::PixelSizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn allocation_failure_is_reported() {
        let mut sink = RecordingSink::new();
        sink.set_fail_allocations(true);
        assert!(sink.create_texture(4, 4, TextureKind::Static).is_err());
        assert_eq!(sink.texture_count(), 0);
    }
}
