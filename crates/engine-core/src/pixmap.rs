//! Software sink backed by tiny-skia.
//!
//! Textures are tiny-skia pixmaps (RGBA, premultiplied). The presentation
//! surface behaves like a swap chain: the first draw after `present` clears it
//! to the configured background.

use std::collections::HashMap;

use tiny_skia::{
    FillRule, FilterQuality, IntSize, Mask, Paint, PathBuilder, Pattern, Pixmap, SpreadMode, Stroke,
    Transform,
};

use crate::error::RendererError;
use crate::scene::{ColorLinPremul, Rect, Transform2D};
use crate::sink::{ImageFilter, RenderSink, TextureFormat, TextureHandle, TextureKind};

struct SinkTexture {
    pixmap: Pixmap,
    kind: TextureKind,
    locked: bool,
}

pub struct PixmapSink {
    canvas: Pixmap,
    textures: HashMap<TextureHandle, SinkTexture>,
    /// Bound render target, moved out of `textures` while bound.
    target: Option<(TextureHandle, SinkTexture)>,
    clip: Option<Mask>,
    next_texture: u32,
    background: ColorLinPremul,
    needs_clear: bool,
    frames: u64,
}

fn to_skia_transform(t: &Transform2D) -> Transform {
    let [a, b, c, d, e, f] = t.m;
    Transform::from_row(a, b, c, d, e, f)
}

fn to_skia_rect(r: Rect) -> Option<tiny_skia::Rect> {
    tiny_skia::Rect::from_xywh(r.x, r.y, r.w, r.h)
}

fn to_skia_color(c: ColorLinPremul) -> tiny_skia::Color {
    let [r, g, b, a] = c.to_srgba_u8();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

fn solid_paint(color: ColorLinPremul) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_skia_color(color));
    paint.anti_alias = true;
    paint
}

impl PixmapSink {
    pub fn new(width: u32, height: u32) -> Result<Self, RendererError> {
        let canvas =
            Pixmap::new(width, height).ok_or(RendererError::TextureAllocation { width, height })?;
        Ok(Self {
            canvas,
            textures: HashMap::new(),
            target: None,
            clip: None,
            next_texture: 1,
            background: ColorLinPremul::rgba(255, 255, 255, 255),
            needs_clear: true,
            frames: 0,
        })
    }

    pub fn set_background(&mut self, color: ColorLinPremul) {
        self.background = color;
    }

    /// Presentation surface contents as of the last draw.
    pub fn pixmap(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// Straight-alpha RGBA pixel at `(x, y)` of the presentation surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let c = self.canvas.pixel(x, y)?.demultiply();
        Some([c.red(), c.green(), c.blue(), c.alpha()])
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, RendererError> {
        self.canvas
            .encode_png()
            .map_err(|e| RendererError::Encode(e.to_string()))
    }

    fn begin_draw(&mut self) {
        if self.needs_clear && self.target.is_none() {
            self.canvas.fill(to_skia_color(self.background));
            self.needs_clear = false;
        }
    }

    fn restore_target(&mut self) {
        if let Some((handle, tex)) = self.target.take() {
            self.textures.insert(handle, tex);
        }
    }
}

impl RenderSink for PixmapSink {
    fn texture_format(&self) -> TextureFormat {
        TextureFormat::Rgba8Premul
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        kind: TextureKind,
    ) -> Result<TextureHandle, RendererError> {
        let pixmap =
            Pixmap::new(width, height).ok_or(RendererError::TextureAllocation { width, height })?;
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            handle,
            SinkTexture {
                pixmap,
                kind,
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
        let data = tex.pixmap.data_mut();
        if data.len() != pixels.len() {
            return Err(RendererError::PixelSizeMismatch {
                expected: data.len(),
                actual: pixels.len(),
            });
        }
        data.copy_from_slice(pixels);
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
        Ok(tex.pixmap.data_mut())
    }

    fn unlock_texture(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.get_mut(&texture) {
            tex.locked = false;
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.target.as_ref().is_some_and(|(h, _)| *h == texture) {
            self.target = None;
            self.clip = None;
        }
        self.textures.remove(&texture);
    }

    fn texture_size(&self, texture: TextureHandle) -> Option<(u32, u32)> {
        if let Some((h, tex)) = &self.target {
            if *h == texture {
                return Some((tex.pixmap.width(), tex.pixmap.height()));
            }
        }
        self.textures
            .get(&texture)
            .map(|t| (t.pixmap.width(), t.pixmap.height()))
    }

    fn set_render_target(&mut self, target: Option<TextureHandle>) -> Result<(), RendererError> {
        if let Some(handle) = target {
            match self.textures.get(&handle) {
                Some(tex) if tex.kind == TextureKind::RenderTarget => {}
                Some(_) => return Err(RendererError::NotWritable(handle)),
                None if self.target.as_ref().is_some_and(|(h, _)| *h == handle) => return Ok(()),
                None => return Err(RendererError::UnknownTexture(handle)),
            }
        }
        self.restore_target();
        self.clip = None;
        if let Some(handle) = target {
            if let Some(tex) = self.textures.remove(&handle) {
                self.target = Some((handle, tex));
            }
        }
        Ok(())
    }

    fn set_clip(&mut self, clip: Option<Rect>) {
        self.clip = clip.and_then(|r| {
            let (w, h) = match &self.target {
                Some((_, tex)) => (tex.pixmap.width(), tex.pixmap.height()),
                None => (self.canvas.width(), self.canvas.height()),
            };
            let mut mask = Mask::new(w, h)?;
            if let Some(rect) = to_skia_rect(r) {
                let path = PathBuilder::from_rect(rect);
                mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
            }
            Some(mask)
        });
    }

    fn fill_rect(&mut self, transform: &Transform2D, rect: Rect, color: ColorLinPremul) {
        self.begin_draw();
        let Some(r) = to_skia_rect(rect) else { return };
        let paint = solid_paint(color);
        let ts = to_skia_transform(transform);
        let surface = match &mut self.target {
            Some((_, tex)) => &mut tex.pixmap,
            None => &mut self.canvas,
        };
        surface.fill_rect(r, &paint, ts, self.clip.as_ref());
    }

    fn stroke_rect(&mut self, transform: &Transform2D, rect: Rect, width: f32, color: ColorLinPremul) {
        self.begin_draw();
        let Some(r) = to_skia_rect(rect) else { return };
        let path = PathBuilder::from_rect(r);
        let paint = solid_paint(color);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        let ts = to_skia_transform(transform);
        let surface = match &mut self.target {
            Some((_, tex)) => &mut tex.pixmap,
            None => &mut self.canvas,
        };
        surface.stroke_path(&path, &paint, &stroke, ts, self.clip.as_ref());
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
        self.begin_draw();
        if src.is_empty() || dest.is_empty() {
            return;
        }
        let Some(source) = self.textures.get(&texture) else {
            tracing::warn!(?texture, "draw_image with unknown texture");
            return;
        };
        let Some(dest_rect) = to_skia_rect(dest) else { return };
        let sx = dest.w / src.w;
        let sy = dest.h / src.h;
        let quality = match filter {
            ImageFilter::Nearest => FilterQuality::Nearest,
            ImageFilter::Linear => FilterQuality::Bilinear,
        };
        let mut paint = Paint::default();
        paint.shader = Pattern::new(
            source.pixmap.as_ref(),
            SpreadMode::Pad,
            quality,
            opacity.clamp(0.0, 1.0),
            Transform::from_row(sx, 0.0, 0.0, sy, dest.x - src.x * sx, dest.y - src.y * sy),
        );
        let ts = to_skia_transform(transform);
        let surface = match &mut self.target {
            Some((_, tex)) => &mut tex.pixmap,
            None => &mut self.canvas,
        };
        surface.fill_rect(dest_rect, &paint, ts, self.clip.as_ref());
    }

    fn present(&mut self) {
        self.restore_target();
        self.clip = None;
        self.begin_draw();
        self.frames += 1;
        self.needs_clear = true;
    }
}

/// Build a pixmap from premultiplied RGBA bytes.
pub fn pixmap_from_premul(width: u32, height: u32, pixels: Vec<u8>) -> Option<Pixmap> {
    Pixmap::from_vec(pixels, IntSize::from_wh(width, height)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_rect_writes_pixels_and_respects_clip() {
        let mut sink = PixmapSink::new(20, 20).unwrap();
        sink.set_background(ColorLinPremul::TRANSPARENT);
        sink.set_clip(Some(Rect::new(0.0, 0.0, 10.0, 20.0)));
        sink.fill_rect(
            &Transform2D::identity(),
            Rect::new(0.0, 0.0, 20.0, 20.0),
            ColorLinPremul::rgba(255, 0, 0, 255),
        );
        assert_eq!(sink.pixel(5, 5), Some([255, 0, 0, 255]));
        assert_eq!(sink.pixel(15, 5).map(|p| p[3]), Some(0));
    }

    #[test]
    fn draw_image_scales_texture_into_dest() {
        let mut sink = PixmapSink::new(8, 8).unwrap();
        sink.set_background(ColorLinPremul::TRANSPARENT);
        let tex = sink.create_texture(1, 1, TextureKind::Static).unwrap();
        sink.update_texture(tex, &[0, 0, 255, 255]).unwrap();
        sink.draw_image(
            &Transform2D::identity(),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Rect::new(2.0, 2.0, 4.0, 4.0),
            tex,
            ImageFilter::Nearest,
            1.0,
        );
        assert_eq!(sink.pixel(3, 3), Some([0, 0, 255, 255]));
        assert_eq!(sink.pixel(0, 0).map(|p| p[3]), Some(0));
    }

    #[test]
    fn present_clears_on_next_frame() {
        let mut sink = PixmapSink::new(4, 4).unwrap();
        sink.set_background(ColorLinPremul::rgba(0, 0, 0, 255));
        sink.fill_rect(
            &Transform2D::identity(),
            Rect::new(0.0, 0.0, 4.0, 4.0),
            ColorLinPremul::rgba(255, 255, 255, 255),
        );
        sink.present();
        assert_eq!(sink.pixel(1, 1), Some([255, 255, 255, 255]));
        sink.fill_rect(
            &Transform2D::identity(),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            ColorLinPremul::rgba(255, 255, 255, 255),
        );
        assert_eq!(sink.pixel(2, 2), Some([0, 0, 0, 255]));
        assert_eq!(sink.frames_presented(), 1);
    }

    #[test]
    fn render_target_round_trip() {
        let mut sink = PixmapSink::new(4, 4).unwrap();
        let rt = sink.create_texture(2, 2, TextureKind::RenderTarget).unwrap();
        sink.set_render_target(Some(rt)).unwrap();
        assert_eq!(sink.texture_size(rt), Some((2, 2)));
        sink.set_render_target(None).unwrap();
        assert_eq!(sink.texture_size(rt), Some((2, 2)));
        let stat = sink.create_texture(2, 2, TextureKind::Static).unwrap();
        assert_eq!(sink.set_render_target(Some(stat)), Err(RendererError::NotWritable(stat)));
    }
}
