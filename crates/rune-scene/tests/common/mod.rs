#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use rune_config::RuneConfig;
use rune_scene::{FontKey, FontSource, Scene};
use rune_text::BoxFont;

pub const FAMILY: &str = "test";

/// Inline loader, no automatic compaction, 800×600 viewport.
pub fn config() -> RuneConfig {
    let mut config = RuneConfig::default();
    config.loader.worker_threads = Some(0);
    config.scene.default_font_family = FAMILY.into();
    config.cache.compact_interval_frames = 0;
    config
}

/// Scene whose default family is an 8px-per-glyph box font at 16px.
pub fn scene() -> Scene {
    let mut scene = Scene::new(&config()).unwrap();
    scene.resources_mut().register_font(
        FontKey::new(FAMILY),
        FontSource::Face(Arc::new(BoxFont::default())),
    );
    scene
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}
