use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use engine_core::PixmapSink;
use rune_config::RuneConfig;
use rune_scene::{FontKey, FontSource, NodeId, Scene, SceneEvent};
use rune_text::BoxFont;

/// Frames to run while waiting for decodes before giving up and writing out.
const MAX_SETTLE_FRAMES: usize = 50;

fn main() -> Result<()> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rune-retained.png".to_string());
    let config = RuneConfig::load();
    let (width, height) = (
        config.scene.viewport_width.max(1.0).round() as u32,
        config.scene.viewport_height.max(1.0).round() as u32,
    );

    let mut scene = Scene::new(&config)?;
    if config.text.font.is_none() {
        log::info!("no [text] font configured; drawing glyphs as boxes");
        scene.resources_mut().register_font(
            FontKey::new(config.scene.default_font_family.clone()),
            FontSource::Face(Arc::new(BoxFont::default())),
        );
    }
    build_demo(&mut scene)?;

    let mut sink = PixmapSink::new(width, height)?;
    for _ in 0..MAX_SETTLE_FRAMES {
        let stats = scene.frame(&mut sink)?;
        log::debug!("{stats:?}");
        for event in scene.drain_events() {
            if let SceneEvent::ResourceError { node, error, .. } = event {
                log::warn!("{node:?} failed to load: {error}");
            }
        }
        if !scene.resources().has_pending_loads() {
            break;
        }
        scene.resources_mut().wait(Duration::from_millis(20));
    }
    // One more pass picks up completions delivered by the last wait.
    scene.frame(&mut sink)?;

    let png = sink.encode_png()?;
    std::fs::write(&output, png).with_context(|| format!("writing {output}"))?;
    log::info!("wrote {output} ({width}x{height}, {} nodes)", scene.node_count());
    Ok(())
}

fn styled(scene: &mut Scene, parent: NodeId, node: NodeId, styles: &[(&str, &str)]) -> Result<NodeId> {
    for (name, value) in styles {
        scene
            .set_style_str(node, name, value)
            .with_context(|| format!("{name}: {value}"))?;
    }
    scene.append_child(parent, node)?;
    Ok(node)
}

fn build_demo(scene: &mut Scene) -> Result<()> {
    let root = scene.root();
    let page = scene.create_box()?;
    let page = styled(
        scene,
        root,
        page,
        &[
            ("flex-grow", "1"),
            ("padding-top", "24px"),
            ("padding-left", "24px"),
            ("padding-right", "24px"),
            ("gap", "16px"),
            ("background-color", "#f4f1ea"),
        ],
    )?;

    let title = scene.create_text()?;
    scene.set_text(title, "Retained scene graph")?;
    styled(scene, page, title, &[("font-size", "1.5rem"), ("color", "#1d3557")])?;

    let row = scene.create_box()?;
    let row = styled(scene, page, row, &[("flex-direction", "row"), ("gap", "12px")])?;
    let palette = ["#e63946", "#2a9d8f", "#e9c46a"];
    for (i, color) in palette.iter().enumerate() {
        let card = scene.create_box()?;
        let card = styled(
            scene,
            row,
            card,
            &[
                ("flex-grow", "1"),
                ("height", "120px"),
                ("padding-top", "8px"),
                ("padding-left", "8px"),
                ("border-width", "2px"),
                ("border-color", "#264653"),
                ("background-color", color),
            ],
        )?;
        let label = scene.create_text()?;
        scene.set_text(label, format!("card {} with a caption that wraps", i + 1))?;
        styled(scene, card, label, &[("color", "white"), ("max-lines", "2")])?;
    }

    let banner = scene.create_box()?;
    let banner = styled(
        scene,
        page,
        banner,
        &[
            ("height", "48px"),
            ("background-color", "#264653"),
            ("opacity", "0.8"),
            ("transform", "rotate(-2deg)"),
        ],
    )?;
    if let Ok(path) = std::env::var("RUNE_DEMO_IMAGE") {
        let image = scene.create_image()?;
        scene.set_image_source(image, Some(&path))?;
        styled(scene, page, image, &[("height", "160px"), ("object-fit", "contain")])?;
    }
    scene.set_style_str(banner, "overflow", "hidden")?;
    Ok(())
}
