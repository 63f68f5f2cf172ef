//! The per-frame pipeline: resource sync, media sync, layout, style
//! resolution, text painting and compositing.

use engine_core::{Rect, RenderSink, RendererError, TextureFormat, TextureKind, Transform2D};
use rune_text::{
    FontBackend, RasterParams, ShapeParams, TextAlign, TextOverflow, TextTransform, WrapMode,
};
use taffy::{AvailableSpace, Size};
use tracing::{debug, trace, warn};

use super::tree::pin_layout;
use super::{Scene, SceneFlags};
use crate::arena::Arena;
use crate::composite::CompositeContext;
use crate::error::Result;
use crate::node::{FrameStats, LayoutBox, NodeFlags, NodeId, NodeKind, Placement, SceneNode};
use crate::resource::ResourceCache;
use crate::style::{Keyword, StyleContext, StyleId, StyleProperty, StyleSheet, StyleUnit};

impl Scene {
    /// Run one frame against `sink`.
    pub fn frame(&mut self, sink: &mut dyn RenderSink) -> Result<FrameStats> {
        self.frame_count += 1;
        let mut stats = FrameStats {
            frame: self.frame_count,
            ..FrameStats::default()
        };

        stats.completions = self.cache.drain();
        self.process_resource_events();
        if self.compact_interval > 0 && self.frame_count % self.compact_interval == 0 {
            self.cache.compact();
        }
        let mut textures = std::mem::take(&mut self.released_textures);
        textures.extend(self.cache.take_orphaned_textures());
        for texture in textures {
            sink.destroy_texture(texture);
        }

        stats.media_changed = self.sync_media()?;
        stats.layout_ran = self.run_layout()?;
        if self.flags.contains(SceneFlags::COMPUTE_STYLE) {
            self.flags.remove(SceneFlags::COMPUTE_STYLE);
            stats.styled = self.resolve_styles();
        }
        stats.painted = self.paint(sink);
        if self.flags.contains(SceneFlags::COMPOSITE) {
            self.composite(sink);
            stats.composited = true;
        }
        trace!(?stats, "frame done");
        Ok(stats)
    }

    fn sync_media(&mut self) -> Result<bool> {
        if self.requested_context == self.context {
            return Ok(false);
        }
        let before = self.context;
        self.context = self.requested_context;
        let changes = self.styles.sweep_units(&before, &self.context);
        debug!(changes = changes.len(), context = ?self.context, "media changed");

        let root = self.root;
        let root_layout = self.node(root)?.layout;
        let mut style = self.taffy.style(root_layout)?.clone();
        pin_layout(&NodeKind::Root, &mut style, &self.context);
        self.taffy.set_style(root_layout, style)?;
        self.apply_style_changes(changes);
        self.mark(root, NodeFlags::COMPOSITE_DIRTY);
        Ok(true)
    }

    fn run_layout(&mut self) -> Result<bool> {
        let root_layout = self.node(self.root)?.layout;
        if !self.taffy.dirty(root_layout)? {
            return Ok(false);
        }
        let available = Size {
            width: AvailableSpace::Definite(self.context.viewport_width),
            height: AvailableSpace::Definite(self.context.viewport_height),
        };
        let measure = Measure {
            nodes: &self.nodes,
            styles: &self.styles,
            cache: &self.cache,
            context: &self.context,
            ellipsis: self.ellipsis_by_default,
        };
        self.taffy.compute_layout_with_measure(
            root_layout,
            available,
            |known, available, _, node, _| match node {
                Some(node) => measure.measure(*node, known, available),
                None => Size::ZERO,
            },
        )?;

        let mut changed = 0;
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            let n = self.node(node)?;
            let fresh = LayoutBox::from_layout(self.taffy.layout(n.layout)?);
            stack.extend(n.children.iter().copied());
            let flags = match n.last_box {
                Some(old) if old == fresh => continue,
                Some(old) if old.width == fresh.width
                    && old.height == fresh.height
                    && old.border == fresh.border
                    && old.padding == fresh.padding =>
                {
                    NodeFlags::COMPOSITE_DIRTY
                }
                _ => NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
            };
            self.node_mut(node)?.last_box = Some(fresh);
            self.mark(node, flags);
            changed += 1;
        }
        debug!(changed, "layout computed");
        Ok(true)
    }

    /// Post-order pass over nodes attached to the root.
    fn resolve_styles(&mut self) -> usize {
        let mut order = Vec::new();
        let mut stack = vec![(self.root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
                continue;
            }
            stack.push((node, true));
            if let Ok(n) = self.node(node) {
                stack.extend(n.children.iter().rev().map(|c| (*c, false)));
            }
        }

        let mut styled = 0;
        for node in order {
            let dirty = self
                .node(node)
                .is_ok_and(|n| n.flags.contains(NodeFlags::COMPUTE_STYLE_DIRTY));
            if !dirty {
                continue;
            }
            self.compute_style(node);
            if let Ok(n) = self.node_mut(node) {
                n.flags.remove(NodeFlags::COMPUTE_STYLE_DIRTY);
            }
            styled += 1;
        }
        debug!(styled, "styles resolved");
        styled
    }

    fn compute_style(&mut self, node: NodeId) {
        let Ok(n) = self.node(node) else {
            return;
        };
        let style = n.style;
        let b = n.last_box.unwrap_or_default();
        let styles = &self.styles;
        let ctx = &self.context;
        match &n.kind {
            NodeKind::Box(data) => {
                let size = data
                    .background
                    .and_then(|h| self.cache.image_size(h.resource));
                let placement = size.and_then(|size| {
                    Placement::fit(
                        styles
                            .keyword(style, StyleProperty::BackgroundFit)
                            .unwrap_or(Keyword::Fill),
                        size,
                        b.padding_box(),
                        styles.number(style, StyleProperty::BackgroundPositionX),
                        styles.number(style, StyleProperty::BackgroundPositionY),
                        ctx,
                    )
                });
                let bare = data.background.is_none() && is_bare(styles, style, ctx);
                if let Ok(n) = self.node_mut(node) {
                    n.flags.set(NodeFlags::LAYOUT_ONLY, bare);
                    if let NodeKind::Box(data) = &mut n.kind {
                        data.background_placement = placement;
                    }
                }
            }
            NodeKind::Image(data) => {
                let size = data.image.and_then(|h| self.cache.image_size(h.resource));
                let placement = size.and_then(|size| {
                    Placement::fit(
                        styles
                            .keyword(style, StyleProperty::ObjectFit)
                            .unwrap_or(Keyword::Fill),
                        size,
                        b.content_box(),
                        styles.number(style, StyleProperty::ObjectPositionX),
                        styles.number(style, StyleProperty::ObjectPositionY),
                        ctx,
                    )
                });
                if let Ok(n) = self.node_mut(node) {
                    if let NodeKind::Image(data) = &mut n.kind {
                        data.placement = placement;
                    }
                }
            }
            NodeKind::Text(data) => {
                let content = b.content_box();
                let font = data.font.and_then(|h| self.cache.font(h.resource));
                let explicit_height = styles.number(style, StyleProperty::Height).unit != StyleUnit::Auto;
                let shaped = font.map(|font| {
                    let params = shape_params(
                        styles,
                        style,
                        ctx,
                        self.ellipsis_by_default,
                        Some(content.w),
                        explicit_height.then_some(content.h),
                    );
                    rune_text::shape(&data.text, font.as_ref(), &params)
                });
                if let Ok(n) = self.node_mut(node) {
                    if let NodeKind::Text(data) = &mut n.kind {
                        data.shaped = shaped;
                    }
                }
                if !self.paint_requests.contains(&node) {
                    self.paint_requests.push(node);
                }
            }
            NodeKind::Root => {
                let bare = is_bare(styles, style, ctx);
                if let Ok(n) = self.node_mut(node) {
                    n.flags.set(NodeFlags::LAYOUT_ONLY, bare);
                }
            }
            NodeKind::Link(_) => return,
        }
        self.mark(node, NodeFlags::COMPOSITE_DIRTY);
    }

    fn paint(&mut self, sink: &mut dyn RenderSink) -> usize {
        let requests = std::mem::take(&mut self.paint_requests);
        let mut painted = 0;
        for node in requests {
            match self.paint_text(node, sink) {
                Ok(true) => painted += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(?node, %err, "text layer paint failed; retrying next frame");
                    self.paint_requests.push(node);
                }
            }
        }
        if painted > 0 {
            self.flags |= SceneFlags::COMPOSITE;
        }
        painted
    }

    /// Rasterize a text node into its layer texture.
    fn paint_text(&mut self, node: NodeId, sink: &mut dyn RenderSink) -> Result<bool, RendererError> {
        let Ok(n) = self.node(node) else {
            return Ok(false);
        };
        let NodeKind::Text(data) = &n.kind else {
            return Ok(false);
        };
        let content = n.last_box.map(|b| b.content_box()).unwrap_or_default();
        let (width, height) = (content.w.ceil() as u32, content.h.ceil() as u32);
        let font = data.font.and_then(|h| self.cache.font(h.resource));
        let (Some(shaped), Some(font)) = (&data.shaped, font) else {
            return Ok(false);
        };
        let (old_layer, old_size) = (n.layer, data.layer_size);
        if width == 0 || height == 0 {
            if let Some(layer) = old_layer {
                sink.destroy_texture(layer);
            }
            self.clear_layer(node);
            return Ok(false);
        }

        let params = RasterParams {
            color: self.styles.color(n.style, StyleProperty::Color).to_srgba_u8(),
            align: match self.styles.keyword(n.style, StyleProperty::TextAlign) {
                Some(Keyword::Center) => TextAlign::Center,
                Some(Keyword::Right) => TextAlign::Right,
                _ => TextAlign::Left,
            },
            width,
            height,
        };
        let mut bitmap = rune_text::rasterize(shaped, font.as_ref(), &params);
        if sink.texture_format() == TextureFormat::Bgra8Premul {
            for px in bitmap.pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }

        let layer = match old_layer {
            Some(layer) if old_size == (width, height) => layer,
            stale => {
                if let Some(layer) = stale {
                    sink.destroy_texture(layer);
                    self.clear_layer(node);
                }
                sink.create_texture(width, height, TextureKind::Streaming)?
            }
        };
        if let Ok(n) = self.node_mut(node) {
            n.layer = Some(layer);
            if let NodeKind::Text(data) = &mut n.kind {
                data.layer_size = (width, height);
            }
        }
        let pixels = sink.lock_texture(layer)?;
        if pixels.len() == bitmap.pixels.len() {
            pixels.copy_from_slice(&bitmap.pixels);
        }
        sink.unlock_texture(layer);
        self.mark(node, NodeFlags::COMPOSITE_DIRTY);
        Ok(true)
    }

    fn clear_layer(&mut self, node: NodeId) {
        if let Ok(n) = self.node_mut(node) {
            n.layer = None;
            if let NodeKind::Text(data) = &mut n.kind {
                data.layer_size = (0, 0);
            }
        }
    }

    /// Draw the whole tree and present. Calling this again on an unchanged
    /// scene issues the same draw calls.
    pub fn composite(&mut self, sink: &mut dyn RenderSink) {
        let mut ctx = CompositeContext::new(sink);
        self.composite_node(self.root, &mut ctx);
        ctx.finish();
        self.flags.remove(SceneFlags::COMPOSITE);
    }

    fn composite_node(&mut self, node: NodeId, ctx: &mut CompositeContext<'_>) {
        let Ok(n) = self.node_mut(node) else {
            return;
        };
        n.flags.remove(NodeFlags::COMPOSITE_DIRTY);
        if n.flags.contains(NodeFlags::HIDDEN) {
            return;
        }
        let Some(b) = n.last_box else {
            return;
        };
        let style = n.style;
        if self.styles.keyword(style, StyleProperty::Display) == Some(Keyword::None) {
            return;
        }
        let opacity = opacity_of(&self.styles, style);
        if opacity <= 0.0 {
            return;
        }

        let transform = self.context.transform_matrix(
            &self.styles.transform(style, StyleProperty::Transform),
            (b.width, b.height),
            self.styles.number(style, StyleProperty::TransformOriginX),
            self.styles.number(style, StyleProperty::TransformOriginY),
        );
        ctx.push(Transform2D::translate(b.x, b.y).concat(transform), opacity);
        if b.has_area() && !ctx.is_culled() {
            self.draw_content(node, &b, ctx);
        }
        let clip = self.styles.keyword(style, StyleProperty::Overflow) == Some(Keyword::Hidden);
        if clip {
            ctx.push_clip(b.padding_box());
        }
        let children = self.children_ordered_by_z_index(node).unwrap_or_default();
        for child in children {
            self.composite_node(child, ctx);
        }
        if clip {
            ctx.pop();
        }
        ctx.pop();
    }

    fn draw_content(&mut self, node: NodeId, b: &LayoutBox, ctx: &mut CompositeContext<'_>) {
        let Ok(n) = self.node(node) else {
            return;
        };
        let style = n.style;
        match &n.kind {
            NodeKind::Box(data) => {
                if n.flags.contains(NodeFlags::LAYOUT_ONLY) {
                    return;
                }
                let image = data.background.zip(data.background_placement);
                ctx.fill_rect(
                    b.padding_box(),
                    self.styles.color(style, StyleProperty::BackgroundColor),
                );
                if let Some((held, placement)) = image {
                    if let Some(texture) = self.image_texture(held.resource, ctx.sink()) {
                        ctx.draw_image(placement.src, placement.dest, texture);
                    }
                }
                stroke_border(&self.styles, style, b, ctx);
            }
            NodeKind::Root => {
                if n.flags.contains(NodeFlags::LAYOUT_ONLY) {
                    return;
                }
                ctx.fill_rect(
                    b.padding_box(),
                    self.styles.color(style, StyleProperty::BackgroundColor),
                );
                stroke_border(&self.styles, style, b, ctx);
            }
            NodeKind::Image(data) => {
                if let (Some(held), Some(placement)) = (data.image, data.placement) {
                    if let Some(texture) = self.image_texture(held.resource, ctx.sink()) {
                        ctx.draw_image(placement.src, placement.dest, texture);
                    }
                }
            }
            NodeKind::Text(data) => {
                if let Some(layer) = n.layer {
                    let (w, h) = data.layer_size;
                    let content = b.content_box();
                    let src = Rect::from_size(w as f32, h as f32);
                    let dest = Rect::new(content.x, content.y, w as f32, h as f32);
                    ctx.draw_image(src, dest, layer);
                }
            }
            NodeKind::Link(_) => {}
        }
    }

    /// Texture of a ready image, uploaded on first use.
    fn image_texture(
        &mut self,
        resource: crate::resource::ResourceId,
        sink: &mut dyn RenderSink,
    ) -> Option<engine_core::TextureHandle> {
        let payload = self.cache.image_mut(resource)?;
        if let Some(texture) = payload.texture {
            return Some(texture);
        }
        let image = payload.image.clone();
        let upload = sink
            .create_texture(image.width, image.height, TextureKind::Static)
            .and_then(|texture| {
                let pixels = image.to_texture_pixels(sink.texture_format());
                match sink.update_texture(texture, &pixels) {
                    Ok(()) => Ok(texture),
                    Err(err) => {
                        sink.destroy_texture(texture);
                        Err(err)
                    }
                }
            });
        match upload {
            Ok(texture) => {
                payload.texture = Some(texture);
                Some(texture)
            }
            Err(err) => {
                warn!(?resource, %err, "image upload failed");
                None
            }
        }
    }
}

/// No background color and no visible border, so nothing to draw.
fn is_bare(styles: &StyleSheet, style: StyleId, ctx: &StyleContext) -> bool {
    styles
        .color(style, StyleProperty::BackgroundColor)
        .is_transparent()
        && (ctx.length(styles.number(style, StyleProperty::BorderWidth)) <= 0.0
            || styles
                .color(style, StyleProperty::BorderColor)
                .is_transparent())
}

fn stroke_border(styles: &StyleSheet, style: StyleId, b: &LayoutBox, ctx: &mut CompositeContext<'_>) {
    let border = b.border.left.max(b.border.top).max(b.border.right).max(b.border.bottom);
    if border > 0.0 {
        let half = border / 2.0;
        ctx.stroke_rect(
            b.border_box().inset(half, half, half, half),
            border,
            styles.color(style, StyleProperty::BorderColor),
        );
    }
}

fn opacity_of(styles: &StyleSheet, style: StyleId) -> f32 {
    let n = styles.number(style, StyleProperty::Opacity);
    let v = match n.unit {
        StyleUnit::Percent => n.value / 100.0,
        _ => n.value,
    };
    v.clamp(0.0, 1.0)
}

/// Shaper parameters from a text node's effective style.
fn shape_params(
    styles: &StyleSheet,
    style: StyleId,
    ctx: &StyleContext,
    ellipsis_by_default: bool,
    max_width: Option<f32>,
    max_height: Option<f32>,
) -> ShapeParams {
    use StyleProperty as P;
    let font_size = ctx
        .resolve(styles.number(style, P::FontSize), ctx.root_font_size)
        .unwrap_or(ctx.root_font_size);
    let line_height = styles.number(style, P::LineHeight);
    let line_height = match line_height.unit {
        StyleUnit::Auto => None,
        StyleUnit::Undefined => Some(line_height.value * font_size),
        _ => ctx.resolve(line_height, font_size),
    };
    let max_lines = styles.integer(style, P::MaxLines);
    let overflow = match styles.lookup(style, P::TextOverflow) {
        Ok(Some(value)) if value.as_keyword() == Some(Keyword::Ellipsis) => TextOverflow::Ellipsis,
        Ok(Some(_)) => TextOverflow::Clip,
        _ if ellipsis_by_default => TextOverflow::Ellipsis,
        _ => TextOverflow::Clip,
    };
    let wrap = if styles.keyword(style, P::WhiteSpace) == Some(Keyword::NoWrap) {
        WrapMode::NoWrap
    } else if styles.keyword(style, P::WordBreak) == Some(Keyword::BreakAll) {
        WrapMode::BreakAll
    } else {
        WrapMode::BreakWord
    };
    ShapeParams {
        font_size,
        max_width,
        max_height,
        max_lines: usize::try_from(max_lines).ok().filter(|n| *n > 0),
        line_height,
        letter_spacing: ctx.length(styles.number(style, P::LetterSpacing)),
        transform: match styles.keyword(style, P::TextTransform) {
            Some(Keyword::Uppercase) => TextTransform::Uppercase,
            Some(Keyword::Lowercase) => TextTransform::Lowercase,
            Some(Keyword::Capitalize) => TextTransform::Capitalize,
            _ => TextTransform::None,
        },
        overflow,
        wrap,
    }
}

/// Read-only view of the scene handed to the layout solver's measure callback.
struct Measure<'a> {
    nodes: &'a Arena<SceneNode>,
    styles: &'a StyleSheet,
    cache: &'a ResourceCache,
    context: &'a StyleContext,
    ellipsis: bool,
}

impl Measure<'_> {
    fn measure(
        &self,
        node: NodeId,
        known: Size<Option<f32>>,
        available: Size<AvailableSpace>,
    ) -> Size<f32> {
        let Some(n) = self.nodes.get(node.index()) else {
            return Size::ZERO;
        };
        let (width, height) = match &n.kind {
            NodeKind::Text(data) => {
                let Some(font) = data.font.and_then(|h| self.cache.font(h.resource)) else {
                    return resolve_known(known, (0.0, 0.0));
                };
                let max_width = known.width.or(match available.width {
                    AvailableSpace::Definite(w) => Some(w),
                    AvailableSpace::MinContent => Some(0.0),
                    AvailableSpace::MaxContent => None,
                });
                self.measure_text(&data.text, font.as_ref(), n.style, max_width)
            }
            NodeKind::Image(data) => {
                let Some((iw, ih)) = data.image.and_then(|h| self.cache.image_size(h.resource))
                else {
                    return resolve_known(known, (0.0, 0.0));
                };
                let (iw, ih) = (iw as f32, ih as f32);
                match (known.width, known.height) {
                    (Some(w), None) if iw > 0.0 => (w, w * ih / iw),
                    (None, Some(h)) if ih > 0.0 => (h * iw / ih, h),
                    _ => (iw, ih),
                }
            }
            _ => (0.0, 0.0),
        };
        resolve_known(known, (width, height))
    }

    fn measure_text(
        &self,
        text: &str,
        font: &dyn FontBackend,
        style: StyleId,
        max_width: Option<f32>,
    ) -> (f32, f32) {
        let params = shape_params(self.styles, style, self.context, self.ellipsis, max_width, None);
        rune_text::shape(text, font, &params).measured_size()
    }
}

fn resolve_known(known: Size<Option<f32>>, (width, height): (f32, f32)) -> Size<f32> {
    Size {
        width: known.width.unwrap_or(width),
        height: known.height.unwrap_or(height),
    }
}
