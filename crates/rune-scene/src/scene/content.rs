//! Per-kind content: text strings, image sources, link targets and the
//! resources they pin.

use tracing::debug;

use super::Scene;
use crate::error::{Result, StructuralError};
use crate::node::{font_key, Held, LinkTarget, NodeFlags, NodeId, NodeKind};
use crate::resource::{FontKey, ImageRequest};
use crate::style::{Keyword, StyleId, StyleProperty};

impl Scene {
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let NodeKind::Text(data) = &mut self.node_mut(node)?.kind else {
            return Err(wrong_kind(node, "text"));
        };
        if data.text == text {
            return Ok(());
        }
        data.text = text;
        data.shaped = None;
        self.mark_layout_dirty(node);
        self.mark(
            node,
            NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
        );
        Ok(())
    }

    pub fn text(&self, node: NodeId) -> Result<&str> {
        match &self.node(node)?.kind {
            NodeKind::Text(data) => Ok(&data.text),
            _ => Err(wrong_kind(node, "text")),
        }
    }

    /// Lines of the last shaping result, ellipsis included.
    pub fn shaped_lines(&self, node: NodeId) -> Result<Vec<String>> {
        match &self.node(node)?.kind {
            NodeKind::Text(data) => Ok(data
                .shaped
                .as_ref()
                .map(|s| s.line_texts())
                .unwrap_or_default()),
            _ => Err(wrong_kind(node, "text")),
        }
    }

    /// Point an image node at `uri`, or clear it with `None`.
    pub fn set_image_source(&mut self, node: NodeId, uri: Option<&str>) -> Result<()> {
        let NodeKind::Image(data) = &self.node(node)?.kind else {
            return Err(wrong_kind(node, "image"));
        };
        if data.source.as_deref() == uri {
            return Ok(());
        }
        let held = uri.map(|uri| self.hold_image(node, uri));
        let n = self.node_mut(node)?;
        n.error = None;
        let old = match &mut n.kind {
            NodeKind::Image(data) => {
                data.source = uri.map(str::to_owned);
                data.placement = None;
                std::mem::replace(&mut data.image, held)
            }
            _ => None,
        };
        if let Some(old) = old {
            self.unhold(old);
        }
        self.mark_layout_dirty(node);
        self.mark(
            node,
            NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
        );
        Ok(())
    }

    pub fn image_source(&self, node: NodeId) -> Result<Option<&str>> {
        match &self.node(node)?.kind {
            NodeKind::Image(data) => Ok(data.source.as_deref()),
            _ => Err(wrong_kind(node, "image")),
        }
    }

    /// Preload `target` and keep it referenced for as long as the link lives.
    pub fn set_link(&mut self, node: NodeId, target: LinkTarget) -> Result<()> {
        let NodeKind::Link(data) = &self.node(node)?.kind else {
            return Err(wrong_kind(node, "link"));
        };
        if data.target.as_ref() == Some(&target) {
            return Ok(());
        }
        let held = match &target {
            LinkTarget::Image { href } => self.hold_image(node, href),
            LinkTarget::Font {
                family,
                style,
                weight,
                href,
            } => {
                let key = FontKey {
                    family: family.clone(),
                    style: *style,
                    weight: *weight,
                };
                self.cache.register_font_uri(key.clone(), href);
                let id = self.cache.acquire_font(key);
                self.hold(node, id)
            }
        };
        debug!(?node, ?target, "link target set");
        let n = self.node_mut(node)?;
        n.error = None;
        let old = match &mut n.kind {
            NodeKind::Link(data) => {
                data.target = Some(target);
                std::mem::replace(&mut data.held, Some(held))
            }
            _ => None,
        };
        if let Some(old) = old {
            self.unhold(old);
        }
        Ok(())
    }

    pub fn link_target(&self, node: NodeId) -> Result<Option<&LinkTarget>> {
        match &self.node(node)?.kind {
            NodeKind::Link(data) => Ok(data.target.as_ref()),
            _ => Err(wrong_kind(node, "link")),
        }
    }

    fn hold_image(&mut self, node: NodeId, uri: &str) -> Held {
        let id = self.cache.acquire_image(ImageRequest::new(uri));
        self.hold(node, id)
    }

    /// Re-acquire a box's background image after `backgroundImage` changed.
    pub(crate) fn refresh_background(&mut self, node: NodeId) {
        let Ok(n) = self.node(node) else {
            return;
        };
        let NodeKind::Box(data) = &n.kind else {
            return;
        };
        let uri = self.styles.string(n.style, StyleProperty::BackgroundImage);
        if data.background_uri == uri {
            return;
        }
        let held = (!uri.is_empty()).then(|| self.hold_image(node, &uri));
        let old = match self.node_mut(node) {
            Ok(n) => {
                n.error = None;
                match &mut n.kind {
                    NodeKind::Box(data) => {
                        data.background_uri = uri;
                        data.background_placement = None;
                        std::mem::replace(&mut data.background, held)
                    }
                    _ => None,
                }
            }
            Err(_) => None,
        };
        if let Some(old) = old {
            self.unhold(old);
        }
        self.mark(
            node,
            NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
        );
    }

    /// Re-acquire a text node's font when its family, style or weight changed.
    pub(crate) fn refresh_font(&mut self, node: NodeId) {
        let Ok(n) = self.node(node) else {
            return;
        };
        let NodeKind::Text(data) = &n.kind else {
            return;
        };
        let key = self.font_key_for(n.style);
        if data.font.is_some() && data.font_key.as_ref() == Some(&key) {
            return;
        }
        let id = self.cache.acquire_font(key.clone());
        let held = self.hold(node, id);
        let old = match self.node_mut(node) {
            Ok(n) => match &mut n.kind {
                NodeKind::Text(data) => {
                    data.font_key = Some(key);
                    data.shaped = None;
                    std::mem::replace(&mut data.font, Some(held))
                }
                _ => None,
            },
            Err(_) => None,
        };
        if let Some(old) = old {
            self.unhold(old);
        }
        self.mark_layout_dirty(node);
        self.mark(
            node,
            NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
        );
    }

    fn font_key_for(&self, style: StyleId) -> FontKey {
        let mut family = self.styles.string(style, StyleProperty::FontFamily);
        if family.is_empty() {
            family = self.cache.default_family().to_owned();
        }
        let italic = self.styles.keyword(style, StyleProperty::FontStyle) == Some(Keyword::Italic);
        font_key(
            family,
            italic,
            self.styles.integer(style, StyleProperty::FontWeight),
        )
    }
}

fn wrong_kind(node: NodeId, expected: &'static str) -> crate::error::SceneError {
    StructuralError::WrongKind { node, expected }.into()
}
