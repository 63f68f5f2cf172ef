//! Scene nodes: identity, dirty flags, kind payloads and box geometry.

use std::fmt;

use bitflags::bitflags;
use engine_core::{DecodeError, Rect, TextureHandle};
use rune_text::ShapedText;

use crate::arena::Index;
use crate::resource::{FontKey, FontStyle, ListenerToken, ResourceId};
use crate::style::{Keyword, StyleContext, StyleId, StyleNumber};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    scene: u32,
    index: Index,
}

impl NodeId {
    pub(crate) const fn new(scene: u32, index: Index) -> Self {
        Self { scene, index }
    }

    pub(crate) const fn index(self) -> Index {
        self.index
    }

    /// Id of the scene that issued this node.
    pub const fn scene(self) -> u32 {
        self.scene
    }

    #[cfg(test)]
    pub(crate) const fn new_for_tests(scene: u32, slot: u32) -> Self {
        Self {
            scene,
            index: Index::from_raw(slot, 0),
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}:{:?})", self.scene, self.index)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Skipped by composite (visibility hidden, link nodes).
        const HIDDEN = 1 << 0;
        /// Box that draws nothing itself; only its subtree is composited.
        const LAYOUT_ONLY = 1 << 1;
        const COMPUTE_STYLE_DIRTY = 1 << 2;
        const COMPOSITE_DIRTY = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Root,
    Box,
    Image,
    Text,
    Link,
}

impl NodeType {
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Box => "box",
            NodeType::Image => "image",
            NodeType::Text => "text",
            NodeType::Link => "link",
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(self, NodeType::Image | NodeType::Text | NodeType::Link)
    }
}

/// Content a link node preloads and keeps referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Image {
        href: String,
    },
    Font {
        family: String,
        style: FontStyle,
        weight: u16,
        href: String,
    },
}

/// A resource a node holds a reference on, with its listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Held {
    pub resource: ResourceId,
    pub listener: Option<ListenerToken>,
}

#[derive(Debug, Default)]
pub(crate) struct BoxData {
    pub background_uri: String,
    pub background: Option<Held>,
    pub background_placement: Option<Placement>,
}

#[derive(Debug, Default)]
pub(crate) struct ImageData {
    pub source: Option<String>,
    pub image: Option<Held>,
    pub placement: Option<Placement>,
}

#[derive(Debug, Default)]
pub(crate) struct TextData {
    pub text: String,
    pub font_key: Option<FontKey>,
    pub font: Option<Held>,
    pub shaped: Option<ShapedText>,
    /// Size the layer was rasterized for.
    pub layer_size: (u32, u32),
}

#[derive(Debug, Default)]
pub(crate) struct LinkData {
    pub target: Option<LinkTarget>,
    pub held: Option<Held>,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Root,
    Box(BoxData),
    Image(ImageData),
    Text(TextData),
    Link(LinkData),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Root => NodeType::Root,
            NodeKind::Box(_) => NodeType::Box,
            NodeKind::Image(_) => NodeType::Image,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Link(_) => NodeType::Link,
        }
    }

    /// Resources currently referenced by this node.
    pub fn held(&self) -> Vec<Held> {
        match self {
            NodeKind::Root => Vec::new(),
            NodeKind::Box(b) => b.background.into_iter().collect(),
            NodeKind::Image(i) => i.image.into_iter().collect(),
            NodeKind::Text(t) => t.font.into_iter().collect(),
            NodeKind::Link(l) => l.held.into_iter().collect(),
        }
    }
}

/// Per-side widths, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Edges {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Solved box of a node. `x`/`y` are relative to the parent's border box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub border: Edges,
    pub padding: Edges,
}

impl LayoutBox {
    pub(crate) fn from_layout(layout: &taffy::Layout) -> Self {
        let edges = |r: taffy::Rect<f32>| Edges {
            left: r.left,
            right: r.right,
            top: r.top,
            bottom: r.bottom,
        };
        Self {
            x: layout.location.x,
            y: layout.location.y,
            width: layout.size.width,
            height: layout.size.height,
            border: edges(layout.border),
            padding: edges(layout.padding),
        }
    }

    /// Border box in node-local coordinates.
    pub fn border_box(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    pub fn padding_box(&self) -> Rect {
        let b = self.border;
        self.border_box().inset(b.left, b.top, b.right, b.bottom)
    }

    pub fn content_box(&self) -> Rect {
        let p = self.padding;
        self.padding_box().inset(p.left, p.top, p.right, p.bottom)
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Where an image lands: `src` in image pixels, `dest` in node-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub src: Rect,
    pub dest: Rect,
}

impl Placement {
    /// Fit an `image_w`×`image_h` image into `frame` by the object-fit
    /// keyword, positioned by `pos_x`/`pos_y`, and clipped to `frame`.
    pub fn fit(
        fit: Keyword,
        (image_w, image_h): (u32, u32),
        frame: Rect,
        pos_x: StyleNumber,
        pos_y: StyleNumber,
        ctx: &StyleContext,
    ) -> Option<Placement> {
        let (iw, ih) = (image_w as f32, image_h as f32);
        if iw <= 0.0 || ih <= 0.0 || frame.is_empty() {
            return None;
        }
        let contain = (frame.w / iw).min(frame.h / ih);
        let (sx, sy) = match fit {
            Keyword::Contain => (contain, contain),
            Keyword::Cover => {
                let s = (frame.w / iw).max(frame.h / ih);
                (s, s)
            }
            Keyword::None => (1.0, 1.0),
            Keyword::ScaleDown => {
                let s = contain.min(1.0);
                (s, s)
            }
            _ => (frame.w / iw, frame.h / ih),
        };
        let (dw, dh) = (iw * sx, ih * sy);
        let full = Rect::new(
            frame.x + ctx.position(pos_x, frame.w, dw),
            frame.y + ctx.position(pos_y, frame.h, dh),
            dw,
            dh,
        );
        let dest = full.intersect(&frame);
        if dest.is_empty() {
            return None;
        }
        let src = Rect::new(
            (dest.x - full.x) / sx,
            (dest.y - full.y) / sy,
            dest.w / sx,
            dest.h / sy,
        );
        Some(Placement { src, dest })
    }
}

#[derive(Debug)]
pub(crate) struct SceneNode {
    pub style: StyleId,
    pub layout: taffy::NodeId,
    pub flags: NodeFlags,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Children sorted by z-index; `None` after a structural or z-index change.
    pub z_order: Option<Vec<NodeId>>,
    pub last_box: Option<LayoutBox>,
    pub layer: Option<TextureHandle>,
    pub error: Option<DecodeError>,
    pub kind: NodeKind,
}

impl SceneNode {
    pub fn new(style: StyleId, layout: taffy::NodeId, kind: NodeKind) -> Self {
        let mut flags = NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY;
        if matches!(kind, NodeKind::Link(_)) {
            flags |= NodeFlags::HIDDEN;
        }
        Self {
            style,
            layout,
            flags,
            parent: None,
            children: Vec::new(),
            z_order: None,
            last_box: None,
            layer: None,
            error: None,
            kind,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

/// Notification for the host, drained with `Scene::drain_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    ResourceReady {
        node: NodeId,
        resource: ResourceId,
    },
    ResourceError {
        node: NodeId,
        resource: ResourceId,
        error: DecodeError,
    },
}

/// What one call to `Scene::frame` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub completions: usize,
    pub media_changed: bool,
    pub layout_ran: bool,
    pub styled: usize,
    pub painted: usize,
    pub composited: bool,
}

pub(crate) fn font_key(family: String, italic: bool, weight: i32) -> FontKey {
    FontKey {
        family,
        style: if italic { FontStyle::Italic } else { FontStyle::Normal },
        weight: weight.clamp(1, 1000) as u16,
    }
}
