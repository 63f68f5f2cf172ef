//! rune-scene: a retained-mode scene graph.
//!
//! - a node tree with dirty flags and a flexbox layout tree mirrored 1:1
//! - a style cascade over typed property buckets with precise change reports
//! - a refcounted resource cache fed by a background decode pool
//! - a frame pipeline that lays out, resolves styles, paints text layers
//!   and composites into a [`RenderSink`](engine_core::RenderSink)

pub mod arena;
pub mod composite;
pub mod error;
pub mod node;
pub mod resource;
pub mod scene;
pub mod style;

pub use composite::CompositeContext;
pub use error::{Result, SceneError, StructuralError, StyleError};
pub use node::{
    Edges, FrameStats, LayoutBox, LinkTarget, NodeFlags, NodeId, NodeType, Placement, SceneEvent,
};
pub use resource::{
    FontKey, FontSource, FontStyle, ImageRequest, ListenerToken, ResourceCache, ResourceEvent,
    ResourceId, ResourceKind, ResourceState,
};
pub use scene::{Scene, SceneFlags};
pub use style::{
    Anchor, Keyword, StyleContext, StyleId, StyleNumber, StyleProperty, StyleSheet,
    StyleTransform, StyleUnit, StyleValue,
};
