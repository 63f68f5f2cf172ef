//! The retained scene: node tree, style sheet, layout tree and resource
//! cache, owned together and driven once per frame by [`Scene::frame`].

mod content;
mod pipeline;
mod style;
mod tree;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use engine_core::{DecodeError, TextureHandle};
use rune_config::RuneConfig;
use taffy::TaffyTree;
use tracing::debug;

use crate::arena::Arena;
use crate::error::{Result, StructuralError};
use crate::node::{
    Held, LayoutBox, NodeFlags, NodeId, NodeKind, NodeType, SceneEvent, SceneNode,
};
use crate::resource::{
    Callback, ListenerOwner, ListenerToken, ResourceCache, ResourceEvent, ResourceId,
};
use crate::style::{StyleContext, StyleSheet};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

bitflags! {
    /// Which passes have work queued.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SceneFlags: u8 {
        const COMPUTE_STYLE = 1 << 0;
        const COMPOSITE = 1 << 1;
    }
}

type Inbox = Rc<RefCell<Vec<(NodeId, ResourceEvent)>>>;

pub struct Scene {
    id: u32,
    nodes: Arena<SceneNode>,
    styles: StyleSheet,
    taffy: TaffyTree<NodeId>,
    root: NodeId,
    cache: ResourceCache,
    /// Context the current styles were resolved with.
    context: StyleContext,
    /// Context requested by the host, applied during media sync.
    requested_context: StyleContext,
    flags: SceneFlags,
    paint_requests: Vec<NodeId>,
    events: Vec<SceneEvent>,
    inbox: Inbox,
    released_textures: Vec<TextureHandle>,
    frame_count: u64,
    compact_interval: u64,
    ellipsis_by_default: bool,
}

impl Scene {
    /// Build a scene with a resource cache configured from `config`.
    pub fn new(config: &RuneConfig) -> Result<Self> {
        Self::with_cache(config, ResourceCache::from_config(config))
    }

    pub fn with_cache(config: &RuneConfig, cache: ResourceCache) -> Result<Self> {
        let id = NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed);
        let context = StyleContext {
            viewport_width: config.scene.viewport_width,
            viewport_height: config.scene.viewport_height,
            root_font_size: config.scene.root_font_size,
        };
        let mut taffy = TaffyTree::new();
        let placeholder = taffy.new_leaf(taffy::Style::default())?;
        let mut styles = StyleSheet::new(id);
        let mut nodes = Arena::new();
        let index = nodes.insert_with(|index| {
            let root = NodeId::new(id, index);
            SceneNode::new(styles.create(Some(root)), placeholder, NodeKind::Root)
        });
        let root = NodeId::new(id, index);

        let mut scene = Self {
            id,
            nodes,
            styles,
            taffy,
            root,
            cache,
            context,
            requested_context: context,
            flags: SceneFlags::all(),
            paint_requests: Vec::new(),
            events: Vec::new(),
            inbox: Rc::new(RefCell::new(Vec::new())),
            released_textures: Vec::new(),
            frame_count: 0,
            compact_interval: config.cache.compact_interval_frames,
            ellipsis_by_default: config.text.ellipsis,
        };
        let root_style = scene.initial_layout_style(root)?;
        scene.taffy.set_style(placeholder, root_style)?;
        scene.taffy.set_node_context(placeholder, Some(root))?;
        debug!(scene = id, "scene created");
        Ok(scene)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_ok()
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&SceneNode, StructuralError> {
        if id.scene() != self.id {
            return Err(StructuralError::ForeignScene(id));
        }
        self.nodes.get(id.index()).ok_or(StructuralError::Stale(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, StructuralError> {
        if id.scene() != self.id {
            return Err(StructuralError::ForeignScene(id));
        }
        self.nodes.get_mut(id.index()).ok_or(StructuralError::Stale(id))
    }

    pub fn node_type(&self, node: NodeId) -> Result<NodeType> {
        Ok(self.node(node)?.node_type())
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(node)?.parent)
    }

    pub fn children(&self, node: NodeId) -> Result<&[NodeId]> {
        Ok(&self.node(node)?.children)
    }

    pub fn node_flags(&self, node: NodeId) -> Result<NodeFlags> {
        Ok(self.node(node)?.flags)
    }

    pub fn scene_flags(&self) -> SceneFlags {
        self.flags
    }

    /// Last content failure recorded on `node`.
    pub fn node_error(&self, node: NodeId) -> Option<&DecodeError> {
        self.node(node).ok()?.error.as_ref()
    }

    /// Box from the most recent layout pass.
    pub fn layout_box(&self, node: NodeId) -> Option<LayoutBox> {
        self.node(node).ok()?.last_box
    }

    /// Layer texture of a text node, once painted.
    pub fn layer_texture(&self, node: NodeId) -> Option<TextureHandle> {
        self.node(node).ok()?.layer
    }

    pub fn context(&self) -> StyleContext {
        self.context
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn resources(&self) -> &ResourceCache {
        &self.cache
    }

    /// Register assets and font sources, or drive the loader directly.
    pub fn resources_mut(&mut self) -> &mut ResourceCache {
        &mut self.cache
    }

    /// Resources `node` currently holds a reference on.
    pub fn node_resources(&self, node: NodeId) -> Vec<ResourceId> {
        self.node(node)
            .map(|n| n.kind.held().into_iter().map(|h| h.resource).collect())
            .unwrap_or_default()
    }

    pub fn add_resource_listener(
        &mut self,
        resource: ResourceId,
        owner: u64,
        callback: Callback<ResourceEvent>,
    ) -> Option<ListenerToken> {
        self.cache
            .add_listener(resource, ListenerOwner::Host(owner), callback)
    }

    pub fn remove_resource_listener(&mut self, resource: ResourceId, token: ListenerToken) -> bool {
        self.cache.remove_listener(resource, token)
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Change the viewport; dependent styles are re-resolved next frame.
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.requested_context.viewport_width = width;
        self.requested_context.viewport_height = height;
    }

    pub fn set_root_font_size(&mut self, px: f32) {
        self.requested_context.root_font_size = px;
    }

    pub fn mark_compute_style_dirty(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.mark(node, NodeFlags::COMPUTE_STYLE_DIRTY);
        Ok(())
    }

    pub fn mark_composite_dirty(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.mark(node, NodeFlags::COMPOSITE_DIRTY);
        Ok(())
    }

    /// Set dirty flags on a node and raise the matching scene-level flags.
    pub(crate) fn mark(&mut self, node: NodeId, flags: NodeFlags) {
        let Ok(n) = self.node_mut(node) else {
            return;
        };
        n.flags |= flags;
        if flags.contains(NodeFlags::COMPUTE_STYLE_DIRTY) {
            self.flags |= SceneFlags::COMPUTE_STYLE;
        }
        if flags.contains(NodeFlags::COMPOSITE_DIRTY) {
            self.flags |= SceneFlags::COMPOSITE;
        }
    }

    pub(crate) fn mark_layout_dirty(&mut self, node: NodeId) {
        if let Ok(n) = self.node(node) {
            let layout = n.layout;
            if let Err(err) = self.taffy.mark_dirty(layout) {
                tracing::warn!(?node, %err, "failed to mark layout dirty");
            }
        }
    }

    fn listener_for(&self, node: NodeId) -> Callback<ResourceEvent> {
        let inbox = self.inbox.clone();
        Rc::new(move |event: &ResourceEvent| inbox.borrow_mut().push((node, event.clone())))
    }

    /// Take a reference on `resource` for `node` and start loading it.
    pub(crate) fn hold(&mut self, node: NodeId, resource: ResourceId) -> Held {
        let callback = self.listener_for(node);
        let listener = self
            .cache
            .add_listener(resource, ListenerOwner::Node(node), callback);
        self.cache.load(resource);
        Held { resource, listener }
    }

    pub(crate) fn unhold(&mut self, held: Held) {
        if let Some(token) = held.listener {
            self.cache.remove_listener(held.resource, token);
        }
        self.cache.release(held.resource, false);
    }

    /// Route queued resource events to the nodes that hold them.
    pub(crate) fn process_resource_events(&mut self) -> usize {
        let queued = std::mem::take(&mut *self.inbox.borrow_mut());
        let count = queued.len();
        for (node, event) in queued {
            let resource = event.resource();
            let Ok(n) = self.node_mut(node) else {
                continue;
            };
            let Some(node_type) = n
                .kind
                .held()
                .iter()
                .any(|h| h.resource == resource)
                .then(|| n.node_type())
            else {
                // The node switched to other content since.
                continue;
            };
            match event {
                ResourceEvent::Ready(_) => {
                    n.error = None;
                    self.events.push(SceneEvent::ResourceReady { node, resource });
                    if matches!(node_type, NodeType::Image | NodeType::Text) {
                        self.mark_layout_dirty(node);
                    }
                    self.mark(
                        node,
                        NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
                    );
                }
                ResourceEvent::Error(_, error) => {
                    n.error = Some(error.clone());
                    self.events.push(SceneEvent::ResourceError {
                        node,
                        resource,
                        error,
                    });
                    self.mark(
                        node,
                        NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
                    );
                }
            }
        }
        count
    }
}
