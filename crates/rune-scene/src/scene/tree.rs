//! Structural operations: creation, attachment, detachment and teardown.

use tracing::{debug, trace};

use super::{Scene, SceneFlags};
use crate::error::{Result, StructuralError};
use crate::node::{
    BoxData, ImageData, LinkData, NodeFlags, NodeId, NodeKind, SceneNode, TextData,
};
use crate::resource::ListenerOwner;
use crate::style::{StyleContext, StyleProperty};

impl Scene {
    pub fn create_box(&mut self) -> Result<NodeId> {
        self.create(NodeKind::Box(BoxData::default()))
    }

    pub fn create_image(&mut self) -> Result<NodeId> {
        self.create(NodeKind::Image(ImageData::default()))
    }

    /// Text nodes take a reference on their font right away.
    pub fn create_text(&mut self) -> Result<NodeId> {
        let node = self.create(NodeKind::Text(TextData::default()))?;
        self.refresh_font(node);
        Ok(node)
    }

    pub fn create_link(&mut self) -> Result<NodeId> {
        self.create(NodeKind::Link(LinkData::default()))
    }

    fn create(&mut self, kind: NodeKind) -> Result<NodeId> {
        let layout = self.taffy.new_leaf(taffy::Style::default())?;
        let scene = self.id;
        let styles = &mut self.styles;
        let index = self.nodes.insert_with(|index| {
            SceneNode::new(styles.create(Some(NodeId::new(scene, index))), layout, kind)
        });
        let node = NodeId::new(scene, index);
        let style = self.initial_layout_style(node)?;
        self.taffy.set_style(layout, style)?;
        self.taffy.set_node_context(layout, Some(node))?;
        self.flags |= SceneFlags::all();
        trace!(?node, "node created");
        Ok(node)
    }

    /// Layout style built from every layout property's effective value.
    pub(crate) fn initial_layout_style(&self, node: NodeId) -> Result<taffy::Style> {
        let n = self.node(node)?;
        let mut style = taffy::Style::default();
        for &property in StyleProperty::ALL {
            if property.is_layout() {
                self.context
                    .apply(&mut style, property, &self.styles.value(n.style, property));
            }
        }
        pin_layout(&n.kind, &mut style, &self.context);
        Ok(style)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_attach(parent, child)?;
        let (parent_layout, child_layout) = (self.node(parent)?.layout, self.node(child)?.layout);
        self.taffy.add_child(parent_layout, child_layout)?;
        self.node_mut(parent)?.children.push(child);
        self.attached(parent, child)
    }

    /// Insert `child` in front of `before`, which must be a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) -> Result<()> {
        self.check_attach(parent, child)?;
        let position = self
            .node(parent)?
            .children
            .iter()
            .position(|c| *c == before)
            .ok_or(StructuralError::NotAChild {
                parent,
                child: before,
            })?;
        let (parent_layout, child_layout) = (self.node(parent)?.layout, self.node(child)?.layout);
        self.taffy
            .insert_child_at_index(parent_layout, position, child_layout)?;
        self.node_mut(parent)?.children.insert(position, child);
        self.attached(parent, child)
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node(child)?;
        let position = self
            .node(parent)?
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or(StructuralError::NotAChild { parent, child })?;
        let (parent_layout, child_layout) = (self.node(parent)?.layout, self.node(child)?.layout);
        self.taffy.remove_child(parent_layout, child_layout)?;
        let p = self.node_mut(parent)?;
        p.children.remove(position);
        p.z_order = None;
        let c = self.node_mut(child)?;
        c.parent = None;
        c.last_box = None;
        let (parent_style, child_style) = (self.node(parent)?.style, self.node(child)?.style);
        if self.styles.parent(child_style)? == Some(parent_style) {
            let changes = self.styles.set_parent(child_style, None)?;
            self.apply_style_changes(changes);
        }
        self.mark(parent, NodeFlags::COMPOSITE_DIRTY);
        trace!(?parent, ?child, "child removed");
        Ok(())
    }

    /// Validation shared by both attach operations. Nothing is modified.
    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<(), StructuralError> {
        let p = self.node(parent)?;
        let c = self.node(child)?;
        if child == self.root {
            return Err(StructuralError::RootNode);
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(StructuralError::Cycle { parent, child });
            }
            cursor = self.node(current)?.parent;
        }
        if p.node_type().is_leaf() {
            return Err(StructuralError::LeafNode(parent));
        }
        if c.parent.is_some() {
            return Err(StructuralError::AlreadyParented { child });
        }
        Ok(())
    }

    fn attached(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.node_mut(parent)?.z_order = None;
        self.node_mut(child)?.parent = Some(parent);
        // Text properties flow down the tree unless a shared style was named.
        let (parent_style, child_style) = (self.node(parent)?.style, self.node(child)?.style);
        if self.styles.parent(child_style)?.is_none() {
            let changes = self.styles.set_parent(child_style, Some(parent_style))?;
            self.apply_style_changes(changes);
        }
        self.mark(parent, NodeFlags::COMPOSITE_DIRTY);
        self.mark(
            child,
            NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
        );
        trace!(?parent, ?child, "child attached");
        Ok(())
    }

    /// Destroy a childless node, detaching it first.
    pub fn destroy_node(&mut self, node: NodeId) -> Result<()> {
        let n = self.node(node)?;
        if node == self.root {
            return Err(StructuralError::RootNode.into());
        }
        if !n.children.is_empty() {
            return Err(StructuralError::HasChildren(node).into());
        }
        let parent = n.parent;
        if let Some(parent) = parent {
            self.remove_child(parent, node)?;
        }

        let (held, layer, layout, style) = {
            let n = self.node(node)?;
            (n.kind.held(), n.layer, n.layout, n.style)
        };
        for h in held {
            self.cache.release(h.resource, false);
        }
        self.cache.remove_listeners_of(ListenerOwner::Node(node));
        if let Some(texture) = layer {
            self.released_textures.push(texture);
        }
        self.taffy.remove(layout)?;
        let changes = self.styles.destroy(style)?;
        self.nodes.remove(node.index());
        self.paint_requests.retain(|n| *n != node);
        self.apply_style_changes(changes);
        debug!(?node, "node destroyed");
        Ok(())
    }

    /// Destroy `node` and everything under it, leaves first.
    pub fn destroy_subtree(&mut self, node: NodeId) -> Result<()> {
        let mut order = Vec::new();
        let mut stack = vec![(node, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            stack.push((current, true));
            for &child in self.node(current)?.children.iter().rev() {
                stack.push((child, false));
            }
        }
        for current in order {
            self.destroy_node(current)?;
        }
        Ok(())
    }

    /// Children sorted by `zIndex`, ties in document order.
    pub fn children_ordered_by_z_index(&mut self, node: NodeId) -> Result<Vec<NodeId>> {
        if let Some(order) = &self.node(node)?.z_order {
            return Ok(order.clone());
        }
        let mut order = self.node(node)?.children.clone();
        let keys: Vec<i32> = order
            .iter()
            .map(|c| match self.node(*c) {
                Ok(n) => self.styles.integer(n.style, StyleProperty::ZIndex),
                Err(_) => 0,
            })
            .collect();
        let mut keyed: Vec<(i32, NodeId)> = keys.into_iter().zip(order.drain(..)).collect();
        keyed.sort_by_key(|(z, _)| *z);
        let order: Vec<NodeId> = keyed.into_iter().map(|(_, n)| n).collect();
        self.node_mut(node)?.z_order = Some(order.clone());
        Ok(order)
    }
}

/// Layout overrides that no style can change: the root always spans the
/// viewport and links never take part in layout.
pub(crate) fn pin_layout(kind: &NodeKind, style: &mut taffy::Style, ctx: &StyleContext) {
    match kind {
        NodeKind::Root => {
            style.display = taffy::Display::Flex;
            style.position = taffy::Position::Relative;
            style.size = taffy::Size {
                width: taffy::Dimension::Length(ctx.viewport_width),
                height: taffy::Dimension::Length(ctx.viewport_height),
            };
        }
        NodeKind::Link(_) => style.display = taffy::Display::None,
        _ => {}
    }
}
