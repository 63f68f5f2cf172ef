//! Style operations and per-kind reactions to property changes.

use tracing::{trace, warn};

use super::tree::pin_layout;
use super::Scene;
use crate::error::{Result, StyleError};
use crate::node::{NodeFlags, NodeId, NodeType};
use crate::style::{Keyword, StyleChange, StyleId, StyleProperty, StyleSheet, StyleValue};

impl Scene {
    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    /// The style a node owns.
    pub fn style_of(&self, node: NodeId) -> Result<StyleId> {
        Ok(self.node(node)?.style)
    }

    /// Effective value of `property` on a node.
    pub fn get_style(&self, node: NodeId, property: StyleProperty) -> Result<StyleValue> {
        Ok(self.styles.get(self.node(node)?.style, property)?)
    }

    /// A style owned by no node, usable as a shared parent.
    pub fn create_style(&mut self) -> StyleId {
        self.styles.create(None)
    }

    /// Destroy a shared style. Node styles that inherited from it go back to
    /// their tree parent's style; shared ones are detached.
    pub fn destroy_style(&mut self, style: StyleId) -> Result<()> {
        if self.styles.owner(style)?.is_some() {
            return Err(StyleError::Owned(style).into());
        }
        let dependents = self.styles.dependents(style)?.to_vec();
        for dependent in dependents {
            if let Some(owner) = self.styles.owner(dependent)? {
                let fallback = self.tree_parent_style(owner);
                let changes = self.styles.set_parent(dependent, fallback)?;
                self.apply_style_changes(changes);
            }
        }
        let changes = self.styles.destroy(style)?;
        self.apply_style_changes(changes);
        Ok(())
    }

    /// Style of the node's tree parent, which a node style inherits from
    /// unless pointed at a shared style.
    pub(crate) fn tree_parent_style(&self, node: NodeId) -> Option<StyleId> {
        let parent = self.node(node).ok()?.parent?;
        self.node(parent).ok().map(|p| p.style)
    }

    pub fn set_style(
        &mut self,
        node: NodeId,
        property: StyleProperty,
        value: impl Into<StyleValue>,
    ) -> Result<()> {
        let style = self.node(node)?.style;
        self.set_style_value(style, property, value)
    }

    /// Set a property from its camelCase or kebab-case name and css-like text.
    pub fn set_style_str(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let property =
            StyleProperty::from_name(name).ok_or_else(|| StyleError::UnknownProperty(name.into()))?;
        let value = StyleValue::parse(property, value)?;
        self.set_style(node, property, value)
    }

    pub fn unset_style(&mut self, node: NodeId, property: StyleProperty) -> Result<()> {
        let style = self.node(node)?.style;
        self.unset_style_value(style, property)
    }

    /// Set a property on any style, owned or shared.
    pub fn set_style_value(
        &mut self,
        style: StyleId,
        property: StyleProperty,
        value: impl Into<StyleValue>,
    ) -> Result<()> {
        let changes = self.styles.set(style, property, value.into())?;
        self.apply_style_changes(changes);
        Ok(())
    }

    pub fn unset_style_value(&mut self, style: StyleId, property: StyleProperty) -> Result<()> {
        let changes = self.styles.unset(style, property)?;
        self.apply_style_changes(changes);
        Ok(())
    }

    /// Point `style` at a new parent. A node style given `None` goes back to
    /// inheriting from its tree parent. Shared styles may only name other
    /// shared styles.
    pub fn set_style_parent(&mut self, style: StyleId, parent: Option<StyleId>) -> Result<()> {
        let owner = self.styles.owner(style)?;
        let parent = match (owner, parent) {
            (Some(node), None) => self.tree_parent_style(node),
            (None, Some(p)) if self.styles.owner(p)?.is_some() => {
                return Err(StyleError::SharedParent { style, parent: p }.into());
            }
            (_, parent) => parent,
        };
        let changes = self.styles.set_parent(style, parent)?;
        self.apply_style_changes(changes);
        Ok(())
    }

    /// Route each change to the layout tree or to the node's hook.
    pub(crate) fn apply_style_changes(&mut self, changes: Vec<StyleChange>) {
        for change in changes {
            trace!(node = ?change.node, property = ?change.property, "style changed");
            if change.property.is_layout() {
                if let Err(err) = self.forward_layout_property(change.node, change.property) {
                    warn!(node = ?change.node, %err, "failed to update layout style");
                }
            } else {
                self.on_style_property_changed(change.node, change.property);
            }
        }
    }

    fn forward_layout_property(&mut self, node: NodeId, property: StyleProperty) -> Result<()> {
        let n = self.node(node)?;
        let layout = n.layout;
        let mut style = self.taffy.style(layout)?.clone();
        self.context
            .apply(&mut style, property, &self.styles.value(n.style, property));
        pin_layout(&n.kind, &mut style, &self.context);
        self.taffy.set_style(layout, style)?;
        Ok(())
    }

    fn on_style_property_changed(&mut self, node: NodeId, property: StyleProperty) {
        let Ok(node_type) = self.node_type(node) else {
            return;
        };
        let handled = match node_type {
            NodeType::Box => self.box_property_changed(node, property),
            NodeType::Image => self.image_property_changed(node, property),
            NodeType::Text => self.text_property_changed(node, property),
            NodeType::Root => self.root_property_changed(node, property),
            NodeType::Link => false,
        };
        if !handled {
            self.default_property_changed(node, property);
        }
    }

    fn box_property_changed(&mut self, node: NodeId, property: StyleProperty) -> bool {
        use StyleProperty as P;
        match property {
            P::BackgroundImage => {
                self.refresh_background(node);
                true
            }
            P::BackgroundColor
            | P::BorderColor
            | P::BackgroundFit
            | P::BackgroundPositionX
            | P::BackgroundPositionY => {
                self.mark(
                    node,
                    NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
                );
                true
            }
            _ => false,
        }
    }

    fn root_property_changed(&mut self, node: NodeId, property: StyleProperty) -> bool {
        match property {
            StyleProperty::BackgroundColor | StyleProperty::BorderColor => {
                self.mark(
                    node,
                    NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
                );
                true
            }
            _ => false,
        }
    }

    fn image_property_changed(&mut self, node: NodeId, property: StyleProperty) -> bool {
        use StyleProperty as P;
        match property {
            P::ObjectFit | P::ObjectPositionX | P::ObjectPositionY => {
                self.mark(
                    node,
                    NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
                );
                true
            }
            _ => false,
        }
    }

    fn text_property_changed(&mut self, node: NodeId, property: StyleProperty) -> bool {
        use StyleProperty as P;
        if !property.affects_text() {
            return false;
        }
        if matches!(property, P::FontFamily | P::FontStyle | P::FontWeight) {
            self.refresh_font(node);
        }
        // Color and alignment only show up when the layer is rasterized.
        if !matches!(property, P::Color | P::TextAlign) {
            self.mark_layout_dirty(node);
        }
        self.mark(
            node,
            NodeFlags::COMPUTE_STYLE_DIRTY | NodeFlags::COMPOSITE_DIRTY,
        );
        true
    }

    fn default_property_changed(&mut self, node: NodeId, property: StyleProperty) {
        match property {
            StyleProperty::ZIndex => {
                if let Ok(Some(parent)) = self.parent(node) {
                    if let Ok(p) = self.node_mut(parent) {
                        p.z_order = None;
                    }
                }
                self.mark(node, NodeFlags::COMPOSITE_DIRTY);
            }
            StyleProperty::Visibility => {
                let hidden = self
                    .node(node)
                    .map(|n| self.styles.keyword(n.style, property) == Some(Keyword::Hidden))
                    .unwrap_or(false);
                if let Ok(n) = self.node_mut(node) {
                    let is_link = n.node_type() == NodeType::Link;
                    n.flags.set(NodeFlags::HIDDEN, hidden || is_link);
                }
                self.mark(node, NodeFlags::COMPOSITE_DIRTY);
            }
            _ => self.mark(node, NodeFlags::COMPOSITE_DIRTY),
        }
    }
}
