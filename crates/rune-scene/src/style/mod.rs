//! Style storage and the inheritance cascade.
//!
//! Every style keeps its own values in per-kind buckets and may name a parent
//! style. Reads walk the parent chain and fall back to the property default.
//! Node-owned styles further up the chain only pass on inherited (text)
//! properties; shared styles pass on everything.
//! Mutations report which node-owned styles saw their *effective* value
//! change, so the scene can forward exactly those into layout or node hooks.

pub mod property;
pub mod resolve;
pub mod value;

use std::fmt;

use engine_core::ColorLinPremul;
use hashbrown::HashMap;

use crate::arena::{Arena, Index};
use crate::error::StyleError;
use crate::node::NodeId;

pub use property::{PropertyMeta, StyleProperty, Units, ValueKind};
pub use resolve::StyleContext;
pub use value::{Anchor, Keyword, StyleNumber, StyleTransform, StyleUnit, StyleValue, TransformOp};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId {
    scene: u32,
    index: Index,
}

impl fmt::Debug for StyleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StyleId({}:{:?})", self.scene, self.index)
    }
}

/// A property whose effective value changed on a node-owned style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleChange {
    pub node: NodeId,
    pub style: StyleId,
    pub property: StyleProperty,
}

#[derive(Debug, Default)]
struct Buckets {
    keywords: HashMap<StyleProperty, Keyword>,
    integers: HashMap<StyleProperty, i32>,
    colors: HashMap<StyleProperty, ColorLinPremul>,
    strings: HashMap<StyleProperty, String>,
    numbers: HashMap<StyleProperty, StyleNumber>,
    transforms: HashMap<StyleProperty, StyleTransform>,
}

impl Buckets {
    fn get(&self, p: StyleProperty) -> Option<StyleValue> {
        match p.kind() {
            ValueKind::Keyword => self.keywords.get(&p).copied().map(StyleValue::Keyword),
            ValueKind::Integer => self.integers.get(&p).copied().map(StyleValue::Integer),
            ValueKind::Color => self.colors.get(&p).copied().map(StyleValue::Color),
            ValueKind::String => self.strings.get(&p).cloned().map(StyleValue::String),
            ValueKind::Number => self.numbers.get(&p).copied().map(StyleValue::Number),
            ValueKind::Transform => self.transforms.get(&p).cloned().map(StyleValue::Transform),
        }
    }

    fn contains(&self, p: StyleProperty) -> bool {
        match p.kind() {
            ValueKind::Keyword => self.keywords.contains_key(&p),
            ValueKind::Integer => self.integers.contains_key(&p),
            ValueKind::Color => self.colors.contains_key(&p),
            ValueKind::String => self.strings.contains_key(&p),
            ValueKind::Number => self.numbers.contains_key(&p),
            ValueKind::Transform => self.transforms.contains_key(&p),
        }
    }

    /// Caller has already checked the kind.
    fn insert(&mut self, p: StyleProperty, value: StyleValue) {
        match value {
            StyleValue::Keyword(v) => {
                self.keywords.insert(p, v);
            }
            StyleValue::Integer(v) => {
                self.integers.insert(p, v);
            }
            StyleValue::Color(v) => {
                self.colors.insert(p, v);
            }
            StyleValue::String(v) => {
                self.strings.insert(p, v);
            }
            StyleValue::Number(v) => {
                self.numbers.insert(p, v);
            }
            StyleValue::Transform(v) => {
                self.transforms.insert(p, v);
            }
        }
    }

    fn remove(&mut self, p: StyleProperty) -> Option<StyleValue> {
        match p.kind() {
            ValueKind::Keyword => self.keywords.remove(&p).map(StyleValue::Keyword),
            ValueKind::Integer => self.integers.remove(&p).map(StyleValue::Integer),
            ValueKind::Color => self.colors.remove(&p).map(StyleValue::Color),
            ValueKind::String => self.strings.remove(&p).map(StyleValue::String),
            ValueKind::Number => self.numbers.remove(&p).map(StyleValue::Number),
            ValueKind::Transform => self.transforms.remove(&p).map(StyleValue::Transform),
        }
    }

    fn properties(&self) -> impl Iterator<Item = StyleProperty> + '_ {
        self.keywords
            .keys()
            .chain(self.integers.keys())
            .chain(self.colors.keys())
            .chain(self.strings.keys())
            .chain(self.numbers.keys())
            .chain(self.transforms.keys())
            .copied()
    }
}

#[derive(Debug, Default)]
struct StyleData {
    values: Buckets,
    parent: Option<StyleId>,
    /// Styles naming this one as parent, in attachment order.
    dependents: Vec<StyleId>,
    owner: Option<NodeId>,
}

pub struct StyleSheet {
    scene: u32,
    styles: Arena<StyleData>,
}

impl StyleSheet {
    pub(crate) fn new(scene: u32) -> Self {
        Self {
            scene,
            styles: Arena::new(),
        }
    }

    pub(crate) fn create(&mut self, owner: Option<NodeId>) -> StyleId {
        let index = self.styles.insert(StyleData {
            owner,
            ..StyleData::default()
        });
        StyleId {
            scene: self.scene,
            index,
        }
    }

    fn data(&self, id: StyleId) -> Result<&StyleData, StyleError> {
        if id.scene != self.scene {
            return Err(StyleError::ForeignScene(id));
        }
        self.styles.get(id.index).ok_or(StyleError::Stale(id))
    }

    fn data_mut(&mut self, id: StyleId) -> Result<&mut StyleData, StyleError> {
        if id.scene != self.scene {
            return Err(StyleError::ForeignScene(id));
        }
        self.styles.get_mut(id.index).ok_or(StyleError::Stale(id))
    }

    pub fn contains(&self, id: StyleId) -> bool {
        self.data(id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn parent(&self, id: StyleId) -> Result<Option<StyleId>, StyleError> {
        Ok(self.data(id)?.parent)
    }

    pub fn owner(&self, id: StyleId) -> Result<Option<NodeId>, StyleError> {
        Ok(self.data(id)?.owner)
    }

    pub fn dependents(&self, id: StyleId) -> Result<&[StyleId], StyleError> {
        Ok(&self.data(id)?.dependents)
    }

    /// Value set directly on `id`, ignoring the parent chain.
    pub fn own(&self, id: StyleId, property: StyleProperty) -> Result<Option<StyleValue>, StyleError> {
        Ok(self.data(id)?.values.get(property))
    }

    /// First value defined along `id → parent → …`, if any. The walk stops
    /// at an ancestor owned by a node unless the property is inherited.
    pub fn lookup(&self, id: StyleId, property: StyleProperty) -> Result<Option<StyleValue>, StyleError> {
        let inherited = property.is_inherited();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let data = self.data(current)?;
            if current != id && data.owner.is_some() && !inherited {
                break;
            }
            if let Some(v) = data.values.get(property) {
                return Ok(Some(v));
            }
            cursor = data.parent;
        }
        Ok(None)
    }

    /// Effective value: own, else inherited, else the property default.
    pub fn get(&self, id: StyleId, property: StyleProperty) -> Result<StyleValue, StyleError> {
        Ok(self
            .lookup(id, property)?
            .unwrap_or_else(|| property.default_value()))
    }

    /// Infallible read for ids the scene owns; stale ids read as defaults.
    pub(crate) fn value(&self, id: StyleId, property: StyleProperty) -> StyleValue {
        self.get(id, property)
            .unwrap_or_else(|_| property.default_value())
    }

    pub(crate) fn number(&self, id: StyleId, property: StyleProperty) -> StyleNumber {
        self.value(id, property)
            .as_number()
            .unwrap_or(StyleNumber::AUTO)
    }

    pub(crate) fn keyword(&self, id: StyleId, property: StyleProperty) -> Option<Keyword> {
        self.value(id, property).as_keyword()
    }

    pub(crate) fn integer(&self, id: StyleId, property: StyleProperty) -> i32 {
        self.value(id, property).as_integer().unwrap_or(0)
    }

    pub(crate) fn color(&self, id: StyleId, property: StyleProperty) -> ColorLinPremul {
        self.value(id, property)
            .as_color()
            .unwrap_or(ColorLinPremul::TRANSPARENT)
    }

    pub(crate) fn string(&self, id: StyleId, property: StyleProperty) -> String {
        match self.value(id, property) {
            StyleValue::String(s) => s,
            _ => String::new(),
        }
    }

    pub(crate) fn transform(&self, id: StyleId, property: StyleProperty) -> StyleTransform {
        match self.value(id, property) {
            StyleValue::Transform(t) => t,
            _ => StyleTransform::default(),
        }
    }

    /// Assign an own value. Invalid values are rejected and the previous
    /// value is kept.
    pub fn set(
        &mut self,
        id: StyleId,
        property: StyleProperty,
        value: StyleValue,
    ) -> Result<Vec<StyleChange>, StyleError> {
        property.validate(&value)?;
        let data = self.data(id)?;
        if data.values.get(property).as_ref() == Some(&value) {
            return Ok(Vec::new());
        }
        let before = self.get(id, property)?;
        let changed = before != value;
        self.data_mut(id)?.values.insert(property, value);
        let mut changes = Vec::new();
        if changed {
            self.collect_changes(id, property, &mut changes);
        }
        Ok(changes)
    }

    /// Drop an own value so the property inherits again.
    pub fn unset(
        &mut self,
        id: StyleId,
        property: StyleProperty,
    ) -> Result<Vec<StyleChange>, StyleError> {
        let Some(before) = self.data_mut(id)?.values.remove(property) else {
            return Ok(Vec::new());
        };
        let after = self.get(id, property)?;
        let mut changes = Vec::new();
        if before != after {
            self.collect_changes(id, property, &mut changes);
        }
        Ok(changes)
    }

    /// Re-parent `id`, reporting only the properties whose effective value
    /// actually differs afterwards.
    pub fn set_parent(
        &mut self,
        id: StyleId,
        parent: Option<StyleId>,
    ) -> Result<Vec<StyleChange>, StyleError> {
        let old_parent = self.data(id)?.parent;
        if let Some(p) = parent {
            self.data(p)?;
            let mut cursor = Some(p);
            while let Some(current) = cursor {
                if current == id {
                    return Err(StyleError::Cycle { style: id, parent: p });
                }
                cursor = self.data(current)?.parent;
            }
        }
        if old_parent == parent {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<StyleProperty> = Vec::new();
        for chain_start in [old_parent, parent] {
            let mut cursor = chain_start;
            while let Some(current) = cursor {
                let data = self.data(current)?;
                candidates.extend(data.values.properties());
                cursor = data.parent;
            }
        }
        candidates.sort_unstable();
        candidates.dedup();
        let own = &self.data(id)?.values;
        candidates.retain(|p| !own.contains(*p));
        let before: Vec<StyleValue> = candidates
            .iter()
            .map(|p| self.get(id, *p))
            .collect::<Result<_, _>>()?;

        if let Some(old) = old_parent {
            if let Ok(data) = self.data_mut(old) {
                data.dependents.retain(|d| *d != id);
            }
        }
        if let Some(new) = parent {
            self.data_mut(new)?.dependents.push(id);
        }
        self.data_mut(id)?.parent = parent;

        let mut changes = Vec::new();
        for (property, old_value) in candidates.into_iter().zip(before) {
            if self.get(id, property)? != old_value {
                self.collect_changes(id, property, &mut changes);
            }
        }
        Ok(changes)
    }

    /// Remove `id`. Dependents are detached first, with their own change
    /// reports; the owner of `id` itself is not notified.
    pub(crate) fn destroy(&mut self, id: StyleId) -> Result<Vec<StyleChange>, StyleError> {
        let dependents = self.data(id)?.dependents.clone();
        let mut changes = Vec::new();
        for dependent in dependents {
            changes.extend(self.set_parent(dependent, None)?);
        }
        if let Some(parent) = self.data(id)?.parent {
            if let Ok(data) = self.data_mut(parent) {
                data.dependents.retain(|d| *d != id);
            }
        }
        self.styles.remove(id.index);
        Ok(changes)
    }

    /// Number properties on node-owned styles whose resolved value differs
    /// between two contexts. Only viewport or rem based values qualify.
    pub(crate) fn sweep_units(&self, before: &StyleContext, after: &StyleContext) -> Vec<StyleChange> {
        let mut changes = Vec::new();
        for (index, data) in self.styles.iter() {
            let Some(node) = data.owner else {
                continue;
            };
            let style = StyleId {
                scene: self.scene,
                index,
            };
            for &property in StyleProperty::ALL {
                if property.kind() != ValueKind::Number {
                    continue;
                }
                if let Ok(Some(StyleValue::Number(n))) = self.lookup(style, property) {
                    if before.differs_for(after, n) {
                        changes.push(StyleChange {
                            node,
                            style,
                            property,
                        });
                    }
                }
            }
        }
        changes
    }

    /// Report `property` on `id` and every dependent that inherits it.
    fn collect_changes(&self, id: StyleId, property: StyleProperty, out: &mut Vec<StyleChange>) {
        let Ok(data) = self.data(id) else {
            return;
        };
        if let Some(node) = data.owner {
            out.push(StyleChange {
                node,
                style: id,
                property,
            });
            if !property.is_inherited() {
                return;
            }
        }
        for &dependent in &data.dependents {
            let shadowed = self
                .data(dependent)
                .map(|d| d.values.contains(property))
                .unwrap_or(true);
            if !shadowed {
                self.collect_changes(dependent, property, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> StyleSheet {
        StyleSheet::new(7)
    }

    fn red() -> StyleValue {
        StyleValue::Color(ColorLinPremul::rgba(255, 0, 0, 255))
    }

    #[test]
    fn get_walks_parent_chain_then_default() {
        let mut s = sheet();
        let root = s.create(None);
        let mid = s.create(None);
        let leaf = s.create(None);
        s.set_parent(mid, Some(root)).unwrap();
        s.set_parent(leaf, Some(mid)).unwrap();

        assert_eq!(
            s.get(leaf, StyleProperty::BackgroundColor).unwrap(),
            StyleProperty::BackgroundColor.default_value()
        );
        s.set(root, StyleProperty::BackgroundColor, red()).unwrap();
        assert_eq!(s.get(leaf, StyleProperty::BackgroundColor).unwrap(), red());
        s.set(mid, StyleProperty::ZIndex, 4.into()).unwrap();
        assert_eq!(s.get(leaf, StyleProperty::ZIndex).unwrap(), StyleValue::Integer(4));
        assert_eq!(s.get(root, StyleProperty::ZIndex).unwrap(), StyleValue::Integer(0));
    }

    #[test]
    fn invalid_values_keep_previous_value() {
        let mut s = sheet();
        let id = s.create(None);
        s.set(id, StyleProperty::Width, StyleNumber::point(10.0).into()).unwrap();
        let err = s
            .set(id, StyleProperty::Width, StyleNumber::point(-5.0).into())
            .unwrap_err();
        assert!(matches!(err, StyleError::Validation { .. }));
        assert_eq!(
            s.get(id, StyleProperty::Width).unwrap(),
            StyleValue::from(StyleNumber::point(10.0))
        );
    }

    #[test]
    fn changes_reach_only_non_shadowing_owned_dependents() {
        let mut s = sheet();
        let a = NodeId::new_for_tests(7, 1);
        let b = NodeId::new_for_tests(7, 2);
        let shared = s.create(None);
        let inherits = s.create(Some(a));
        let shadows = s.create(Some(b));
        s.set_parent(inherits, Some(shared)).unwrap();
        s.set_parent(shadows, Some(shared)).unwrap();
        s.set(shadows, StyleProperty::Opacity, StyleNumber::number(0.2).into())
            .unwrap();

        let changes = s
            .set(shared, StyleProperty::Opacity, StyleNumber::number(0.5).into())
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].node, a);
        assert_eq!(changes[0].property, StyleProperty::Opacity);

        let again = s
            .set(shared, StyleProperty::Opacity, StyleNumber::number(0.5).into())
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn setting_the_inherited_value_reports_nothing() {
        let mut s = sheet();
        let node = NodeId::new_for_tests(7, 1);
        let id = s.create(Some(node));
        let changes = s
            .set(id, StyleProperty::FlexDirection, Keyword::Column.into())
            .unwrap();
        assert!(changes.is_empty());
        assert_eq!(
            s.own(id, StyleProperty::FlexDirection).unwrap(),
            Some(StyleValue::Keyword(Keyword::Column))
        );
        assert!(s.unset(id, StyleProperty::FlexDirection).unwrap().is_empty());
    }

    #[test]
    fn reparent_reports_true_delta_only() {
        let mut s = sheet();
        let node = NodeId::new_for_tests(7, 1);
        let old = s.create(None);
        let new = s.create(None);
        let child = s.create(Some(node));
        s.set(old, StyleProperty::ZIndex, 2.into()).unwrap();
        s.set(new, StyleProperty::ZIndex, 2.into()).unwrap();
        s.set(old, StyleProperty::BackgroundColor, red()).unwrap();
        s.set(new, StyleProperty::Opacity, StyleNumber::number(0.5).into())
            .unwrap();
        s.set(child, StyleProperty::Opacity, StyleNumber::number(0.1).into())
            .unwrap();
        s.set_parent(child, Some(old)).unwrap();

        let changes = s.set_parent(child, Some(new)).unwrap();
        let props: Vec<_> = changes.iter().map(|c| c.property).collect();
        assert_eq!(props, vec![StyleProperty::BackgroundColor]);
    }

    #[test]
    fn owned_ancestors_pass_on_inherited_properties_only() {
        let mut s = sheet();
        let outer = s.create(Some(NodeId::new_for_tests(7, 1)));
        let inner = s.create(Some(NodeId::new_for_tests(7, 2)));
        let shared = s.create(None);
        s.set(shared, StyleProperty::Opacity, StyleNumber::number(0.5).into())
            .unwrap();
        s.set_parent(outer, Some(shared)).unwrap();
        s.set_parent(inner, Some(outer)).unwrap();

        s.set(outer, StyleProperty::Width, StyleNumber::point(40.0).into())
            .unwrap();
        let changes = s.set(outer, StyleProperty::Color, red()).unwrap();
        let nodes: Vec<_> = changes.iter().map(|c| c.node).collect();
        assert_eq!(nodes, vec![NodeId::new_for_tests(7, 1), NodeId::new_for_tests(7, 2)]);

        assert_eq!(s.get(inner, StyleProperty::Color).unwrap(), red());
        assert_eq!(s.lookup(inner, StyleProperty::Width).unwrap(), None);
        // The shared style behind an owned ancestor is cut off as well.
        assert_eq!(s.lookup(inner, StyleProperty::Opacity).unwrap(), None);
        assert_eq!(
            s.get(outer, StyleProperty::Opacity).unwrap(),
            StyleValue::from(StyleNumber::number(0.5))
        );

        let changes = s
            .set(outer, StyleProperty::Width, StyleNumber::point(50.0).into())
            .unwrap();
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut s = sheet();
        let a = s.create(None);
        let b = s.create(None);
        s.set_parent(b, Some(a)).unwrap();
        assert!(matches!(s.set_parent(a, Some(b)), Err(StyleError::Cycle { .. })));
        assert!(matches!(s.set_parent(a, Some(a)), Err(StyleError::Cycle { .. })));
        assert_eq!(s.parent(a).unwrap(), None);
    }

    #[test]
    fn destroy_detaches_dependents_with_notifications() {
        let mut s = sheet();
        let node = NodeId::new_for_tests(7, 3);
        let shared = s.create(None);
        let child = s.create(Some(node));
        s.set_parent(child, Some(shared)).unwrap();
        s.set(shared, StyleProperty::ZIndex, 9.into()).unwrap();

        let changes = s.destroy(shared).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].property, StyleProperty::ZIndex);
        assert_eq!(s.parent(child).unwrap(), None);
        assert!(matches!(s.get(shared, StyleProperty::ZIndex), Err(StyleError::Stale(_))));
    }

    #[test]
    fn foreign_ids_are_rejected() {
        let mut mine = sheet();
        let mut other = StyleSheet::new(8);
        let foreign = other.create(None);
        let local = mine.create(None);
        assert!(matches!(
            mine.set_parent(local, Some(foreign)),
            Err(StyleError::ForeignScene(_))
        ));
    }

    #[test]
    fn unit_sweep_finds_viewport_and_rem_values() {
        let mut s = sheet();
        let node = NodeId::new_for_tests(7, 1);
        let id = s.create(Some(node));
        s.set(id, StyleProperty::Width, StyleNumber::new(50.0, StyleUnit::ViewportWidth).into())
            .unwrap();
        s.set(id, StyleProperty::Height, StyleNumber::point(20.0).into()).unwrap();
        s.set(id, StyleProperty::FontSize, StyleNumber::new(2.0, StyleUnit::RootEm).into())
            .unwrap();

        let before = StyleContext::default();
        let wider = StyleContext {
            viewport_width: 1024.0,
            ..before
        };
        let props: Vec<_> = s.sweep_units(&before, &wider).iter().map(|c| c.property).collect();
        assert_eq!(props, vec![StyleProperty::Width]);

        let bigger_rem = StyleContext {
            root_font_size: 20.0,
            ..before
        };
        let props: Vec<_> = s
            .sweep_units(&before, &bigger_rem)
            .iter()
            .map(|c| c.property)
            .collect();
        assert_eq!(props, vec![StyleProperty::FontSize]);
    }
}
