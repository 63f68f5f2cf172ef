use thiserror::Error;

use crate::node::NodeId;
use crate::style::{StyleId, StyleProperty, ValueKind};

/// Invalid tree mutation. The tree is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("{child:?} is {parent:?} or one of its ancestors")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("{0:?} belongs to another scene")]
    ForeignScene(NodeId),
    #[error("{0:?} has been destroyed")]
    Stale(NodeId),
    #[error("{child:?} already has a parent")]
    AlreadyParented { child: NodeId },
    #[error("{0:?} cannot have children")]
    LeafNode(NodeId),
    #[error("{0:?} still has children")]
    HasChildren(NodeId),
    #[error("{child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
    #[error("the root node cannot be attached or destroyed")]
    RootNode,
    #[error("{node:?} is not a {expected} node")]
    WrongKind { node: NodeId, expected: &'static str },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StyleError {
    #[error("unknown style property `{0}`")]
    UnknownProperty(String),
    #[error("{property:?} expects a {expected:?} value, got {actual:?}")]
    KindMismatch {
        property: StyleProperty,
        expected: ValueKind,
        actual: ValueKind,
    },
    #[error("invalid value for {property:?}: {reason}")]
    Validation {
        property: StyleProperty,
        reason: String,
    },
    #[error("cannot parse `{input}` as {property:?}")]
    Parse {
        property: StyleProperty,
        input: String,
    },
    #[error("making {parent:?} the parent of {style:?} would create a cycle")]
    Cycle { style: StyleId, parent: StyleId },
    #[error("{0:?} has been destroyed")]
    Stale(StyleId),
    #[error("{0:?} belongs to another scene")]
    ForeignScene(StyleId),
    #[error("{0:?} is owned by a node and lives as long as it")]
    Owned(StyleId),
    #[error("shared style {style:?} cannot inherit from node-owned {parent:?}")]
    SharedParent { style: StyleId, parent: StyleId },
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Style(#[from] StyleError),
    #[error("layout failed: {0}")]
    Layout(#[from] taffy::TaffyError),
}

pub type Result<T, E = SceneError> = std::result::Result<T, E>;
