//! Shared, refcounted external content (decoded images and font faces).

pub mod cache;
pub mod listeners;
pub mod loader;

use std::fmt;

use engine_core::{DecodeError, ResizeHint};

pub use cache::{ImagePayload, ResourceCache};
pub use listeners::{Callback, ListenerOwner, ListenerToken, Listeners};
pub use loader::{CancelFlag, FontSource, Loader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Image,
    Font,
}

/// Handle shared by every acquirer of the same request key. Serials are never
/// reused, so a handle to a reclaimed resource stays dead.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    kind: ResourceKind,
    serial: u64,
}

impl ResourceId {
    pub(crate) const fn new(kind: ResourceKind, serial: u64) -> Self {
        Self { kind, serial }
    }

    pub const fn kind(self) -> ResourceKind {
        self.kind
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.serial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    Init,
    Loading,
    Ready,
    Error,
}

impl ResourceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ResourceState::Ready | ResourceState::Error)
    }
}

/// Terminal notification delivered to resource listeners exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    Ready(ResourceId),
    Error(ResourceId, DecodeError),
}

impl ResourceEvent {
    pub fn resource(&self) -> ResourceId {
        match self {
            ResourceEvent::Ready(id) | ResourceEvent::Error(id, _) => *id,
        }
    }
}

/// Image request key: the same URI at the same target size shares one decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRequest {
    pub uri: String,
    pub resize: Option<ResizeHint>,
}

impl ImageRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            resize: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontKey {
    pub family: String,
    pub style: FontStyle,
    pub weight: u16,
}

impl FontKey {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            style: FontStyle::Normal,
            weight: 400,
        }
    }
}
