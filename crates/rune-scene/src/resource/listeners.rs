//! Observer registry with tokens and tombstones.
//!
//! Dispatch iterates a snapshot, so callbacks may add or remove listeners on
//! the same registry. Removals during dispatch only tombstone the entry; the
//! entry is compacted away once the outermost dispatch returns.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerToken(u64);

/// Who registered a listener; used for bulk removal on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerOwner {
    Node(NodeId),
    Host(u64),
}

pub type Callback<E> = Rc<dyn Fn(&E)>;

struct Entry<E> {
    token: ListenerToken,
    owner: ListenerOwner,
    callback: Callback<E>,
    removed: Cell<bool>,
}

pub struct Listeners<E> {
    entries: RefCell<Vec<Entry<E>>>,
    next_token: Cell<u64>,
    depth: Cell<u32>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_token: Cell::new(1),
            depth: Cell::new(0),
        }
    }

    pub fn add(&self, owner: ListenerOwner, callback: Callback<E>) -> ListenerToken {
        let token = ListenerToken(self.next_token.get());
        self.next_token.set(token.0 + 1);
        self.entries.borrow_mut().push(Entry {
            token,
            owner,
            callback,
            removed: Cell::new(false),
        });
        token
    }

    /// Returns `false` if the token was unknown or already removed.
    pub fn remove(&self, token: ListenerToken) -> bool {
        self.remove_where(|e| e.token == token) > 0
    }

    pub fn remove_owner(&self, owner: ListenerOwner) -> usize {
        self.remove_where(|e| e.owner == owner)
    }

    fn remove_where(&self, pred: impl Fn(&Entry<E>) -> bool) -> usize {
        let dispatching = self.depth.get() > 0;
        let mut entries = self.entries.borrow_mut();
        let mut count = 0;
        for entry in entries.iter().filter(|e| !e.removed.get() && pred(e)) {
            entry.removed.set(true);
            count += 1;
        }
        if !dispatching {
            entries.retain(|e| !e.removed.get());
        }
        count
    }

    /// Live listener count.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|e| !e.removed.get())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every listener that was registered when dispatch started and has
    /// not been removed since.
    pub fn dispatch(&self, event: &E) {
        let snapshot: Vec<(ListenerToken, Callback<E>)> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| !e.removed.get())
            .map(|e| (e.token, e.callback.clone()))
            .collect();
        tracing::trace!(listeners = snapshot.len(), "dispatching resource event");

        self.depth.set(self.depth.get() + 1);
        for (token, callback) in snapshot {
            let live = self
                .entries
                .borrow()
                .iter()
                .any(|e| e.token == token && !e.removed.get());
            if live {
                callback(event);
            }
        }
        self.depth.set(self.depth.get() - 1);

        if self.depth.get() == 0 {
            self.entries.borrow_mut().retain(|e| !e.removed.get());
        }
    }

    /// Call one listener directly, e.g. when registering on a resource that
    /// already reached a terminal state.
    pub fn notify_one(&self, token: ListenerToken, event: &E) {
        let callback = self
            .entries
            .borrow()
            .iter()
            .find(|e| e.token == token && !e.removed.get())
            .map(|e| e.callback.clone());
        if let Some(callback) = callback {
            self.depth.set(self.depth.get() + 1);
            callback(event);
            self.depth.set(self.depth.get() - 1);
            if self.depth.get() == 0 {
                self.entries.borrow_mut().retain(|e| !e.removed.get());
            }
        }
    }

    /// Raw slot count including tombstones; exposed for tests.
    #[cfg(test)]
    fn slots(&self) -> usize {
        self.entries.borrow().len()
    }
}
