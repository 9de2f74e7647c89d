//! Handler handles: callbacks with stable identity.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::change::ChangeRecord;

/// Unique identifier for a handler.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(Uuid);

impl HandlerId {
    /// Create a new random handler id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A callback registered to receive batches of change records.
///
/// Cloning shares identity: clones register, replace, and drain as the same
/// handler, the way a host language's function reference would. Identity is
/// assigned at construction and never changes.
#[derive(Clone)]
pub struct Handler {
    id: HandlerId,
    callback: Rc<dyn Fn(&[ChangeRecord])>,
}

impl Handler {
    /// Wraps a callback into a registrable handle.
    pub fn new(callback: impl Fn(&[ChangeRecord]) + 'static) -> Self {
        Self {
            id: HandlerId::new(),
            callback: Rc::new(callback),
        }
    }

    /// This handler's identity.
    #[must_use]
    pub const fn id(&self) -> HandlerId {
        self.id
    }

    pub(crate) fn invoke(&self, batch: &[ChangeRecord]) {
        (self.callback)(batch);
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("id", &self.id).finish_non_exhaustive()
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handler {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn clones_share_identity() {
        let handler = Handler::new(|_| {});
        let clone = handler.clone();
        assert_eq!(handler, clone);
        assert_eq!(handler.id(), clone.id());
    }

    #[test]
    fn distinct_handlers_differ() {
        let first = Handler::new(|_| {});
        let second = Handler::new(|_| {});
        assert_ne!(first, second);
    }

    #[test]
    fn invoke_runs_the_callback() {
        let count = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&count);
        let handler = Handler::new(move |_batch| counter.set(counter.get() + 1));
        handler.invoke(&[]);
        handler.invoke(&[]);
        assert_eq!(count.get(), 2);
    }
}
