//! The record capability trait and the built-in object container.
//!
//! The engine never depends on a concrete container type. Anything that can
//! enumerate its own keys in order, read values by key, and report whether
//! new keys may be added can be observed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// Capability interface the engine observes records through.
///
/// Implementations report own enumerable properties only; keys must come
/// back in enumeration order, and that order is what add/delete phases of
/// the diff engine iterate in. Extensibility is expected to be
/// one-directional: once a record reports `false` it should not report
/// `true` again (the reverse edge is not observable either way).
pub trait Record: fmt::Debug {
    /// Own enumerable property names, in enumeration order.
    fn keys(&self) -> Vec<String>;

    /// Current value of a property, if present.
    fn get(&self, key: &str) -> Option<Value>;

    /// Whether new properties may be added.
    fn is_extensible(&self) -> bool;
}

/// Shared handle to an observed record.
///
/// Reference equality of the allocation defines record identity: two
/// handles name the same record exactly when they point at the same
/// allocation, and that identity is stable for the record's observed
/// lifetime.
pub type RecordRef = Rc<dyn Record>;

/// Registry key derived from a record's allocation address.
///
/// Valid only while the registry holds a live handle to the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RecordKey(usize);

impl RecordKey {
    pub(crate) fn of(record: &RecordRef) -> Self {
        Self(Rc::as_ptr(record).cast::<()>() as usize)
    }
}

/// Insertion-ordered key-value container implementing [`Record`].
///
/// `ObjectRecord` is the substitute container for hosts without a native
/// introspectable one: keys enumerate in insertion order, removal preserves
/// the order of the remaining keys, and [`prevent_extensions`] latches the
/// record closed to new keys permanently.
///
/// [`prevent_extensions`]: ObjectRecord::prevent_extensions
#[derive(Debug)]
pub struct ObjectRecord {
    fields: RefCell<IndexMap<String, Value>>,
    extensible: Cell<bool>,
}

impl ObjectRecord {
    /// Creates an empty, extensible record.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            fields: RefCell::new(IndexMap::new()),
            extensible: Cell::new(true),
        })
    }

    /// Creates a record pre-populated in iteration order.
    pub fn with_entries<I, K, V>(entries: I) -> Rc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let record = Self::new();
        for (key, value) in entries {
            record.set(key, value);
        }
        record
    }

    /// Sets a property.
    ///
    /// Returns `false` (and stores nothing) when the record is
    /// non-extensible and the key is new; existing keys remain updatable.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let mut fields = self.fields.borrow_mut();
        if !self.extensible.get() && !fields.contains_key(&key) {
            return false;
        }
        fields.insert(key, value.into());
        true
    }

    /// Removes a property, returning its value.
    ///
    /// The enumeration order of the remaining keys is preserved.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.fields.borrow_mut().shift_remove(key)
    }

    /// Latches the record closed to new keys. Cannot be undone.
    pub fn prevent_extensions(&self) {
        self.extensible.set(false);
    }

    /// Number of properties currently present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    /// True when no properties are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }
}

impl Record for ObjectRecord {
    fn keys(&self) -> Vec<String> {
        self.fields.borrow().keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.fields.borrow().get(key).cloned()
    }

    fn is_extensible(&self) -> bool {
        self.extensible.get()
    }
}
