//! Immutable per-record captures.

use indexmap::IndexMap;

use crate::record::RecordRef;
use crate::value::Value;

/// A capture of a record's own enumerable properties and extensibility at
/// one scheduled pass.
///
/// Key invariants:
/// - Immutable once captured; the registry supersedes it, never edits it.
/// - Entry order is the record's enumeration order at capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    entries: IndexMap<String, Value>,
    extensible: bool,
    tick: u64,
}

impl Snapshot {
    /// Captures the record's current state.
    ///
    /// A key reported by `keys()` but gone by the time its value is read is
    /// skipped rather than recorded as null.
    #[must_use]
    pub fn capture(record: &RecordRef, tick: u64) -> Self {
        let mut entries = IndexMap::new();
        for key in record.keys() {
            if let Some(value) = record.get(&key) {
                entries.insert(key, value);
            }
        }
        Self {
            entries,
            extensible: record.is_extensible(),
            tick,
        }
    }

    /// Value captured for `key`, if the key was present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Whether `key` was present at capture time.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Captured entries in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Whether the record accepted new properties at capture time.
    #[must_use]
    pub const fn extensible(&self) -> bool {
        self.extensible
    }

    /// The scheduled pass this capture belongs to.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of captured properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no properties were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ObjectRecord;

    #[test]
    fn capture_preserves_enumeration_order() {
        let record = ObjectRecord::with_entries([("b", 1), ("a", 2)]);
        let record: RecordRef = record;
        let snapshot = Snapshot::capture(&record, 3);

        let keys: Vec<&str> = snapshot.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(snapshot.get("a"), Some(&Value::Int(2)));
        assert_eq!(snapshot.tick(), 3);
        assert!(snapshot.extensible());
    }

    #[test]
    fn capture_is_decoupled_from_later_mutation() {
        let object = ObjectRecord::with_entries([("a", 1)]);
        let record: RecordRef = object.clone();
        let snapshot = Snapshot::capture(&record, 0);

        object.set("a", 2);
        object.set("b", 3);
        assert_eq!(snapshot.get("a"), Some(&Value::Int(1)));
        assert!(!snapshot.contains("b"));
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn capture_records_lost_extensibility() {
        let object = ObjectRecord::new();
        object.prevent_extensions();
        let record: RecordRef = object;
        let snapshot = Snapshot::capture(&record, 0);
        assert!(!snapshot.extensible());
        assert!(snapshot.is_empty());
    }
}
