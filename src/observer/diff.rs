//! The diff engine: ordered change synthesis between two snapshots.

use crate::change::ChangeType;
use crate::value::Value;

use super::snapshot::Snapshot;

/// One detected property-level change, before it is bound to a record and
/// routed to handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    /// What happened to the property.
    pub change_type: ChangeType,
    /// The property concerned; absent for `preventExtensions`.
    pub name: Option<String>,
    /// Prior value; present for `update` and `delete`.
    pub old_value: Option<Value>,
}

/// Computes the ordered change sequence between two snapshots of one record.
///
/// The phase order is a contract: it is externally observable and must hold
/// regardless of the order mutations were applied:
///
/// 1. adds and updates, in the new snapshot's enumeration order;
/// 2. deletes, in the old snapshot's original order;
/// 3. the `preventExtensions` edge, if extensibility was lost.
///
/// Only the net difference is reported: a value changed and changed back
/// between the two captures produces nothing, and regaining extensibility
/// is not observable.
#[must_use]
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<PropertyChange> {
    let mut changes = Vec::new();

    for (key, value) in new.iter() {
        match old.get(key) {
            None => changes.push(PropertyChange {
                change_type: ChangeType::Add,
                name: Some(key.to_string()),
                old_value: None,
            }),
            Some(previous) if previous != value => changes.push(PropertyChange {
                change_type: ChangeType::Update,
                name: Some(key.to_string()),
                old_value: Some(previous.clone()),
            }),
            Some(_) => {}
        }
    }

    for (key, value) in old.iter() {
        if !new.contains(key) {
            changes.push(PropertyChange {
                change_type: ChangeType::Delete,
                name: Some(key.to_string()),
                old_value: Some(value.clone()),
            });
        }
    }

    if old.extensible() && !new.extensible() {
        changes.push(PropertyChange {
            change_type: ChangeType::PreventExtensions,
            name: None,
            old_value: None,
        });
    }

    changes
}
