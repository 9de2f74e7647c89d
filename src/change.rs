//! Change descriptors: the events delivered to handlers.
//!
//! A [`ChangeRecord`] reports one detected or synthetic mutation. The type
//! tag is string-convertible both ways so custom types coming from
//! notifiers coexist with the built-in four.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::record::RecordRef;
use crate::value::Value;

/// The kind of mutation a change record reports.
///
/// The built-in four cover everything the diff engine can detect; anything
/// else is a custom type injected through a notifier. `Custom` never holds
/// a built-in spelling: conversion from a string normalizes it away.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeType {
    /// A property appeared.
    Add,
    /// A property's value changed.
    Update,
    /// A property disappeared.
    Delete,
    /// The record stopped accepting new properties.
    PreventExtensions,
    /// A caller-defined type carried by synthetic change records.
    Custom(String),
}

impl ChangeType {
    /// The wire spelling of this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::PreventExtensions => "preventExtensions",
            Self::Custom(name) => name,
        }
    }

    /// True for the four types the diff engine can produce.
    #[must_use]
    pub const fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl From<String> for ChangeType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "add" => Self::Add,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "preventExtensions" => Self::PreventExtensions,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for ChangeType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<ChangeType> for String {
    fn from(change_type: ChangeType) -> Self {
        change_type.as_str().to_string()
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addendum fields for synthetic change records.
///
/// Notifiers attach these to the record they enqueue; `extra` carries any
/// caller-defined fields beyond the standard shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeFields {
    /// Property name, when the change concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Prior value, when the caller has one to report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,

    /// Caller-defined fields, in insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Value>,
}

impl ChangeFields {
    /// Fields naming a single property.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// One reported mutation event.
///
/// Produced by the diff engine or synthesized through a notifier; immutable
/// once enqueued. Equality compares the record by reference identity, the
/// rest by value.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    /// What kind of mutation this is.
    pub change_type: ChangeType,
    /// The property concerned; absent for `preventExtensions`.
    pub name: Option<String>,
    /// The record the mutation happened on.
    pub object: RecordRef,
    /// Prior value; present for `update` and `delete`.
    pub old_value: Option<Value>,
    /// Addendum fields on synthetic records; empty on diffed ones.
    pub extra: IndexMap<String, Value>,
}

impl PartialEq for ChangeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.change_type == other.change_type
            && self.name == other.name
            && Rc::ptr_eq(&self.object, &other.object)
            && self.old_value == other.old_value
            && self.extra == other.extra
    }
}
