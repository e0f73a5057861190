//! Change records for one relation of one object.

use crate::core::{EntryState, ObjectId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relation name prefix reserved for engine bookkeeping.
pub const SYSTEM_PREFIX: &str = "sys::";
/// Version carried over by `set_version_update`.
pub const SYS_VERSION: &str = "sys::version";
/// New id after an id change.
pub const SYS_OBJECT_ID: &str = "sys::oid";
/// Old id before an id change.
pub const SYS_OLD_OBJECT_ID: &str = "sys::oldoid";

/// True for relation names on the system channel.
pub fn is_system_relation(name: &str) -> bool {
    name.starts_with(SYSTEM_PREFIX)
}

/// Value stored by a single-valued change.
///
/// Related objects are stored by [`ObjectId`], never by instance, so a graph
/// of changes survives serialization and id changes.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub enum ChangeValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Object(ObjectId),
}

impl ChangeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The referenced id, if this value points at another object.
    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Object(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for ChangeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ChangeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ChangeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ChangeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for ChangeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ChangeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<ObjectId> for ChangeValue {
    fn from(value: ObjectId) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<ChangeValue>> From<Option<T>> for ChangeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for ChangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
            Self::Object(id) => write!(f, "{id}"),
        }
    }
}

/// New value of a scalar property or single-valued relation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SingleChange {
    relation: String,
    value: ChangeValue,
}

impl SingleChange {
    pub fn new(relation: impl Into<String>, value: ChangeValue) -> Self {
        Self {
            relation: relation.into(),
            value,
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn value(&self) -> &ChangeValue {
        &self.value
    }

    pub(crate) fn set_value(&mut self, value: ChangeValue) {
        self.value = value;
    }
}

/// One add or remove against a multi-valued relation.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MultipleChangeEntry {
    child: ObjectId,
    state: EntryState,
}

impl MultipleChangeEntry {
    pub fn new(child: ObjectId, state: EntryState) -> Self {
        Self { child, state }
    }

    pub fn child(&self) -> &ObjectId {
        &self.child
    }

    pub fn state(&self) -> EntryState {
        self.state
    }
}

/// Ordered add/remove log for a multi-valued relation.
///
/// Entries accumulate: adding and then removing the same child leaves two
/// entries. The net effect is computed by replaying them in order.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MultipleChange {
    relation: String,
    entries: Vec<MultipleChangeEntry>,
}

impl MultipleChange {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            entries: Vec::new(),
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn entries(&self) -> &[MultipleChangeEntry] {
        &self.entries
    }

    pub(crate) fn push(&mut self, child: ObjectId, state: EntryState) {
        self.entries.push(MultipleChangeEntry::new(child, state));
    }
}

/// Change record for one relation name.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Change {
    Single(SingleChange),
    Multiple(MultipleChange),
}

impl Change {
    pub fn relation(&self) -> &str {
        match self {
            Self::Single(change) => change.relation(),
            Self::Multiple(change) => change.relation(),
        }
    }

    /// Every object id this change points at, in entry order.
    pub fn referenced_ids(&self) -> Vec<&ObjectId> {
        match self {
            Self::Single(change) => change.value().as_object_id().into_iter().collect(),
            Self::Multiple(change) => change.entries().iter().map(|e| e.child()).collect(),
        }
    }

    /// Rewrite every occurrence of `old` as a child value to `new`.
    pub(crate) fn rename_references(&mut self, old: &ObjectId, new: &ObjectId) {
        match self {
            Self::Single(change) => {
                if change.value.as_object_id() == Some(old) {
                    change.value = ChangeValue::Object(new.clone());
                }
            }
            Self::Multiple(change) => {
                for entry in &mut change.entries {
                    if &entry.child == old {
                        entry.child = new.clone();
                    }
                }
            }
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(change) => write!(f, "{}={}", change.relation, change.value),
            Self::Multiple(change) => {
                let entries = change
                    .entries
                    .iter()
                    .map(|e| format!("{}:{}", e.state, e.child))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}=[{}]", change.relation, entries)
            }
        }
    }
}
