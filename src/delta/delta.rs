//! Per-object change aggregate.

use super::change::{Change, ChangeValue, MultipleChange, SingleChange};
use crate::core::{EntryState, ObjectId, ObjectState};
use crate::transaction::{TransactionError, TransactionResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle state plus all recorded changes for one object in one scope.
///
/// A relation name maps to exactly one change record, either single- or
/// multi-valued. `Clone` is a deep copy, which is what extracts rely on.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TransactionDelta {
    object_id: ObjectId,
    state: ObjectState,
    version: Option<String>,
    changes: BTreeMap<String, Change>,
}

impl TransactionDelta {
    /// Create a delta with no changes.
    pub fn new(object_id: ObjectId, state: ObjectState, version: Option<String>) -> Self {
        Self {
            object_id,
            state,
            version,
            changes: BTreeMap::new(),
        }
    }

    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    /// Version of the object when this delta was created.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// All change records ordered by relation name.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.changes.values()
    }

    pub fn change(&self, relation: &str) -> Option<&Change> {
        self.changes.get(relation)
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// True if a single-valued change exists for `relation`, even if it is null.
    pub fn has_single(&self, relation: &str) -> bool {
        matches!(self.changes.get(relation), Some(Change::Single(_)))
    }

    pub fn single(&self, relation: &str) -> Option<&ChangeValue> {
        match self.changes.get(relation) {
            Some(Change::Single(change)) => Some(change.value()),
            _ => None,
        }
    }

    pub fn multiple(&self, relation: &str) -> Option<&MultipleChange> {
        match self.changes.get(relation) {
            Some(Change::Multiple(change)) => Some(change),
            _ => None,
        }
    }

    pub(crate) fn set_state(&mut self, state: ObjectState) {
        self.state = state;
    }

    pub(crate) fn set_object_id(&mut self, object_id: ObjectId) {
        self.object_id = object_id;
    }

    /// Demote `Clean` to `Modified`; other states are left alone.
    pub(crate) fn mark_modified(&mut self) {
        if self.state.is_clean() {
            self.state = ObjectState::Modified;
        }
    }

    pub(crate) fn set_single(
        &mut self,
        relation: &str,
        value: ChangeValue,
    ) -> TransactionResult<()> {
        match self.changes.get_mut(relation) {
            Some(Change::Single(change)) => change.set_value(value),
            Some(Change::Multiple(_)) => {
                return Err(TransactionError::RelationKindMismatch {
                    relation: relation.to_string(),
                    expected: "multi-valued",
                });
            }
            None => {
                self.changes.insert(
                    relation.to_string(),
                    Change::Single(SingleChange::new(relation, value)),
                );
            }
        }
        Ok(())
    }

    pub(crate) fn push_entry(
        &mut self,
        relation: &str,
        child: ObjectId,
        state: EntryState,
    ) -> TransactionResult<()> {
        let change = self
            .changes
            .entry(relation.to_string())
            .or_insert_with(|| Change::Multiple(MultipleChange::new(relation)));

        match change {
            Change::Multiple(multiple) => {
                multiple.push(child, state);
                Ok(())
            }
            Change::Single(_) => Err(TransactionError::RelationKindMismatch {
                relation: relation.to_string(),
                expected: "single-valued",
            }),
        }
    }

    pub(crate) fn rename_references(&mut self, old: &ObjectId, new: &ObjectId) {
        for change in self.changes.values_mut() {
            change.rename_references(old, new);
        }
    }
}

impl fmt::Display for TransactionDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} [{}] version={}",
            self.object_id,
            self.state,
            self.version.as_deref().unwrap_or("-")
        )?;
        for change in self.changes.values() {
            writeln!(f, "  {change}")?;
        }
        Ok(())
    }
}
