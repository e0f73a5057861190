//! Lifecycle states and actions for objects taking part in a transaction.
//!
//! Two state families exist: the lifecycle of a whole object within one scope
//! ([`ObjectState`]) and the direction of a single entry in a multi-valued
//! relation ([`EntryState`]). Keeping them apart means no function ever has to
//! reject an entry state where an object state was expected.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Common naming surface for the state enums.
///
/// All methods are pure. States are immutable values that describe where an
/// object (or a relation entry) stands relative to the last clean baseline.
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }
}

/// Lifecycle state of one object within one transaction scope.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ObjectState {
    /// No net change against the baseline.
    Clean,
    /// Introduced in this scope.
    Created,
    /// Existing object with recorded changes.
    Modified,
    /// Existing object marked for deletion.
    Deleted,
    /// Created and deleted without ever being persisted.
    Vanished,
}

impl ObjectState {
    /// True for [`ObjectState::Clean`].
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Vanished objects are treated as nonexistent and never leave the engine.
    pub fn is_exportable(&self) -> bool {
        !matches!(self, Self::Vanished)
    }
}

impl State for ObjectState {
    fn name(&self) -> &str {
        match self {
            Self::Clean => "CLEAN",
            Self::Created => "CREATED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Vanished => "VANISHED",
        }
    }

    fn is_final(&self) -> bool {
        matches!(self, Self::Vanished)
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of one entry in a multi-valued relation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum EntryState {
    Added,
    Removed,
}

impl State for EntryState {
    fn name(&self) -> &str {
        match self {
            Self::Added => "ADDED",
            Self::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Input to the state machine. Modification is implicit in the reference
/// operations and has no action of its own.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Action {
    New,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("NEW"),
            Self::Delete => f.write_str("DELETE"),
        }
    }
}
