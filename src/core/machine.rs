//! Pure lifecycle rules for objects in a transaction.
//!
//! The three functions here are total over the finite state set: every
//! combination has an answer, so callers never handle an error case.

use super::state::{Action, ObjectState};

/// Transition rules for [`ObjectState`].
///
/// # Example
///
/// ```rust
/// use objtx::core::{Action, ObjectState, StateMachine};
///
/// let created = StateMachine::init_action(Action::New);
/// assert_eq!(created, ObjectState::Created);
///
/// let gone = StateMachine::process_action(created, Action::Delete);
/// assert_eq!(gone, ObjectState::Vanished);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StateMachine;

impl StateMachine {
    /// State an object starts in when `action` is the first thing that ever
    /// happens to it in a scope.
    pub fn init_action(action: Action) -> ObjectState {
        match action {
            Action::New => ObjectState::Created,
            Action::Delete => ObjectState::Deleted,
        }
    }

    /// Next state after applying `action` to an object currently in `current`.
    pub fn process_action(current: ObjectState, action: Action) -> ObjectState {
        use ObjectState::*;

        match (current, action) {
            (Clean, Action::New) => Created,
            (Created, Action::New) => Created,
            (Modified, Action::New) => Modified,
            // deleted and re-created in the same scope: the stored row survives
            (Deleted, Action::New) => Modified,
            (Vanished, Action::New) => Created,

            (Clean, Action::Delete) => Deleted,
            (Modified, Action::Delete) => Deleted,
            (Deleted, Action::Delete) => Deleted,
            (Created, Action::Delete) => Vanished,
            (Vanished, Action::Delete) => Vanished,
        }
    }

    /// State the parent scope adopts after absorbing a child scope's delta.
    ///
    /// `parent` is the parent's state before the child's changes were replayed
    /// into it.
    pub fn merge_states(parent: ObjectState, child: ObjectState) -> ObjectState {
        use ObjectState::*;

        match (parent, child) {
            (parent, Clean) => parent,

            (Clean, Modified) => Modified,
            (parent, Modified) => parent,

            (Clean, Created) => Created,
            (Vanished, Created) => Created,
            (Created, Created) => Created,
            (Modified, Created) => Modified,
            (Deleted, Created) => Modified,

            (Created, Deleted) => Vanished,
            (_, Deleted) => Deleted,

            (Clean, Vanished) => Vanished,
            (Created, Vanished) => Vanished,
            (Vanished, Vanished) => Vanished,
            (Modified, Vanished) => Deleted,
            (Deleted, Vanished) => Deleted,
        }
    }
}
