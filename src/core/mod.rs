//! Core identity and lifecycle types.
//!
//! This module contains the pure functional core of the engine:
//! - Object identity via [`ObjectId`]
//! - Lifecycle and entry states
//! - The [`StateMachine`] rules for actions and scope merges
//!
//! All logic in this module is pure (no side effects).

mod machine;
mod object_id;
mod state;

pub use machine::StateMachine;
pub use object_id::{ObjectId, ObjectKey};
pub use state::{Action, EntryState, ObjectState, State};
