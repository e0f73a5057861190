//! Scoped change tracking for identity-bearing objects.
//!
//! An [`ObjectTransaction`] records what happens to registered objects
//! (creation, deletion, property writes, relation edits) as
//! [`TransactionDelta`](crate::delta::TransactionDelta) values instead of
//! touching the objects. Scopes nest: a sub-transaction sees everything its
//! ancestors recorded, keeps its own writes private, and on
//! [`commit`](ObjectTransaction::commit) folds them into the parent using
//! [`StateMachine::merge_states`](crate::core::StateMachine::merge_states).
//!
//! A root transaction can export its deltas as a
//! [`TransactionExtract`](crate::delta::TransactionExtract), import one from
//! elsewhere, or write everything back into the live objects with
//! [`commit_to_objects`](ObjectTransaction::commit_to_objects).

mod commit;
mod config;
mod context;
mod engine;
mod error;
mod exchange;
mod object;
mod replay;

pub use config::TransactionConfig;
pub use context::TransactionContext;
pub use engine::{Lookup, ObjectTransaction};
pub use error::{ErrorKind, TransactionError, TransactionResult};
pub use object::{object_ref, ObjectRef, TransactedObject};
pub use replay::{ReplayRegistry, ReplayTable, ReplayValue};
