//! Structured diffs recorded by a transaction.
//!
//! A [`TransactionDelta`] holds everything one scope knows about one object:
//! its lifecycle state, the version it had when first touched, and a change
//! record per relation name. A [`TransactionExtract`] is an ordered bundle of
//! deltas meant to leave the engine.

mod change;
mod delta;
mod extract;

pub use change::{
    is_system_relation, Change, ChangeValue, MultipleChange, MultipleChangeEntry, SingleChange,
    SYSTEM_PREFIX, SYS_OBJECT_ID, SYS_OLD_OBJECT_ID, SYS_VERSION,
};
pub use delta::TransactionDelta;
pub use extract::TransactionExtract;
