//! objtx: scoped change tracking for business objects
//!
//! objtx records what happens to a graph of identity-bearing objects as
//! structured deltas instead of mutating them. It follows a "pure core,
//! imperative shell" split: the lifecycle rules in [`core`] are pure
//! functions, and the [`transaction`] layer owns the mutable bookkeeping.
//!
//! # Core Concepts
//!
//! - **ObjectId**: value identity of an object, an entity tag plus key fields
//! - **ObjectState**: per-scope lifecycle (`Clean`, `Created`, `Modified`, `Deleted`, `Vanished`)
//! - **TransactionDelta**: everything one scope recorded about one object
//! - **ObjectTransaction**: nestable scope that records, merges, exports and imports deltas
//! - **ExtractEnvelope**: versioned JSON/binary wrapper for shipping extracts
//!
//! # Example
//!
//! ```rust
//! use objtx::core::{ObjectId, ObjectState};
//! use objtx::transaction::{object_ref, ObjectTransaction};
//!
//! struct Kunde {
//!     id: Option<ObjectId>,
//!     version: Option<String>,
//! }
//! objtx::transacted_object!(Kunde { id: id, version: version });
//!
//! let root = ObjectTransaction::new();
//! let kunde = object_ref(Kunde {
//!     id: Some(ObjectId::new("kunde", "kundennr", "99")),
//!     version: None,
//! });
//!
//! let child = root.create_sub_transaction().unwrap();
//! child.register_new(&kunde).unwrap();
//! child.set_reference(&kunde, "nachname", "Jones").unwrap();
//! child.commit().unwrap();
//!
//! assert_eq!(root.object_state(&kunde).unwrap(), Some(ObjectState::Created));
//! let extract = root.export_extract().unwrap();
//! assert_eq!(extract.len(), 1);
//! ```

pub mod core;
pub mod delta;
mod macros;
pub mod transaction;
pub mod wire;

// Re-export commonly used types
pub use crate::core::{ObjectId, ObjectState, StateMachine};
pub use crate::delta::{ChangeValue, TransactionDelta, TransactionExtract};
pub use crate::transaction::{
    object_ref, ObjectRef, ObjectTransaction, TransactedObject, TransactionError,
    TransactionResult,
};
pub use crate::wire::ExtractEnvelope;
