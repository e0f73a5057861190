//! Transaction error types.

use crate::core::ObjectId;
use thiserror::Error;

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// The two error families an operation can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transaction refuses the operation in its current situation.
    /// Always surfaced, never recovered silently.
    InvalidTransaction,
    /// The caller broke a documented contract. A programmer error.
    Precondition,
}

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Transaction was explicitly invalidated.
    #[error("object transaction is invalid")]
    Invalidated,

    /// Operation only allowed on the root transaction.
    #[error("object transaction must be the root transaction to {operation}")]
    NotRoot { operation: &'static str },

    /// Operation not allowed on the root transaction.
    #[error("root transaction cannot {operation}")]
    RootTransaction { operation: &'static str },

    /// A sub-transaction of this one is still open.
    #[error("object transaction has an open sub-transaction; cannot {operation}")]
    OpenSubTransaction { operation: &'static str },

    /// Import attempted while changes are not being recorded.
    #[error("object transaction must not be in clean modus when importing")]
    CleanModusImport,

    /// Objects without an id are still waiting for one.
    #[error("{count} pre-registered object(s) still have no object id")]
    PendingUnidentified { count: usize },

    /// An imported delta names an object the transaction does not know.
    #[error("object ids of all imported deltas must be registered, not found: {0}")]
    UnknownObject(ObjectId),

    /// An imported relation points at an object the transaction does not know.
    #[error("reference target {target} of {owner}.{relation} must be registered before import")]
    UnregisteredTarget {
        owner: ObjectId,
        relation: String,
        target: ObjectId,
    },

    /// Object passed without an object id where one is required.
    #[error("object id of {role} must not be missing")]
    MissingObjectId { role: &'static str },

    /// Object must be registered for this operation.
    #[error("object {0} must be registered")]
    NotRegistered(ObjectId),

    /// Object registered a second time.
    #[error("object {0} cannot be registered a second time")]
    AlreadyRegistered(ObjectId),

    /// Relation used as both single- and multi-valued.
    #[error("relation '{relation}' is already recorded as {expected}")]
    RelationKindMismatch {
        relation: String,
        expected: &'static str,
    },

    /// Generic broken contract.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// No replay handler was supplied for a relation of an entity.
    #[error("no {kind} registered for relation '{relation}' of entity '{entity}'")]
    MissingReplayHandler {
        entity: String,
        relation: String,
        kind: &'static str,
    },

    /// Replay table type does not match the live object.
    #[error("replay table for entity '{entity}' does not match the registered object type")]
    ReplayTypeMismatch { entity: String },
}

impl TransactionError {
    /// Which family this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalidated
            | Self::NotRoot { .. }
            | Self::RootTransaction { .. }
            | Self::OpenSubTransaction { .. }
            | Self::CleanModusImport
            | Self::PendingUnidentified { .. }
            | Self::UnknownObject(_)
            | Self::UnregisteredTarget { .. } => ErrorKind::InvalidTransaction,
            Self::MissingObjectId { .. }
            | Self::NotRegistered(_)
            | Self::AlreadyRegistered(_)
            | Self::RelationKindMismatch { .. }
            | Self::Precondition(_)
            | Self::MissingReplayHandler { .. }
            | Self::ReplayTypeMismatch { .. } => ErrorKind::Precondition,
        }
    }

    pub fn is_invalid_transaction(&self) -> bool {
        self.kind() == ErrorKind::InvalidTransaction
    }

    pub fn is_precondition(&self) -> bool {
        self.kind() == ErrorKind::Precondition
    }

    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }
}
