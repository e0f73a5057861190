//! Ambient "current transaction" slot.
//!
//! The engine never looks anything up globally. A [`TransactionContext`] is
//! an explicit handle the application passes around; transactions built
//! from it swap themselves in and out as sub-transactions are created,
//! committed and rolled back.

use super::engine::ObjectTransaction;
use super::config::TransactionConfig;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Shared get/set slot holding the active transaction.
#[derive(Clone, Default)]
pub struct TransactionContext {
    current: Rc<RefCell<Option<ObjectTransaction>>>,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root transaction bound to this context and make it current.
    pub fn begin(&self) -> ObjectTransaction {
        self.begin_with_config(TransactionConfig::default())
    }

    pub fn begin_with_config(&self, config: TransactionConfig) -> ObjectTransaction {
        let tx = ObjectTransaction::root(config, Some(self.slot()));
        self.set_current(Some(tx.clone()));
        tx
    }

    /// The active transaction, if any.
    pub fn current(&self) -> Option<ObjectTransaction> {
        self.current.borrow().clone()
    }

    pub fn set_current(&self, tx: Option<ObjectTransaction>) {
        *self.current.borrow_mut() = tx;
    }

    pub(crate) fn slot(&self) -> ContextSlot {
        ContextSlot {
            current: Rc::downgrade(&self.current),
        }
    }
}

/// Non-owning back reference from a transaction to its context.
#[derive(Clone)]
pub(crate) struct ContextSlot {
    current: Weak<RefCell<Option<ObjectTransaction>>>,
}

impl ContextSlot {
    pub(crate) fn install(&self, tx: &ObjectTransaction) {
        if let Some(current) = self.current.upgrade() {
            *current.borrow_mut() = Some(tx.clone());
        }
    }
}
