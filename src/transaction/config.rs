//! Mode switches a transaction starts with.

use serde::{Deserialize, Serialize};

/// Initial modes of a root transaction.
///
/// # Example
///
/// ```rust
/// use objtx::transaction::{ObjectTransaction, TransactionConfig};
///
/// let config = TransactionConfig::default().with_strict_modus(true);
/// let tx = ObjectTransaction::with_config(config);
/// assert!(tx.is_strict_modus());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Reads against unregistered objects fail instead of returning defaults.
    pub strict_modus: bool,
    /// Start with change recording switched off.
    pub clean_modus: bool,
    /// Whether `register*` calls take effect.
    pub allow_register: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            strict_modus: false,
            clean_modus: false,
            allow_register: true,
        }
    }
}

impl TransactionConfig {
    pub fn with_strict_modus(mut self, strict: bool) -> Self {
        self.strict_modus = strict;
        self
    }

    pub fn with_clean_modus(mut self, clean: bool) -> Self {
        self.clean_modus = clean;
        self
    }

    pub fn with_allow_register(mut self, allow: bool) -> Self {
        self.allow_register = allow;
        self
    }

    /// Config a sub-transaction starts with: same strictness and register
    /// switch, recording on.
    pub(crate) fn for_child(&self) -> Self {
        Self {
            clean_modus: false,
            ..*self
        }
    }
}
