//! Portable collection of deltas.

use super::delta::TransactionDelta;
use crate::core::{ObjectId, ObjectState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered sequence of [`TransactionDelta`] values exchanged between
/// transactions, possibly across a process boundary.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct TransactionExtract {
    deltas: Vec<TransactionDelta>,
}

impl TransactionExtract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deltas(&self) -> &[TransactionDelta] {
        &self.deltas
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransactionDelta> {
        self.deltas.iter()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Delta for `object_id`, if the extract carries one.
    pub fn get(&self, object_id: &ObjectId) -> Option<&TransactionDelta> {
        self.deltas.iter().find(|d| d.object_id() == object_id)
    }

    pub fn contains(&self, object_id: &ObjectId) -> bool {
        self.get(object_id).is_some()
    }

    pub fn add_delta(&mut self, delta: TransactionDelta) {
        self.deltas.push(delta);
    }

    /// Append an unchanged entry for an object that is only reachable as a
    /// relation target. Does nothing if the object is already present.
    pub fn add_clean_object(&mut self, object_id: ObjectId, version: Option<String>) {
        if !self.contains(&object_id) {
            self.deltas
                .push(TransactionDelta::new(object_id, ObjectState::Clean, version));
        }
    }
}

impl<'a> IntoIterator for &'a TransactionExtract {
    type Item = &'a TransactionDelta;
    type IntoIter = std::slice::Iter<'a, TransactionDelta>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.iter()
    }
}

impl IntoIterator for TransactionExtract {
    type Item = TransactionDelta;
    type IntoIter = std::vec::IntoIter<TransactionDelta>;

    fn into_iter(self) -> Self::IntoIter {
        self.deltas.into_iter()
    }
}

impl FromIterator<TransactionDelta> for TransactionExtract {
    fn from_iter<I: IntoIterator<Item = TransactionDelta>>(iter: I) -> Self {
        Self {
            deltas: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for TransactionExtract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for delta in &self.deltas {
            write!(f, "{delta}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_clean_object_skips_known_ids() {
        let id = ObjectId::new("kunde", "kundennr", "42");
        let mut extract = TransactionExtract::new();
        extract.add_delta(TransactionDelta::new(
            id.clone(),
            ObjectState::Modified,
            Some("1".into()),
        ));

        extract.add_clean_object(id.clone(), Some("1".into()));
        assert_eq!(extract.len(), 1);
        assert_eq!(extract.get(&id).map(|d| d.state()), Some(ObjectState::Modified));

        let other = ObjectId::new("adresse", "nr", "7");
        extract.add_clean_object(other.clone(), None);
        assert_eq!(extract.len(), 2);
        assert_eq!(extract.deltas()[1].state(), ObjectState::Clean);
        assert!(extract.contains(&other));
    }

    #[test]
    fn extract_keeps_insertion_order() {
        let ids: Vec<_> = (0..4)
            .map(|n| ObjectId::new("vertrag", "nr", n.to_string()))
            .collect();
        let extract: TransactionExtract = ids
            .iter()
            .map(|id| TransactionDelta::new(id.clone(), ObjectState::Created, None))
            .collect();

        let order: Vec<_> = extract.iter().map(|d| d.object_id().clone()).collect();
        assert_eq!(order, ids);
    }
}
