//! Value identity for business objects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Key part of an [`ObjectId`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum ObjectKey {
    /// Named business key fields, e.g. `kundennr = "42"`.
    Fields(BTreeMap<String, String>),
    /// Generated surrogate key.
    Surrogate(Uuid),
}

/// Opaque identity of a business object, independent of any instance.
///
/// Equality and hashing are structural: two ids with the same entity tag and
/// the same key refer to the same object everywhere in a transaction chain.
///
/// # Example
///
/// ```rust
/// use objtx::core::ObjectId;
///
/// let a = ObjectId::new("kunde", "kundennr", "42");
/// let b = ObjectId::new("kunde", "kundennr", "42");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "kunde{kundennr=42}");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ObjectId {
    entity: String,
    key: ObjectKey,
}

impl ObjectId {
    /// Id made of an entity tag and a single key field.
    pub fn new(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), value.into());
        Self {
            entity: entity.into(),
            key: ObjectKey::Fields(fields),
        }
    }

    /// Id made of an entity tag and several key fields.
    pub fn with_fields<I, K, V>(entity: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entity: entity.into(),
            key: ObjectKey::Fields(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Fresh id with a random surrogate key.
    pub fn surrogate(entity: impl Into<String>) -> Self {
        Self::from_uuid(entity, Uuid::new_v4())
    }

    /// Id with a known surrogate key.
    pub fn from_uuid(entity: impl Into<String>, uuid: Uuid) -> Self {
        Self {
            entity: entity.into(),
            key: ObjectKey::Surrogate(uuid),
        }
    }

    /// Entity tag, e.g. `"kunde"`.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// Value of a named key field, if this id is field based.
    pub fn field(&self, name: &str) -> Option<&str> {
        match &self.key {
            ObjectKey::Fields(fields) => fields.get(name).map(String::as_str),
            ObjectKey::Surrogate(_) => None,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            ObjectKey::Fields(fields) => {
                let pairs = fields
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{}{{{}}}", self.entity, pairs)
            }
            ObjectKey::Surrogate(uuid) => write!(f, "{}#{}", self.entity, uuid),
        }
    }
}
