//! Caller-supplied accessors used to write recorded changes back into the
//! live objects.
//!
//! The engine never reflects over objects. For every entity that has changes
//! to apply, the caller registers a [`ReplayTable`] naming one closure per
//! relation.

use super::error::{TransactionError, TransactionResult};
use super::object::{ObjectRef, TransactedObject};
use crate::delta::ChangeValue;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Value handed to a setter.
pub enum ReplayValue {
    /// Scalar or id value exactly as recorded.
    Value(ChangeValue),
    /// Id-valued relation resolved to the live target; `None` if cleared or
    /// unresolvable.
    Object(Option<ObjectRef>),
}

impl ReplayValue {
    pub fn as_value(&self) -> Option<&ChangeValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Object(_) => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectRef> {
        match self {
            Self::Object(object) => object,
            Self::Value(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Value(ChangeValue::Text(text)) => Some(text),
            _ => None,
        }
    }
}

type Setter<T> = Box<dyn Fn(&mut T, ReplayValue)>;
type Linker<T> = Box<dyn Fn(&mut T, ObjectRef)>;

/// Per-type accessor table.
///
/// # Example
///
/// ```rust
/// use objtx::core::ObjectId;
/// use objtx::transaction::{ReplayRegistry, ReplayTable};
///
/// struct Kunde {
///     id: Option<ObjectId>,
///     version: Option<String>,
///     nachname: Option<String>,
/// }
/// objtx::transacted_object!(Kunde { id: id, version: version });
///
/// let registry = ReplayRegistry::new().with(
///     "kunde",
///     ReplayTable::<Kunde>::new()
///         .setter("nachname", |kunde, value| kunde.nachname = value.into_text()),
/// );
/// assert!(registry.contains("kunde"));
/// ```
pub struct ReplayTable<T> {
    setters: HashMap<String, Setter<T>>,
    adders: HashMap<String, Linker<T>>,
    removers: HashMap<String, Linker<T>>,
    _type: PhantomData<fn(&mut T)>,
}

impl<T: TransactedObject> Default for ReplayTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TransactedObject> ReplayTable<T> {
    pub fn new() -> Self {
        Self {
            setters: HashMap::new(),
            adders: HashMap::new(),
            removers: HashMap::new(),
            _type: PhantomData,
        }
    }

    /// Writer for a single-valued relation.
    pub fn setter(
        mut self,
        relation: impl Into<String>,
        setter: impl Fn(&mut T, ReplayValue) + 'static,
    ) -> Self {
        self.setters.insert(relation.into(), Box::new(setter));
        self
    }

    /// Handler for `Added` entries of a multi-valued relation.
    pub fn adder(
        mut self,
        relation: impl Into<String>,
        adder: impl Fn(&mut T, ObjectRef) + 'static,
    ) -> Self {
        self.adders.insert(relation.into(), Box::new(adder));
        self
    }

    /// Handler for `Removed` entries of a multi-valued relation.
    pub fn remover(
        mut self,
        relation: impl Into<String>,
        remover: impl Fn(&mut T, ObjectRef) + 'static,
    ) -> Self {
        self.removers.insert(relation.into(), Box::new(remover));
        self
    }

    fn downcast<'a>(&self, object: &'a mut dyn TransactedObject) -> Option<&'a mut T> {
        object.as_any_mut().downcast_mut::<T>()
    }
}

/// Which handler map a replay step needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerKind {
    Setter,
    Adder,
    Remover,
}

impl HandlerKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Setter => "setter",
            Self::Adder => "adder",
            Self::Remover => "remover",
        }
    }
}

/// Type-erased view of a [`ReplayTable`].
pub(crate) trait ErasedReplayTable {
    fn accepts(&self, object: &dyn TransactedObject) -> bool;

    fn has_handler(&self, kind: HandlerKind, relation: &str) -> bool;

    fn set(&self, object: &mut dyn TransactedObject, relation: &str, value: ReplayValue) -> bool;

    fn link(
        &self,
        kind: HandlerKind,
        object: &mut dyn TransactedObject,
        relation: &str,
        target: ObjectRef,
    ) -> bool;
}

impl<T: TransactedObject> ErasedReplayTable for ReplayTable<T> {
    fn accepts(&self, object: &dyn TransactedObject) -> bool {
        object.as_any().is::<T>()
    }

    fn has_handler(&self, kind: HandlerKind, relation: &str) -> bool {
        match kind {
            HandlerKind::Setter => self.setters.contains_key(relation),
            HandlerKind::Adder => self.adders.contains_key(relation),
            HandlerKind::Remover => self.removers.contains_key(relation),
        }
    }

    fn set(&self, object: &mut dyn TransactedObject, relation: &str, value: ReplayValue) -> bool {
        match (self.setters.get(relation), self.downcast(object)) {
            (Some(setter), Some(object)) => {
                setter(object, value);
                true
            }
            _ => false,
        }
    }

    fn link(
        &self,
        kind: HandlerKind,
        object: &mut dyn TransactedObject,
        relation: &str,
        target: ObjectRef,
    ) -> bool {
        let handlers = match kind {
            HandlerKind::Setter => return false,
            HandlerKind::Adder => &self.adders,
            HandlerKind::Remover => &self.removers,
        };
        match (handlers.get(relation), self.downcast(object)) {
            (Some(handler), Some(object)) => {
                handler(object, target);
                true
            }
            _ => false,
        }
    }
}

/// Replay tables keyed by entity tag.
#[derive(Default)]
pub struct ReplayRegistry {
    tables: HashMap<String, Box<dyn ErasedReplayTable>>,
}

impl ReplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<T: TransactedObject>(mut self, entity: impl Into<String>, table: ReplayTable<T>) -> Self {
        self.register(entity, table);
        self
    }

    pub fn register<T: TransactedObject>(&mut self, entity: impl Into<String>, table: ReplayTable<T>) {
        self.tables.insert(entity.into(), Box::new(table));
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.tables.contains_key(entity)
    }

    /// Table for `entity` that accepts `object` and has the requested
    /// handler for `relation`.
    pub(crate) fn handler_for(
        &self,
        entity: &str,
        object: &ObjectRef,
        kind: HandlerKind,
        relation: &str,
    ) -> TransactionResult<&dyn ErasedReplayTable> {
        let missing = || TransactionError::MissingReplayHandler {
            entity: entity.to_string(),
            relation: relation.to_string(),
            kind: kind.label(),
        };
        let table = self.tables.get(entity).ok_or_else(missing)?;
        if !table.accepts(&*object.borrow()) {
            return Err(TransactionError::ReplayTypeMismatch {
                entity: entity.to_string(),
            });
        }
        if !table.has_handler(kind, relation) {
            return Err(missing());
        }
        Ok(table.as_ref())
    }
}
