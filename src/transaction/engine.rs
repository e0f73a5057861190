//! The object transaction: registry of involved objects plus their deltas,
//! optionally stacked on a parent scope.
//!
//! Reads resolve through the parent chain without touching the child.
//! Writes stay local until [`ObjectTransaction::commit`] folds them into the
//! parent.

use super::config::TransactionConfig;
use super::context::ContextSlot;
use super::error::{TransactionError, TransactionResult};
use super::object::{id_of, version_of, ObjectRef};
use crate::core::{Action, EntryState, ObjectId, ObjectState, StateMachine};
use crate::delta::{
    ChangeValue, MultipleChangeEntry, TransactionDelta, SYS_OBJECT_ID, SYS_OLD_OBJECT_ID,
    SYS_VERSION,
};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace, warn};

/// Where a value was found while resolving through the scope chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Recorded in the queried scope itself.
    Local(T),
    /// Recorded in some ancestor scope.
    Inherited(T),
    /// Not recorded anywhere in the chain.
    Missing,
}

impl<T> Lookup<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Local(value) | Self::Inherited(value) => Some(value),
            Self::Missing => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    fn inherited(self) -> Self {
        match self {
            Self::Local(value) => Self::Inherited(value),
            other => other,
        }
    }
}

pub(super) struct Scope {
    pub(super) parent: Option<ObjectTransaction>,
    pub(super) changes: BTreeMap<ObjectId, TransactionDelta>,
    pub(super) involved: HashMap<ObjectId, ObjectRef>,
    /// Registered before they had an id.
    pub(super) pre_registered: Vec<ObjectRef>,
    pub(super) config: TransactionConfig,
    pub(super) invalid: bool,
    /// The attached sub-transaction, if any. A dropped child no longer counts.
    pub(super) open_child: Option<Weak<RefCell<Scope>>>,
    /// Uncommitted renames: local id to the id the parent still knows.
    pub(super) renamed: BTreeMap<ObjectId, ObjectId>,
    /// Non-root only: counted as the parent's open child.
    pub(super) attached: bool,
    pub(super) context: Option<ContextSlot>,
}

impl Scope {
    fn new(
        parent: Option<ObjectTransaction>,
        config: TransactionConfig,
        context: Option<ContextSlot>,
    ) -> Self {
        Self {
            attached: parent.is_some(),
            parent,
            changes: BTreeMap::new(),
            involved: HashMap::new(),
            pre_registered: Vec::new(),
            config,
            invalid: false,
            open_child: None,
            renamed: BTreeMap::new(),
            context,
        }
    }
}

/// Scoped, nestable change tracker for identity-bearing objects.
///
/// `ObjectTransaction` is a cheap handle; clones refer to the same scope.
/// It is single-threaded by construction.
///
/// # Example
///
/// ```rust
/// use objtx::core::{ObjectId, ObjectState};
/// use objtx::delta::ChangeValue;
/// use objtx::transaction::{object_ref, ObjectTransaction};
///
/// struct Kunde {
///     id: Option<ObjectId>,
///     version: Option<String>,
/// }
/// objtx::transacted_object!(Kunde { id: id, version: version });
///
/// let tx = ObjectTransaction::new();
/// let kunde = object_ref(Kunde {
///     id: Some(ObjectId::new("kunde", "kundennr", "42")),
///     version: Some("1".into()),
/// });
///
/// tx.register(&kunde).unwrap();
/// tx.set_reference(&kunde, "nachname", "Smith").unwrap();
///
/// assert_eq!(tx.object_state(&kunde).unwrap(), Some(ObjectState::Modified));
/// assert_eq!(
///     tx.get_reference(&kunde, "nachname", ChangeValue::Null).unwrap(),
///     ChangeValue::from("Smith")
/// );
/// ```
#[derive(Clone)]
pub struct ObjectTransaction {
    inner: Rc<RefCell<Scope>>,
}

impl Default for ObjectTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectTransaction {
    /// Root transaction with default modes and no ambient context.
    pub fn new() -> Self {
        Self::with_config(TransactionConfig::default())
    }

    pub fn with_config(config: TransactionConfig) -> Self {
        Self::root(config, None)
    }

    pub(crate) fn root(config: TransactionConfig, context: Option<ContextSlot>) -> Self {
        Self::from_scope(Scope::new(None, config, context))
    }

    fn from_scope(scope: Scope) -> Self {
        Self {
            inner: Rc::new(RefCell::new(scope)),
        }
    }

    pub(super) fn scope(&self) -> Ref<'_, Scope> {
        self.inner.borrow()
    }

    pub(super) fn scope_mut(&self) -> RefMut<'_, Scope> {
        self.inner.borrow_mut()
    }

    pub(super) fn parent(&self) -> Option<ObjectTransaction> {
        self.scope().parent.clone()
    }

    /// True if both handles refer to the same scope.
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_root(&self) -> bool {
        self.scope().parent.is_none()
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        self.parent().map_or(0, |parent| parent.depth() + 1)
    }

    pub fn is_invalid(&self) -> bool {
        self.scope().invalid
    }

    /// Put the transaction into its terminal state. Every later operation
    /// fails with [`TransactionError::Invalidated`].
    pub fn invalidate(&self) {
        self.scope_mut().invalid = true;
    }

    pub fn has_open_sub_transaction(&self) -> bool {
        self.scope()
            .open_child
            .as_ref()
            .is_some_and(|child| child.strong_count() > 0)
    }

    /// Open a nested scope on top of this one and make it current in the
    /// ambient context, if there is one.
    pub fn create_sub_transaction(&self) -> TransactionResult<ObjectTransaction> {
        self.check_mutable("create a sub-transaction")?;
        self.flush_pending();

        let (config, context) = {
            let scope = self.scope();
            (scope.config.for_child(), scope.context.clone())
        };
        let child = Self::from_scope(Scope::new(Some(self.clone()), config, context.clone()));
        self.scope_mut().open_child = Some(Rc::downgrade(&child.inner));
        if let Some(context) = context {
            context.install(&child);
        }

        debug!(depth = child.depth(), "created sub-transaction");
        Ok(child)
    }

    // ==================== Registration ====================

    /// Record `object` as participating, in state `Clean`.
    ///
    /// Objects without an id are queued until they get one; this is only
    /// allowed in clean modus.
    pub fn register(&self, object: &ObjectRef) -> TransactionResult<()> {
        self.check_mutable("register an object")?;
        if !self.scope().config.allow_register {
            return Ok(());
        }
        self.flush_pending();

        match id_of(object) {
            None => {
                let mut scope = self.scope_mut();
                if !scope.config.clean_modus {
                    return Err(TransactionError::precondition(
                        "objects without an object id can only be registered in clean modus",
                    ));
                }
                scope.pre_registered.push(Rc::clone(object));
                Ok(())
            }
            Some(id) => {
                if self.registered(&id) {
                    return Err(TransactionError::AlreadyRegistered(id));
                }
                self.keep_reference(object);
                self.set_state(&id, version_of(object), ObjectState::Clean);
                Ok(())
            }
        }
    }

    /// Record `object` as newly created.
    pub fn register_new(&self, object: &ObjectRef) -> TransactionResult<()> {
        self.check_mutable("register a new object")?;
        if !self.scope().config.allow_register {
            return Ok(());
        }
        let id = require_id(object, "object")?;
        self.flush_pending();
        if self.registered(&id) {
            return Err(TransactionError::AlreadyRegistered(id));
        }
        self.notify(object, id, Action::New);
        Ok(())
    }

    /// Record `object` as deleted.
    pub fn register_as_deleted(&self, object: &ObjectRef) -> TransactionResult<()> {
        self.check_mutable("register a deleted object")?;
        if !self.scope().config.allow_register {
            return Ok(());
        }
        let id = require_id(object, "object")?;
        self.flush_pending();
        self.notify(object, id, Action::Delete);
        Ok(())
    }

    /// Switch all `register*` calls on or off.
    pub fn allow_register(&self, allow: bool) {
        self.scope_mut().config.allow_register = allow;
    }

    pub fn is_register_allowed(&self) -> bool {
        self.scope().config.allow_register
    }

    fn notify(&self, object: &ObjectRef, id: ObjectId, action: Action) {
        self.keep_reference(object);
        if self.scope().config.clean_modus {
            return;
        }
        let version = version_of(object);
        self.scope_mut()
            .changes
            .entry(id.clone())
            .and_modify(|delta| {
                let next = StateMachine::process_action(delta.state(), action);
                delta.set_state(next);
            })
            .or_insert_with(|| {
                TransactionDelta::new(id, StateMachine::init_action(action), version)
            });
    }

    // ==================== References ====================

    /// Write a scalar property or an id-valued single relation.
    pub fn set_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
        value: impl Into<ChangeValue>,
    ) -> TransactionResult<()> {
        let Some(id) = self.prepare_write(object, "set a reference")? else {
            return Ok(());
        };
        self.keep_reference(object);
        self.record_single(&id, version_of(object), relation, value.into())
    }

    /// Read a scalar property or single relation, falling back to the parent
    /// chain and then to `default`.
    pub fn get_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
        default: impl Into<ChangeValue>,
    ) -> TransactionResult<ChangeValue> {
        let default = default.into();
        let Some(id) = self.prepare_read(object)? else {
            return Ok(default);
        };
        Ok(self.lookup_single(&id, relation).into_option().unwrap_or(default))
    }

    /// Like [`get_reference`](Self::get_reference) but reports which scope
    /// the value came from.
    pub fn lookup_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
    ) -> TransactionResult<Lookup<ChangeValue>> {
        match self.prepare_read(object)? {
            Some(id) => Ok(self.lookup_single(&id, relation)),
            None => Ok(Lookup::Missing),
        }
    }

    /// Point a single-valued relation at another registered object, or clear
    /// it with `None`.
    pub fn set_object_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
        target: Option<&ObjectRef>,
    ) -> TransactionResult<()> {
        let Some(id) = self.prepare_write(object, "set a reference")? else {
            return Ok(());
        };
        let value = match target {
            None => ChangeValue::Null,
            Some(target) => {
                let target_id = require_id(target, "reference target")?;
                if !self.registered(&target_id) {
                    return Err(TransactionError::NotRegistered(target_id));
                }
                self.keep_reference(target);
                ChangeValue::Object(target_id)
            }
        };
        self.keep_reference(object);
        self.record_single(&id, version_of(object), relation, value)
    }

    /// Resolve a single-valued relation to the live target instance.
    pub fn get_object_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
        default: Option<ObjectRef>,
    ) -> TransactionResult<Option<ObjectRef>> {
        let Some(id) = self.prepare_read(object)? else {
            return Ok(default);
        };
        match self.lookup_single(&id, relation).into_option() {
            None => Ok(default),
            Some(ChangeValue::Null) => Ok(None),
            Some(ChangeValue::Object(target)) => Ok(self.resolve_object(&target)),
            Some(other) => Err(TransactionError::precondition(format!(
                "relation '{relation}' of {id} holds the scalar {other}, not an object"
            ))),
        }
    }

    /// Append an `Added` entry to a multi-valued relation.
    pub fn add_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
        target: &ObjectRef,
    ) -> TransactionResult<()> {
        self.record_link(object, relation, target, EntryState::Added)
    }

    /// Append a `Removed` entry to a multi-valued relation.
    pub fn remove_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
        target: &ObjectRef,
    ) -> TransactionResult<()> {
        self.record_link(object, relation, target, EntryState::Removed)
    }

    fn record_link(
        &self,
        object: &ObjectRef,
        relation: &str,
        target: &ObjectRef,
        state: EntryState,
    ) -> TransactionResult<()> {
        let Some(id) = self.prepare_write(object, "change a multi-valued reference")? else {
            return Ok(());
        };
        let target_id = require_id(target, "reference target")?;
        if !self.registered(&target_id) {
            return Err(TransactionError::NotRegistered(target_id));
        }
        self.keep_reference(object);
        self.keep_reference(target);
        self.record_entry(&id, version_of(object), relation, target_id, state)
    }

    /// Replay the add/remove log of a multi-valued relation onto `seed`,
    /// ancestors first. The result has set semantics: no object twice.
    pub fn list_reference(
        &self,
        object: &ObjectRef,
        relation: &str,
        seed: Vec<ObjectRef>,
    ) -> TransactionResult<Vec<ObjectRef>> {
        self.replay_links(object, relation, seed, true)
    }

    /// Same replay as [`list_reference`](Self::list_reference) with list
    /// semantics: repeated adds produce repeated elements and a remove drops
    /// the first occurrence.
    pub fn list_reference_with_duplicates(
        &self,
        object: &ObjectRef,
        relation: &str,
        seed: Vec<ObjectRef>,
    ) -> TransactionResult<Vec<ObjectRef>> {
        self.replay_links(object, relation, seed, false)
    }

    fn replay_links(
        &self,
        object: &ObjectRef,
        relation: &str,
        seed: Vec<ObjectRef>,
        unique: bool,
    ) -> TransactionResult<Vec<ObjectRef>> {
        let Some(id) = self.prepare_read(object)? else {
            return Ok(seed);
        };

        let mut result: Vec<ObjectRef> = Vec::with_capacity(seed.len());
        for item in seed {
            if !unique || !result.iter().any(|existing| same_object(existing, &item)) {
                result.push(item);
            }
        }

        for entry in self.link_entries(&id, relation) {
            let position = result
                .iter()
                .position(|o| id_of(o).as_ref() == Some(entry.child()));
            match entry.state() {
                EntryState::Added => {
                    if unique && position.is_some() {
                        continue;
                    }
                    match self.resolve_object(entry.child()) {
                        Some(child) => result.push(child),
                        None => trace!(child = %entry.child(), relation, "skipping unresolved entry"),
                    }
                }
                EntryState::Removed => {
                    if let Some(position) = position {
                        result.remove(position);
                    }
                }
            }
        }
        Ok(result)
    }

    fn link_entries(&self, id: &ObjectId, relation: &str) -> Vec<MultipleChangeEntry> {
        let inherited = (self.parent(), self.id_in_parent(id));
        let mut entries: Vec<MultipleChangeEntry> = match inherited {
            (Some(parent), Some(parent_id)) => parent
                .link_entries(&parent_id, relation)
                .into_iter()
                .map(|entry| {
                    MultipleChangeEntry::new(self.id_from_parent(entry.child()), entry.state())
                })
                .collect(),
            _ => Vec::new(),
        };
        let scope = self.scope();
        if let Some(change) = scope.changes.get(id).and_then(|d| d.multiple(relation)) {
            entries.extend(change.entries().iter().cloned());
        }
        entries
    }

    // ==================== Versions and ids ====================

    /// Record a new version on the system channel and hand it to the object
    /// right away.
    pub fn set_version_update(
        &self,
        object: &ObjectRef,
        version: impl Into<String>,
    ) -> TransactionResult<()> {
        self.check_valid()?;
        require_id(object, "object")?;
        if self.scope().config.clean_modus {
            return Err(TransactionError::precondition(
                "version updates are not allowed in clean modus",
            ));
        }
        let version = version.into();
        self.set_reference(object, SYS_VERSION, ChangeValue::Text(version.clone()))?;
        object.borrow_mut().set_version(version);
        Ok(())
    }

    /// Rename `old` to `new` in the object, in this scope's maps and in every
    /// relation value recorded here; then record the rename on the system
    /// channel of the object's delta.
    ///
    /// Ancestors keep the old id until this scope commits. Rolling back
    /// gives the object its old id again.
    pub fn set_object_id_update(&self, old: &ObjectId, new: &ObjectId) -> TransactionResult<()> {
        if old == new {
            return Err(TransactionError::precondition(
                "old and new object id must differ",
            ));
        }
        self.check_mutable("change an object id")?;
        self.flush_pending();
        self.change_object_id(old, new)
    }

    pub(super) fn change_object_id(&self, old: &ObjectId, new: &ObjectId) -> TransactionResult<()> {
        let object = self
            .resolve_object(old)
            .ok_or_else(|| TransactionError::NotRegistered(old.clone()))?;
        if self.registered(new) {
            return Err(TransactionError::AlreadyRegistered(new.clone()));
        }

        object.borrow_mut().set_object_id(new.clone());
        self.rename_local(old, new, &object);

        let version = version_of(&object);
        self.record_single(
            new,
            version.clone(),
            SYS_OBJECT_ID,
            ChangeValue::Object(new.clone()),
        )?;
        self.record_single(new, version, SYS_OLD_OBJECT_ID, ChangeValue::Object(old.clone()))?;

        debug!(%old, %new, "object id changed");
        Ok(())
    }

    pub(super) fn rename_local(&self, old: &ObjectId, new: &ObjectId, object: &ObjectRef) {
        let origin = match self.parent() {
            Some(parent) => self
                .id_in_parent(old)
                .filter(|origin| parent.registered(origin)),
            None => None,
        };

        let mut scope = self.scope_mut();
        scope.involved.remove(old);
        scope.involved.insert(new.clone(), Rc::clone(object));
        if let Some(mut delta) = scope.changes.remove(old) {
            delta.set_object_id(new.clone());
            scope.changes.insert(new.clone(), delta);
        }
        for delta in scope.changes.values_mut() {
            delta.rename_references(old, new);
        }
        scope.renamed.remove(old);
        if let Some(origin) = origin.filter(|origin| origin != new) {
            scope.renamed.insert(new.clone(), origin);
        }
    }

    /// `id` as the parent knows it, or `None` if this scope renamed it away.
    fn id_in_parent(&self, id: &ObjectId) -> Option<ObjectId> {
        let scope = self.scope();
        if let Some(origin) = scope.renamed.get(id) {
            return Some(origin.clone());
        }
        if scope.renamed.values().any(|origin| origin == id) {
            None
        } else {
            Some(id.clone())
        }
    }

    fn id_from_parent(&self, id: &ObjectId) -> ObjectId {
        self.scope()
            .renamed
            .iter()
            .find(|(_, origin)| *origin == id)
            .map_or_else(|| id.clone(), |(local, _)| local.clone())
    }

    // ==================== Queries ====================

    /// True if a delta for the object exists here or in any ancestor.
    pub fn is_registered(&self, object: &ObjectRef) -> TransactionResult<bool> {
        self.check_valid()?;
        let id = require_id(object, "object")?;
        self.flush_pending();
        Ok(self.registered(&id))
    }

    pub fn is_registered_id(&self, id: &ObjectId) -> TransactionResult<bool> {
        self.check_valid()?;
        self.flush_pending();
        Ok(self.registered(id))
    }

    /// Live instance registered under `id`, here or in an ancestor.
    pub fn lookup_object_by_id(&self, id: &ObjectId) -> TransactionResult<Option<ObjectRef>> {
        self.check_valid()?;
        self.flush_pending();
        let found = self.resolve_object(id);
        if found.is_none() && self.scope().config.strict_modus {
            return Err(TransactionError::NotRegistered(id.clone()));
        }
        Ok(found)
    }

    /// Lifecycle state of the object as seen from this scope.
    pub fn object_state(&self, object: &ObjectRef) -> TransactionResult<Option<ObjectState>> {
        self.check_valid()?;
        let id = require_id(object, "object")?;
        self.flush_pending();
        Ok(self.state_of(&id))
    }

    /// Copy of this scope's own delta for `id`.
    pub fn delta(&self, id: &ObjectId) -> Option<TransactionDelta> {
        self.scope().changes.get(id).cloned()
    }

    /// Number of deltas held by this scope itself.
    pub fn delta_count(&self) -> usize {
        self.scope().changes.len()
    }

    /// Objects still waiting for an id.
    pub fn pending_count(&self) -> usize {
        self.scope().pre_registered.len()
    }

    /// Swap the instance registered under `id` in this scope and every
    /// ancestor scope.
    pub fn replace_registered_object(
        &self,
        id: &ObjectId,
        object: &ObjectRef,
    ) -> TransactionResult<()> {
        self.check_valid()?;
        if id_of(object).as_ref() != Some(id) {
            return Err(TransactionError::precondition(format!(
                "replacement object must carry the object id {id}"
            )));
        }
        self.replace_in_chain(id, object)
    }

    fn replace_in_chain(&self, id: &ObjectId, object: &ObjectRef) -> TransactionResult<()> {
        let parent = {
            let mut scope = self.scope_mut();
            if let Some(existing) = scope.involved.get_mut(id) {
                if Rc::ptr_eq(existing, object) {
                    return Err(TransactionError::precondition(
                        "replacement object is the instance already registered",
                    ));
                }
                *existing = Rc::clone(object);
            }
            scope.parent.clone()
        };
        match (parent, self.id_in_parent(id)) {
            (Some(parent), Some(parent_id)) => parent.replace_in_chain(&parent_id, object),
            _ => Ok(()),
        }
    }

    // ==================== Modes ====================

    /// Switch change recording off (`true`) or back on (`false`).
    ///
    /// Switching it off while objects without an id are still queued drops
    /// them; they are returned to the caller.
    pub fn set_clean_modus(&self, clean: bool) -> TransactionResult<Vec<ObjectRef>> {
        self.check_valid()?;
        self.flush_pending();

        let discarded = {
            let mut scope = self.scope_mut();
            scope.config.clean_modus = clean;
            if clean {
                Vec::new()
            } else {
                std::mem::take(&mut scope.pre_registered)
            }
        };

        if !discarded.is_empty() {
            warn!(
                count = discarded.len(),
                "clean modus switched off; pre-registered objects without object id are no longer registered"
            );
            for object in &discarded {
                info!(version = ?version_of(object), "removing pre-registered object");
            }
        }
        Ok(discarded)
    }

    pub fn is_clean_modus(&self) -> TransactionResult<bool> {
        self.check_valid()?;
        Ok(self.scope().config.clean_modus)
    }

    pub fn set_strict_modus(&self, strict: bool) {
        self.flush_pending();
        self.scope_mut().config.strict_modus = strict;
    }

    pub fn is_strict_modus(&self) -> bool {
        self.scope().config.strict_modus
    }

    // ==================== Internals ====================

    pub(super) fn check_valid(&self) -> TransactionResult<()> {
        if self.scope().invalid {
            Err(TransactionError::Invalidated)
        } else {
            Ok(())
        }
    }

    /// Valid, no open child, and (for a finished sub-transaction) attached
    /// to its parent again.
    pub(super) fn check_mutable(&self, operation: &'static str) -> TransactionResult<()> {
        self.check_valid()?;
        if self.has_open_sub_transaction() {
            return Err(TransactionError::OpenSubTransaction { operation });
        }
        let (attached, parent) = {
            let scope = self.scope();
            (scope.attached, scope.parent.clone())
        };
        if let Some(parent) = parent {
            if !attached {
                if parent.has_open_sub_transaction() {
                    return Err(TransactionError::OpenSubTransaction {
                        operation: "re-open a finished sub-transaction",
                    });
                }
                parent.scope_mut().open_child = Some(Rc::downgrade(&self.inner));
                self.scope_mut().attached = true;
                trace!("finished sub-transaction re-attached to its parent");
            }
        }
        Ok(())
    }

    /// Move queued objects that have received an id into the delta map.
    pub(super) fn flush_pending(&self) {
        if let Some(parent) = self.parent() {
            parent.flush_pending();
        }
        let mut scope = self.scope_mut();
        if scope.pre_registered.is_empty() {
            return;
        }
        for object in std::mem::take(&mut scope.pre_registered) {
            match id_of(&object) {
                Some(id) => {
                    let version = version_of(&object);
                    scope
                        .changes
                        .entry(id.clone())
                        .or_insert_with(|| TransactionDelta::new(id.clone(), ObjectState::Clean, version));
                    scope.involved.insert(id, object);
                }
                None => scope.pre_registered.push(object),
            }
        }
    }

    fn prepare_write(
        &self,
        object: &ObjectRef,
        operation: &'static str,
    ) -> TransactionResult<Option<ObjectId>> {
        self.check_mutable(operation)?;
        let id = require_id(object, "object")?;
        self.flush_pending();
        if self.scope().config.clean_modus {
            return Ok(None);
        }
        if !self.registered(&id) {
            return Err(TransactionError::NotRegistered(id));
        }
        Ok(Some(id))
    }

    fn prepare_read(&self, object: &ObjectRef) -> TransactionResult<Option<ObjectId>> {
        self.check_valid()?;
        let id = require_id(object, "object")?;
        self.flush_pending();
        let (clean, strict) = {
            let scope = self.scope();
            (scope.config.clean_modus, scope.config.strict_modus)
        };
        if clean {
            return Ok(None);
        }
        if !self.registered(&id) {
            if strict {
                return Err(TransactionError::NotRegistered(id));
            }
            return Ok(None);
        }
        Ok(Some(id))
    }

    pub(super) fn keep_reference(&self, object: &ObjectRef) {
        if let Some(id) = id_of(object) {
            self.scope_mut().involved.insert(id, Rc::clone(object));
        }
    }

    pub(super) fn resolve_delta<R, F>(&self, id: &ObjectId, f: &F) -> Lookup<R>
    where
        F: Fn(&TransactionDelta) -> Option<R>,
    {
        let parent = {
            let scope = self.scope();
            if let Some(found) = scope.changes.get(id).and_then(f) {
                return Lookup::Local(found);
            }
            scope.parent.clone()
        };
        match (parent, self.id_in_parent(id)) {
            (Some(parent), Some(parent_id)) => parent.resolve_delta(&parent_id, f).inherited(),
            _ => Lookup::Missing,
        }
    }

    pub(super) fn registered(&self, id: &ObjectId) -> bool {
        self.resolve_delta(id, &|_| Some(())).is_found()
    }

    pub(super) fn state_of(&self, id: &ObjectId) -> Option<ObjectState> {
        self.resolve_delta(id, &|delta| Some(delta.state()))
            .into_option()
    }

    fn lookup_single(&self, id: &ObjectId, relation: &str) -> Lookup<ChangeValue> {
        let parent = {
            let scope = self.scope();
            if let Some(value) = scope.changes.get(id).and_then(|d| d.single(relation)) {
                return Lookup::Local(value.clone());
            }
            scope.parent.clone()
        };
        let (Some(parent), Some(parent_id)) = (parent, self.id_in_parent(id)) else {
            return Lookup::Missing;
        };
        match parent.lookup_single(&parent_id, relation).into_option() {
            Some(ChangeValue::Object(target)) => {
                Lookup::Inherited(ChangeValue::Object(self.id_from_parent(&target)))
            }
            Some(value) => Lookup::Inherited(value),
            None => Lookup::Missing,
        }
    }

    pub(super) fn resolve_object(&self, id: &ObjectId) -> Option<ObjectRef> {
        let parent = {
            let scope = self.scope();
            if let Some(object) = scope.involved.get(id) {
                return Some(Rc::clone(object));
            }
            scope.parent.clone()
        };
        let parent_id = self.id_in_parent(id)?;
        parent.and_then(|parent| parent.resolve_object(&parent_id))
    }

    /// Set the local state, creating the delta if needed.
    pub(super) fn set_state(&self, id: &ObjectId, version: Option<String>, state: ObjectState) {
        self.scope_mut()
            .changes
            .entry(id.clone())
            .and_modify(|delta| delta.set_state(state))
            .or_insert_with(|| TransactionDelta::new(id.clone(), state, version));
    }

    pub(super) fn record_single(
        &self,
        id: &ObjectId,
        version: Option<String>,
        relation: &str,
        value: ChangeValue,
    ) -> TransactionResult<()> {
        let mut scope = self.scope_mut();
        let delta = scope
            .changes
            .entry(id.clone())
            .or_insert_with(|| TransactionDelta::new(id.clone(), ObjectState::Clean, version));
        delta.set_single(relation, value)?;
        delta.mark_modified();
        Ok(())
    }

    pub(super) fn record_entry(
        &self,
        id: &ObjectId,
        version: Option<String>,
        relation: &str,
        child: ObjectId,
        state: EntryState,
    ) -> TransactionResult<()> {
        let mut scope = self.scope_mut();
        let delta = scope
            .changes
            .entry(id.clone())
            .or_insert_with(|| TransactionDelta::new(id.clone(), ObjectState::Clean, version));
        delta.push_entry(relation, child, state)?;
        delta.mark_modified();
        Ok(())
    }
}

pub(super) fn require_id(object: &ObjectRef, role: &'static str) -> TransactionResult<ObjectId> {
    id_of(object).ok_or(TransactionError::MissingObjectId { role })
}

fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    if Rc::ptr_eq(a, b) {
        return true;
    }
    match (id_of(a), id_of(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl fmt::Debug for ObjectTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(scope) => f
                .debug_struct("ObjectTransaction")
                .field("root", &scope.parent.is_none())
                .field("deltas", &scope.changes.len())
                .field("involved", &scope.involved.len())
                .field("pending", &scope.pre_registered.len())
                .field("config", &scope.config)
                .field("invalid", &scope.invalid)
                .finish(),
            Err(_) => f.write_str("ObjectTransaction { <borrowed> }"),
        }
    }
}

impl fmt::Display for ObjectTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----------transaction----------------")?;
        match self.export_extract() {
            Ok(extract) => write!(f, "{extract}")?,
            Err(_) => writeln!(f, "Transaction is invalid and cannot be displayed.")?,
        }
        writeln!(f, "----------transaction----------------")
    }
}
