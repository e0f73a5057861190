//! Ending a scope: fold into the parent, discard, or write back into the
//! live objects.

use super::engine::ObjectTransaction;
use super::error::{TransactionError, TransactionResult};
use super::object::{version_of, ObjectRef};
use super::replay::{HandlerKind, ReplayRegistry, ReplayValue};
use crate::core::{EntryState, ObjectId, ObjectState, StateMachine};
use crate::delta::{is_system_relation, Change, ChangeValue, TransactionDelta};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

/// Maps of a parent scope before a commit touched them.
struct Snapshot {
    changes: BTreeMap<ObjectId, TransactionDelta>,
    involved: HashMap<ObjectId, ObjectRef>,
    renamed: BTreeMap<ObjectId, ObjectId>,
}

/// One write into a live object.
enum ReplayStep {
    Set {
        object: ObjectRef,
        entity: String,
        relation: String,
        value: ChangeValue,
    },
    Link {
        object: ObjectRef,
        entity: String,
        relation: String,
        target: ObjectId,
        kind: HandlerKind,
    },
}

impl ObjectTransaction {
    /// Fold this sub-transaction into its parent.
    ///
    /// Every change is replayed into the parent and each object's state is
    /// merged with the parent's. Afterwards this scope is empty, the parent
    /// becomes current again and this handle may be reused.
    ///
    /// If the replay fails the parent is restored and this scope stays open
    /// with its changes, ready for a rollback.
    pub fn commit(&self) -> TransactionResult<()> {
        self.check_valid()?;
        let parent = self.parent().ok_or(TransactionError::RootTransaction {
            operation: "commit",
        })?;
        self.check_mutable("commit")?;
        self.flush_pending();

        let (involved, deltas, renamed) = {
            let scope = self.scope();
            (
                scope.involved.clone(),
                scope.changes.values().cloned().collect::<Vec<_>>(),
                scope.renamed.clone(),
            )
        };

        let saved = parent.snapshot();
        if let Err(err) = parent.fold(&involved, &deltas, &renamed) {
            parent.restore(saved);
            warn!(error = %err, "commit failed; parent left unchanged");
            return Err(err);
        }

        self.finish(&parent);
        debug!(
            deltas = deltas.len(),
            depth = self.depth(),
            "committed sub-transaction"
        );
        Ok(())
    }

    /// Replay a child's maps into this scope.
    fn fold(
        &self,
        involved: &HashMap<ObjectId, ObjectRef>,
        deltas: &[TransactionDelta],
        renamed: &BTreeMap<ObjectId, ObjectId>,
    ) -> TransactionResult<()> {
        for (local, origin) in renamed {
            if let Some(object) = involved.get(local) {
                self.rename_local(origin, local, object);
            }
        }

        {
            let mut target = self.scope_mut();
            for (id, object) in involved {
                let version = version_of(object);
                target
                    .involved
                    .entry(id.clone())
                    .or_insert_with(|| ObjectRef::clone(object));
                target
                    .changes
                    .entry(id.clone())
                    .or_insert_with(|| TransactionDelta::new(id.clone(), ObjectState::Clean, version));
            }
            for delta in deltas {
                let id = delta.object_id();
                target.changes.entry(id.clone()).or_insert_with(|| {
                    TransactionDelta::new(
                        id.clone(),
                        ObjectState::Clean,
                        delta.version().map(str::to_string),
                    )
                });
            }
        }

        for delta in deltas {
            let id = delta.object_id();
            let version = delta.version().map(str::to_string);
            let before = self
                .delta(id)
                .map_or(ObjectState::Clean, |local| local.state());

            for change in delta.changes() {
                match change {
                    Change::Single(single) => self.record_single(
                        id,
                        version.clone(),
                        single.relation(),
                        single.value().clone(),
                    )?,
                    Change::Multiple(multiple) => {
                        for entry in multiple.entries() {
                            self.record_entry(
                                id,
                                version.clone(),
                                multiple.relation(),
                                entry.child().clone(),
                                entry.state(),
                            )?;
                        }
                    }
                }
            }

            if !delta.state().is_clean() {
                let merged = StateMachine::merge_states(before, delta.state());
                self.set_state(id, version, merged);
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        let scope = self.scope();
        Snapshot {
            changes: scope.changes.clone(),
            involved: scope.involved.clone(),
            renamed: scope.renamed.clone(),
        }
    }

    fn restore(&self, saved: Snapshot) {
        let mut scope = self.scope_mut();
        scope.changes = saved.changes;
        scope.involved = saved.involved;
        scope.renamed = saved.renamed;
    }

    /// Discard everything recorded in this scope.
    ///
    /// On a sub-transaction the parent becomes current again and this handle
    /// may be reused.
    pub fn rollback(&self) -> TransactionResult<()> {
        self.check_mutable("roll back")?;
        match self.parent() {
            Some(parent) => self.discard(&parent),
            None => {
                let mut scope = self.scope_mut();
                scope.changes.clear();
                scope.involved.clear();
            }
        }
        debug!(depth = self.depth(), "rolled back transaction");
        Ok(())
    }

    /// Give renamed objects their old ids back, then detach from `parent`.
    pub(super) fn discard(&self, parent: &ObjectTransaction) {
        let renamed = std::mem::take(&mut self.scope_mut().renamed);
        for (local, origin) in &renamed {
            if let Some(object) = self.scope().involved.get(local) {
                object.borrow_mut().set_object_id(origin.clone());
            }
        }
        self.finish(parent);
    }

    fn finish(&self, parent: &ObjectTransaction) {
        let context = {
            let mut scope = self.scope_mut();
            scope.changes.clear();
            scope.involved.clear();
            scope.renamed.clear();
            scope.attached = false;
            scope.context.clone()
        };
        parent.scope_mut().open_child = None;
        if let Some(context) = context {
            context.install(parent);
        }
    }

    /// Write the recorded changes of this root transaction back into the
    /// live objects using the accessors in `registry`.
    ///
    /// Handlers run with clean modus on, so any transactional calls they
    /// make are not recorded. Deleted and vanished objects are dropped;
    /// every remaining object starts over with a clean delta.
    ///
    /// Every needed handler is looked up before the first one runs.
    pub fn commit_to_objects(&self, registry: &ReplayRegistry) -> TransactionResult<()> {
        self.check_valid()?;
        if !self.is_root() {
            return Err(TransactionError::NotRoot {
                operation: "commit changes to objects",
            });
        }
        self.check_mutable("commit changes to objects")?;
        self.flush_pending();

        let deltas: Vec<TransactionDelta> = self.scope().changes.values().cloned().collect();
        let steps = self.plan_replay(&deltas)?;
        for step in &steps {
            let (object, entity, relation, kind) = match step {
                ReplayStep::Set {
                    object,
                    entity,
                    relation,
                    ..
                } => (object, entity, relation, HandlerKind::Setter),
                ReplayStep::Link {
                    object,
                    entity,
                    relation,
                    kind,
                    ..
                } => (object, entity, relation, *kind),
            };
            registry.handler_for(entity, object, kind, relation)?;
        }

        let was_clean = std::mem::replace(&mut self.scope_mut().config.clean_modus, true);
        let outcome = self.run_replay(registry, steps);
        self.scope_mut().config.clean_modus = was_clean;
        outcome?;

        let mut scope = self.scope_mut();
        for delta in &deltas {
            if matches!(delta.state(), ObjectState::Deleted | ObjectState::Vanished) {
                scope.involved.remove(delta.object_id());
            }
        }
        let fresh: Vec<TransactionDelta> = scope
            .involved
            .iter()
            .map(|(id, object)| TransactionDelta::new(id.clone(), ObjectState::Clean, version_of(object)))
            .collect();
        scope.changes.clear();
        for delta in fresh {
            scope.changes.insert(delta.object_id().clone(), delta);
        }

        debug!(deltas = deltas.len(), "committed changes to objects");
        Ok(())
    }

    fn plan_replay(&self, deltas: &[TransactionDelta]) -> TransactionResult<Vec<ReplayStep>> {
        let mut steps = Vec::new();
        for delta in deltas {
            let id = delta.object_id();
            let object = self
                .resolve_object(id)
                .ok_or_else(|| TransactionError::NotRegistered(id.clone()))?;
            let entity = id.entity().to_string();

            for change in delta.changes() {
                if is_system_relation(change.relation()) {
                    continue;
                }
                match change {
                    Change::Single(single) => steps.push(ReplayStep::Set {
                        object: ObjectRef::clone(&object),
                        entity: entity.clone(),
                        relation: single.relation().to_string(),
                        value: single.value().clone(),
                    }),
                    Change::Multiple(multiple) => {
                        for entry in multiple.entries() {
                            let kind = match entry.state() {
                                EntryState::Added => HandlerKind::Adder,
                                EntryState::Removed => HandlerKind::Remover,
                            };
                            steps.push(ReplayStep::Link {
                                object: ObjectRef::clone(&object),
                                entity: entity.clone(),
                                relation: multiple.relation().to_string(),
                                target: entry.child().clone(),
                                kind,
                            });
                        }
                    }
                }
            }
        }
        Ok(steps)
    }

    fn run_replay(&self, registry: &ReplayRegistry, steps: Vec<ReplayStep>) -> TransactionResult<()> {
        for step in steps {
            match step {
                ReplayStep::Set {
                    object,
                    entity,
                    relation,
                    value,
                } => {
                    let table = registry.handler_for(&entity, &object, HandlerKind::Setter, &relation)?;
                    let value = match value {
                        ChangeValue::Object(target) => ReplayValue::Object(self.resolve_object(&target)),
                        other => ReplayValue::Value(other),
                    };
                    table.set(&mut *object.borrow_mut(), &relation, value);
                }
                ReplayStep::Link {
                    object,
                    entity,
                    relation,
                    target,
                    kind,
                } => {
                    let table = registry.handler_for(&entity, &object, kind, &relation)?;
                    match self.resolve_object(&target) {
                        Some(target) => {
                            table.link(kind, &mut *object.borrow_mut(), &relation, target);
                        }
                        None => trace!(%target, relation = %relation, "skipping unresolved entry"),
                    }
                }
            }
        }
        Ok(())
    }
}
