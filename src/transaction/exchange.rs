//! Moving deltas out of and back into a root transaction.

use super::engine::ObjectTransaction;
use super::error::{TransactionError, TransactionResult};
use super::object::{version_of, ObjectRef};
use crate::core::{ObjectId, ObjectState};
use crate::delta::{
    is_system_relation, TransactionDelta, TransactionExtract, SYS_OBJECT_ID, SYS_OLD_OBJECT_ID,
    SYS_VERSION,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One delta of an incoming extract, resolved against the receiver.
struct ImportStep {
    delta: TransactionDelta,
    object: ObjectRef,
    rename: Option<(ObjectId, ObjectId)>,
    version: Option<String>,
}

impl ObjectTransaction {
    /// Deep copy of every delta in this scope, skipping vanished objects.
    pub fn export_extract(&self) -> TransactionResult<TransactionExtract> {
        self.check_valid()?;
        self.flush_pending();
        Ok(self.collect_deltas(true))
    }

    /// Deep copy of every changed delta, plus a clean entry for each object
    /// that a change points at but that has no delta of its own in the
    /// result.
    pub fn export_only_modified_objects_to_extract(&self) -> TransactionResult<TransactionExtract> {
        self.check_valid()?;
        self.flush_pending();
        let mut extract = self.collect_deltas(false);

        let targets: Vec<ObjectId> = extract
            .iter()
            .flat_map(|delta| delta.changes())
            .filter(|change| !is_system_relation(change.relation()))
            .flat_map(|change| change.referenced_ids().into_iter().cloned())
            .collect();
        for target in targets {
            if let Some(object) = self.resolve_object(&target) {
                extract.add_clean_object(target, version_of(&object));
            }
        }

        debug!(deltas = extract.len(), "exported modified objects");
        Ok(extract)
    }

    fn collect_deltas(&self, include_clean: bool) -> TransactionExtract {
        self.scope()
            .changes
            .values()
            .filter(|delta| delta.state() != ObjectState::Vanished)
            .filter(|delta| include_clean || !delta.state().is_clean())
            .cloned()
            .collect()
    }

    /// Apply every delta of `extract` to this root transaction as if it had
    /// been committed by a sub-transaction.
    ///
    /// Fails without touching anything if an imported delta names an object
    /// this transaction does not know.
    pub fn import_extract(&self, extract: &TransactionExtract) -> TransactionResult<()> {
        self.check_import()?;
        let plan = self.plan_import(extract, true)?;
        self.apply_import(plan)
    }

    /// Like [`import_extract`](Self::import_extract) but skips clean deltas
    /// and first checks that every relation target in the extract is known
    /// here.
    pub fn import_only_modified_objects_from_extract(
        &self,
        extract: &TransactionExtract,
    ) -> TransactionResult<()> {
        self.check_import()?;
        self.check_reference_targets(extract)?;
        let plan = self.plan_import(extract, false)?;
        self.apply_import(plan)
    }

    fn check_import(&self) -> TransactionResult<()> {
        self.check_valid()?;
        if !self.is_root() {
            return Err(TransactionError::NotRoot {
                operation: "import an extract",
            });
        }
        if self.scope().config.clean_modus {
            return Err(TransactionError::CleanModusImport);
        }
        if self.has_open_sub_transaction() {
            return Err(TransactionError::OpenSubTransaction {
                operation: "import an extract",
            });
        }
        self.flush_pending();
        let count = self.pending_count();
        if count > 0 {
            return Err(TransactionError::PendingUnidentified { count });
        }
        Ok(())
    }

    /// Every non-system target must already be registered, or be the new id
    /// of a rename carried by the extract.
    fn check_reference_targets(&self, extract: &TransactionExtract) -> TransactionResult<()> {
        let renamed: HashSet<&ObjectId> = extract
            .iter()
            .filter_map(|delta| delta.single(SYS_OBJECT_ID))
            .filter_map(|value| value.as_object_id())
            .collect();

        for delta in extract {
            for change in delta.changes() {
                if is_system_relation(change.relation()) {
                    continue;
                }
                for target in change.referenced_ids() {
                    if !self.registered(target) && !renamed.contains(target) {
                        return Err(TransactionError::UnregisteredTarget {
                            owner: delta.object_id().clone(),
                            relation: change.relation().to_string(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve every selected delta before anything is changed.
    fn plan_import(
        &self,
        extract: &TransactionExtract,
        include_clean: bool,
    ) -> TransactionResult<Vec<ImportStep>> {
        let mut plan = Vec::new();
        for delta in extract {
            if !include_clean && delta.state().is_clean() {
                continue;
            }
            let new_id = delta.single(SYS_OBJECT_ID).and_then(|v| v.as_object_id());
            let old_id = delta.single(SYS_OLD_OBJECT_ID).and_then(|v| v.as_object_id());
            let rename = match (old_id, new_id) {
                (Some(old), Some(new)) if old != new => Some((old.clone(), new.clone())),
                _ => None,
            };
            let known_as = match &rename {
                Some((old, _)) => old,
                None => delta.object_id(),
            };
            let object = self
                .scope()
                .involved
                .get(known_as)
                .cloned()
                .ok_or_else(|| TransactionError::UnknownObject(delta.object_id().clone()))?;

            plan.push(ImportStep {
                version: delta
                    .single(SYS_VERSION)
                    .and_then(|v| v.as_text())
                    .map(str::to_string),
                delta: delta.clone(),
                object,
                rename,
            });
        }
        Ok(plan)
    }

    /// Load the plan into a carrier sub-transaction and commit it. On
    /// failure the carrier is discarded and object versions are put back,
    /// so this transaction is left as it was.
    fn apply_import(&self, plan: Vec<ImportStep>) -> TransactionResult<()> {
        let count = plan.len();
        let carrier = self.create_sub_transaction()?;
        let mut versions = Vec::new();

        let outcome = carrier
            .load_import(plan, &mut versions)
            .and_then(|()| carrier.commit());
        if let Err(err) = outcome {
            for (object, version) in versions.into_iter().rev() {
                if let Some(version) = version {
                    object.borrow_mut().set_version(version);
                }
            }
            carrier.discard(self);
            warn!(error = %err, "import failed; nothing applied");
            return Err(err);
        }

        debug!(deltas = count, "imported extract");
        Ok(())
    }

    fn load_import(
        &self,
        plan: Vec<ImportStep>,
        versions: &mut Vec<(ObjectRef, Option<String>)>,
    ) -> TransactionResult<()> {
        for mut step in plan {
            let id = match &step.rename {
                Some((old, new)) => {
                    self.change_object_id(old, new)?;
                    new.clone()
                }
                None => step.delta.object_id().clone(),
            };
            if let Some(version) = step.version.take() {
                versions.push((ObjectRef::clone(&step.object), version_of(&step.object)));
                step.object.borrow_mut().set_version(version);
            }
            step.delta.set_object_id(id.clone());
            let mut scope = self.scope_mut();
            scope.involved.insert(id.clone(), step.object);
            scope.changes.insert(id, step.delta);
        }
        Ok(())
    }
}
