//! The propagation engine: attribute binding, the update guard, and the
//! lifecycle entry points that walk the dependency graph.

pub(crate) mod cascade;
mod guard;
pub(crate) mod strategy;

use crate::{
    error::EngineError,
    obs::sink::{self, EngineEvent},
    record::{ChangeKind, Datastore, HookOutcome, RecordHandle},
    registry::DependencyRegistry,
};
use self::cascade::CascadeState;
use std::{cell::RefCell, rc::Rc};

///
/// Engine
///
/// Owns no records and no storage: the engine is driven by the host
/// lifecycle through the four entry points below and reaches records
/// only through the `Datastore` contract. Execution is single-threaded
/// and reentrant-by-recursion — a cascade runs depth-first inside the
/// host's save call stack, and the caller of the outermost save blocks
/// until it completes.
///

pub struct Engine {
    registry: Rc<DependencyRegistry>,
    cascade: RefCell<CascadeState>,
}

impl Engine {
    #[must_use]
    pub fn new(registry: Rc<DependencyRegistry>) -> Self {
        Self {
            registry,
            cascade: RefCell::new(CascadeState::default()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &DependencyRegistry {
        &self.registry
    }

    // ======================================================================
    // Lifecycle entry points
    // ======================================================================

    /// Before-create hook: sync every persisted attribute of the record's
    /// type. Never cancels the save.
    pub fn before_create(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
    ) -> Result<HookOutcome, EngineError> {
        self.sync_all(ds, record)
    }

    /// Before-update hook: sync only when the record holds unsaved
    /// changes. Never cancels the save.
    pub fn before_update(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
    ) -> Result<HookOutcome, EngineError> {
        if !record.borrow().has_unsaved_changes() {
            return Ok(HookOutcome::Proceed);
        }

        self.sync_all(ds, record)
    }

    /// After-save hook: run every propagation binding installed on the
    /// record's type.
    pub fn after_save(&self, ds: &dyn Datastore, record: &RecordHandle) -> Result<(), EngineError> {
        self.propagate(ds, record, ChangeKind::Save)
    }

    /// After-destroy hook: same walk with destroy-side gating.
    pub fn after_destroy(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
    ) -> Result<(), EngineError> {
        self.propagate(ds, record, ChangeKind::Destroy)
    }

    // ======================================================================
    // Propagation
    // ======================================================================

    fn sync_all(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
    ) -> Result<HookOutcome, EngineError> {
        let type_path = record.borrow().type_path();
        for spec in self.registry.specs_for(type_path) {
            self.sync(ds, record, spec)?;
        }

        Ok(HookOutcome::Proceed)
    }

    fn propagate(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
        kind: ChangeKind,
    ) -> Result<(), EngineError> {
        let related_path = record.borrow().type_path();
        let bindings = self.registry.bindings_for(related_path);
        if bindings.is_empty() {
            return Ok(());
        }

        let _scope = cascade::enter(&self.cascade, self.registry.config().max_cascade_depth)?;

        for binding in bindings {
            let owners = {
                let related = record.borrow();
                binding
                    .edge
                    .resolution
                    .resolve(ds, &*related, binding.edge.owner_path)
            };

            for owner in owners {
                let allowed = {
                    let related = record.borrow();
                    let owner_ref = owner.borrow();
                    self.registry
                        .predicate(related_path, &binding.edge.callback)
                        .is_some_and(|predicate| predicate.allows(&*owner_ref, &*related, kind))
                };
                if !allowed {
                    sink::record(EngineEvent::PredicateRejected {
                        owner_path: binding.edge.owner_path,
                    });
                    continue;
                }

                let spec = self
                    .registry
                    .spec(binding.edge.owner_path, binding.edge.attribute)
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::invariant(format!(
                            "propagation binding without spec: {}.{}",
                            binding.edge.owner_path, binding.edge.attribute
                        ))
                    })?;
                self.force(ds, &owner, &spec)?;
            }
        }

        Ok(())
    }
}
