//! Attribute binder and update guard.

use crate::{
    engine::{Engine, cascade},
    error::EngineError,
    model::attribute::AttributeSpec,
    obs::sink::{self, EngineEvent},
    record::{Datastore, HookOutcome, Record, RecordHandle},
    value::Value,
};

impl Engine {
    // ======================================================================
    // Attribute binder
    // ======================================================================

    /// Dirty-aware read of a persisted computed attribute.
    ///
    /// Returns the live computation while the record is new or holds
    /// unsaved changes, and the persisted field once it is clean. Pure
    /// read: never writes, never heals staleness.
    pub fn read_attribute(
        &self,
        ds: &dyn Datastore,
        record: &dyn Record,
        attribute: &str,
    ) -> Result<Value, EngineError> {
        let spec = self
            .registry
            .spec(record.type_path(), attribute)
            .ok_or_else(|| EngineError::unknown_attribute(record.type_path(), attribute))?;

        if record.is_new_record() || record.has_unsaved_changes() {
            spec.compute(record, ds)
        } else {
            Ok(record.read(spec.attribute).unwrap_or(Value::Null))
        }
    }

    // ======================================================================
    // Update guard
    // ======================================================================

    /// Sync: recompute and write the value into the record's field for
    /// the in-flight save to persist. Always lets the save proceed.
    pub fn sync(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
        spec: &AttributeSpec,
    ) -> Result<HookOutcome, EngineError> {
        let computed = {
            let record = record.borrow();
            spec.compute(&*record, ds)?
        };
        record.borrow_mut().write(spec.attribute, computed);
        sink::record(EngineEvent::SyncApplied {
            owner_path: spec.owner_path,
        });

        Ok(HookOutcome::Proceed)
    }

    /// Force: bring the persisted value in sync with the computation,
    /// outside any in-flight save of the record.
    pub fn refresh(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
        attribute: &str,
    ) -> Result<(), EngineError> {
        let type_path = record.borrow().type_path();
        let spec = self
            .registry
            .spec(type_path, attribute)
            .cloned()
            .ok_or_else(|| EngineError::unknown_attribute(type_path, attribute))?;

        self.force(ds, record, &spec)
    }

    /// Force-mode dispatch.
    ///
    /// Performant: recompute, skip entirely on an equal value, otherwise
    /// persist just this field (no validation; after-save still fires).
    /// Strict: sync, then a full save when the field actually changed,
    /// surfacing any validation failure to the caller.
    pub(crate) fn force(
        &self,
        ds: &dyn Datastore,
        record: &RecordHandle,
        spec: &AttributeSpec,
    ) -> Result<(), EngineError> {
        let _scope = cascade::enter(&self.cascade, self.registry.config().max_cascade_depth)?;

        let (type_path, key) = {
            let record = record.borrow();
            (record.type_path(), record.primary_key())
        };
        if !cascade::mark_visited(&self.cascade, type_path, key, spec.attribute) {
            sink::record(EngineEvent::CascadeCycleSkipped {
                owner_path: spec.owner_path,
            });
            return Ok(());
        }

        if spec.performant {
            let computed = {
                let record = record.borrow();
                spec.compute(&*record, ds)?
            };
            let persisted = record.borrow().read(spec.attribute).unwrap_or(Value::Null);
            if computed == persisted {
                sink::record(EngineEvent::RefreshSkipped {
                    owner_path: spec.owner_path,
                });
                return Ok(());
            }

            sink::record(EngineEvent::RefreshNarrowWrite {
                owner_path: spec.owner_path,
            });
            ds.save_field(record, spec.attribute, computed)
        } else {
            self.sync(ds, record, spec)?;
            if record.borrow().field_changed(spec.attribute) {
                sink::record(EngineEvent::RefreshFullSave {
                    owner_path: spec.owner_path,
                });
                ds.save(record)
            } else {
                sink::record(EngineEvent::RefreshSkipped {
                    owner_path: spec.owner_path,
                });
                Ok(())
            }
        }
    }
}
