//! Collaborator contracts.
//!
//! The engine owns no records, no storage, and no relationship metadata;
//! everything it touches arrives through the traits in this module. Hosts
//! implement them once (the in-memory reference host lives in
//! `store::memory`) and drive the engine from their lifecycle hooks.

use crate::{error::EngineError, model::relation::RelationModel, value::Value};
use std::{cell::RefCell, rc::Rc};

/// Shared handle to a record. Records are single-threaded and mutated in
/// place during a cascade, so the handle is `Rc<RefCell<_>>` rather than
/// anything sendable.
pub type RecordHandle = Rc<RefCell<dyn Record>>;

///
/// Record
///
/// Storage-facing record contract. The engine uses the read/write and
/// dirty-state surface; the `mark_*` transitions exist for datastore
/// implementations to acknowledge commits and are never called by the
/// engine itself.
///
/// Dirty-state semantics: `field_changed` must hold exactly when the
/// in-memory value differs from the last persisted value, and
/// `has_unsaved_changes` when any field does. New records count every
/// written field as changed.
///

pub trait Record: std::fmt::Debug {
    /// Stable type path used for dispatch and diagnostics.
    fn type_path(&self) -> &'static str;

    /// Primary key value; `Value::Null` while unassigned.
    fn primary_key(&self) -> Value;

    /// Read one field. `None` when the field has never been written.
    fn read(&self, field: &str) -> Option<Value>;

    /// Write one field in memory, updating dirty state.
    fn write(&mut self, field: &str, value: Value);

    /// Full field snapshot, used by datastores to commit a row.
    fn snapshot(&self) -> Vec<(String, Value)>;

    fn is_new_record(&self) -> bool;

    fn has_unsaved_changes(&self) -> bool;

    fn field_changed(&self, field: &str) -> bool;

    fn is_destroyed(&self) -> bool;

    /// Commit acknowledgment after a full save.
    fn mark_saved(&mut self);

    /// Commit acknowledgment after a narrow single-field write.
    fn mark_field_saved(&mut self, field: &str);

    /// State transition after the backing row is removed.
    fn mark_destroyed(&mut self);
}

///
/// Datastore
///
/// Record storage and lookup contract.
///
/// `save` runs the host's full pipeline: validation, the engine's
/// before-create/before-update hooks, the commit, then the engine's
/// after-save hook. `save_field` is the narrow write used by
/// performant-mode refreshes: it bypasses validation and the before
/// hooks but MUST still fire after-save, so propagation continues
/// through narrow writes.
///

pub trait Datastore {
    /// Look up one record by primary key.
    fn find(&self, type_path: &str, key: &Value) -> Option<RecordHandle>;

    /// All records of `type_path` whose `field` equals `value`.
    fn find_all_where(&self, type_path: &str, field: &str, value: &Value) -> Vec<RecordHandle>;

    /// Full save through the validation/lifecycle pipeline.
    fn save(&self, record: &RecordHandle) -> Result<(), EngineError>;

    /// Narrow single-field persist; no validation, after-save still fires.
    fn save_field(&self, record: &RecordHandle, field: &str, value: Value)
    -> Result<(), EngineError>;

    /// Remove the record and fire the engine's after-destroy hook.
    fn destroy(&self, record: &RecordHandle) -> Result<(), EngineError>;
}

///
/// RelationCatalog
///
/// Relationship metadata contract, consulted once per declared dependency
/// at configuration time.
///

pub trait RelationCatalog {
    fn relation(&self, owner_path: &str, name: &str) -> Option<&RelationModel>;
}

///
/// HookOutcome
///
/// Explicit result of a before-save hook. Replaces the implicit
/// boolean-return protocol of callback systems: `Proceed` lets the
/// enclosing save continue, `Abort` cancels it. The engine's Sync
/// operation always yields `Proceed`.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HookOutcome {
    Proceed,
    Abort,
}

impl HookOutcome {
    #[must_use]
    pub const fn proceeds(self) -> bool {
        matches!(self, Self::Proceed)
    }
}

///
/// ChangeKind
///
/// The kind of lifecycle change that triggered an invalidation event.
/// Selects which gating predicate applies during propagation.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    Save,
    Destroy,
}
