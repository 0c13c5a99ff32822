//! Reference in-memory host.
//!
//! A complete implementation of the collaborator contracts: records with
//! value-diff dirty tracking and a table store whose save/destroy
//! lifecycle drives the engine's hook entry points. Lookups materialize a
//! fresh record handle per call, so a cascade never aliases the handle it
//! was triggered from.

use crate::{
    engine::Engine,
    error::EngineError,
    record::{Datastore, Record, RecordHandle},
    value::Value,
};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

type Row = BTreeMap<String, Value>;
type Table = BTreeMap<Value, Row>;

/// Per-type validator run by full saves only; narrow writes bypass it.
pub type ValidatorFn = Rc<dyn Fn(&dyn Record) -> Result<(), String>>;

///
/// MemRecord
///
/// In-memory record. A field is dirty exactly when its value differs
/// from the committed row; every written field of a new record is dirty.
/// The primary key is the `id` field by convention.
///

#[derive(Clone, Debug)]
pub struct MemRecord {
    type_path: &'static str,
    fields: Row,
    committed: Row,
    dirty: BTreeSet<String>,
    new_record: bool,
    destroyed: bool,
}

impl MemRecord {
    #[must_use]
    pub fn new(type_path: &'static str) -> Self {
        Self {
            type_path,
            fields: Row::new(),
            committed: Row::new(),
            dirty: BTreeSet::new(),
            new_record: true,
            destroyed: false,
        }
    }

    /// Write one field, dirty-tracking included.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.write(field, value.into());
    }

    /// Wrap into a shared handle for the datastore surface.
    #[must_use]
    pub fn into_handle(self) -> RecordHandle {
        Rc::new(RefCell::new(self))
    }

    // Clean, persisted instance backed by a committed row.
    fn materialize(type_path: &'static str, row: &Row) -> Self {
        Self {
            type_path,
            fields: row.clone(),
            committed: row.clone(),
            dirty: BTreeSet::new(),
            new_record: false,
            destroyed: false,
        }
    }
}

impl Record for MemRecord {
    fn type_path(&self) -> &'static str {
        self.type_path
    }

    fn primary_key(&self) -> Value {
        self.fields.get("id").cloned().unwrap_or(Value::Null)
    }

    fn read(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }

    fn write(&mut self, field: &str, value: Value) {
        if !self.new_record && self.committed.get(field) == Some(&value) {
            self.dirty.remove(field);
        } else {
            self.dirty.insert(field.to_string());
        }
        self.fields.insert(field.to_string(), value);
    }

    fn snapshot(&self) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    fn is_new_record(&self) -> bool {
        self.new_record
    }

    fn has_unsaved_changes(&self) -> bool {
        !self.dirty.is_empty()
    }

    fn field_changed(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn mark_saved(&mut self) {
        self.committed = self.fields.clone();
        self.dirty.clear();
        self.new_record = false;
    }

    fn mark_field_saved(&mut self, field: &str) {
        if let Some(value) = self.fields.get(field) {
            self.committed.insert(field.to_string(), value.clone());
        }
        self.dirty.remove(field);
    }

    fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }
}

///
/// MemStore
///
/// Table store keyed by type path. `save` runs the full pipeline
/// (validator, before hooks, commit, after-save); `save_field` is the
/// narrow write (commit one field, after-save only); `destroy` removes
/// the row and fires after-destroy.
///

pub struct MemStore {
    engine: Rc<Engine>,
    tables: RefCell<BTreeMap<&'static str, Table>>,
    validators: RefCell<BTreeMap<&'static str, ValidatorFn>>,
}

impl MemStore {
    #[must_use]
    pub fn new(engine: Rc<Engine>) -> Self {
        Self {
            engine,
            tables: RefCell::new(BTreeMap::new()),
            validators: RefCell::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Rc<Engine> {
        &self.engine
    }

    /// Install the validator run by every full save of `type_path`.
    pub fn set_validator(
        &self,
        type_path: &'static str,
        validator: impl Fn(&dyn Record) -> Result<(), String> + 'static,
    ) {
        self.validators
            .borrow_mut()
            .insert(type_path, Rc::new(validator));
    }

    /// Save a fresh record and hand back its handle.
    pub fn create(&self, record: MemRecord) -> Result<RecordHandle, EngineError> {
        let handle = record.into_handle();
        self.save(&handle)?;

        Ok(handle)
    }

    /// Committed row snapshot, for assertions and diagnostics.
    #[must_use]
    pub fn row(&self, type_path: &str, key: &Value) -> Option<Row> {
        self.tables
            .borrow()
            .get(type_path)
            .and_then(|table| table.get(key))
            .cloned()
    }

    /// Number of committed rows for one type.
    #[must_use]
    pub fn table_len(&self, type_path: &str) -> usize {
        self.tables
            .borrow()
            .get(type_path)
            .map_or(0, BTreeMap::len)
    }
}

impl Datastore for MemStore {
    fn find(&self, type_path: &str, key: &Value) -> Option<RecordHandle> {
        let tables = self.tables.borrow();
        let (&path, table) = tables.get_key_value(type_path)?;
        let row = table.get(key)?;

        Some(MemRecord::materialize(path, row).into_handle())
    }

    fn find_all_where(&self, type_path: &str, field: &str, value: &Value) -> Vec<RecordHandle> {
        let tables = self.tables.borrow();
        let Some((&path, table)) = tables.get_key_value(type_path) else {
            return Vec::new();
        };

        table
            .values()
            .filter(|row| row.get(field).unwrap_or(&Value::Null) == value)
            .map(|row| MemRecord::materialize(path, row).into_handle())
            .collect()
    }

    fn save(&self, record: &RecordHandle) -> Result<(), EngineError> {
        let (type_path, is_new, destroyed) = {
            let record = record.borrow();
            (
                record.type_path(),
                record.is_new_record(),
                record.is_destroyed(),
            )
        };
        if destroyed {
            return Err(EngineError::backend(format!(
                "save on destroyed record: {type_path}"
            )));
        }

        let validator = self.validators.borrow().get(type_path).cloned();
        if let Some(validator) = validator {
            validator(&*record.borrow())
                .map_err(|message| EngineError::validation(type_path, message))?;
        }

        let outcome = if is_new {
            self.engine.before_create(self, record)?
        } else if record.borrow().has_unsaved_changes() {
            self.engine.before_update(self, record)?
        } else {
            crate::record::HookOutcome::Proceed
        };
        if !outcome.proceeds() {
            return Ok(());
        }

        let key = record.borrow().primary_key();
        if key.is_null() {
            return Err(EngineError::backend(format!(
                "record has no primary key: {type_path}"
            )));
        }
        let row: Row = record.borrow().snapshot().into_iter().collect();
        self.tables
            .borrow_mut()
            .entry(type_path)
            .or_default()
            .insert(key, row);
        record.borrow_mut().mark_saved();

        self.engine.after_save(self, record)
    }

    fn save_field(
        &self,
        record: &RecordHandle,
        field: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        let (type_path, key) = {
            let record = record.borrow();
            (record.type_path(), record.primary_key())
        };

        record.borrow_mut().write(field, value.clone());
        {
            let mut tables = self.tables.borrow_mut();
            let row = tables
                .get_mut(type_path)
                .and_then(|table| table.get_mut(&key))
                .ok_or_else(|| {
                    EngineError::backend(format!(
                        "narrow write on missing row: {type_path} ({key})"
                    ))
                })?;
            row.insert(field.to_string(), value);
        }
        record.borrow_mut().mark_field_saved(field);

        self.engine.after_save(self, record)
    }

    fn destroy(&self, record: &RecordHandle) -> Result<(), EngineError> {
        let (type_path, key) = {
            let record = record.borrow();
            (record.type_path(), record.primary_key())
        };

        if let Some(table) = self.tables.borrow_mut().get_mut(type_path) {
            table.remove(&key);
        }
        record.borrow_mut().mark_destroyed();

        self.engine.after_destroy(self, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DependencyRegistry;

    fn bare_store() -> MemStore {
        MemStore::new(Rc::new(Engine::new(Rc::new(DependencyRegistry::new()))))
    }

    fn widget(id: u64) -> MemRecord {
        let mut record = MemRecord::new("mem::Widget");
        record.set("id", id);
        record.set("name", "widget");
        record
    }

    #[test]
    fn dirty_tracking_follows_committed_state() {
        let mut record = widget(1);
        assert!(record.is_new_record());
        assert!(record.has_unsaved_changes());

        record.mark_saved();
        assert!(!record.is_new_record());
        assert!(!record.has_unsaved_changes());

        record.set("name", "renamed");
        assert!(record.field_changed("name"));

        // Writing the committed value back clears the dirty flag.
        record.set("name", "widget");
        assert!(!record.field_changed("name"));
        assert!(!record.has_unsaved_changes());
    }

    #[test]
    fn save_commits_and_cleans_the_record() {
        let store = bare_store();
        let handle = store.create(widget(1)).expect("create should succeed");

        assert!(!handle.borrow().is_new_record());
        assert!(!handle.borrow().has_unsaved_changes());
        let row = store
            .row("mem::Widget", &Value::Uint(1))
            .expect("row should be committed");
        assert_eq!(row.get("name"), Some(&Value::Text("widget".into())));
    }

    #[test]
    fn save_requires_a_primary_key() {
        let store = bare_store();
        let mut record = MemRecord::new("mem::Widget");
        record.set("name", "no id");

        let err = store
            .save(&record.into_handle())
            .expect_err("save without pk must fail");
        assert!(matches!(err, EngineError::Backend { .. }));
    }

    #[test]
    fn find_materializes_a_fresh_clean_handle() {
        let store = bare_store();
        let original = store.create(widget(1)).expect("create should succeed");

        let found = store
            .find("mem::Widget", &Value::Uint(1))
            .expect("find should resolve");
        assert!(!Rc::ptr_eq(&original, &found));
        assert!(!found.borrow().has_unsaved_changes());
        assert_eq!(
            found.borrow().read("name"),
            Some(Value::Text("widget".into()))
        );
    }

    #[test]
    fn find_all_where_matches_on_field_value() {
        let store = bare_store();
        for id in 1..=3u64 {
            let mut record = widget(id);
            record.set("bucket", id % 2);
            store.create(record).expect("create should succeed");
        }

        let odd = store.find_all_where("mem::Widget", "bucket", &Value::Uint(1));
        assert_eq!(odd.len(), 2);
        assert!(store
            .find_all_where("mem::Widget", "missing_field", &Value::Uint(1))
            .is_empty());
    }

    #[test]
    fn validator_failure_aborts_before_commit() {
        let store = bare_store();
        store.set_validator("mem::Widget", |record| {
            if record.read("name") == Some(Value::Text("bad".into())) {
                Err("name must not be bad".to_string())
            } else {
                Ok(())
            }
        });

        let mut record = widget(1);
        record.set("name", "bad");
        let err = store
            .save(&record.into_handle())
            .expect_err("validator must reject");
        assert!(err.is_validation());
        assert_eq!(store.table_len("mem::Widget"), 0);
    }

    #[test]
    fn save_field_bypasses_the_validator() {
        let store = bare_store();
        let handle = store.create(widget(1)).expect("create should succeed");

        store.set_validator("mem::Widget", |_| Err("always rejects".to_string()));
        store
            .save_field(&handle, "name", Value::Text("renamed".into()))
            .expect("narrow write must skip validation");

        let row = store
            .row("mem::Widget", &Value::Uint(1))
            .expect("row should exist");
        assert_eq!(row.get("name"), Some(&Value::Text("renamed".into())));
        assert!(!handle.borrow().field_changed("name"));
    }

    #[test]
    fn destroy_removes_the_row_and_marks_the_record() {
        let store = bare_store();
        let handle = store.create(widget(1)).expect("create should succeed");

        store.destroy(&handle).expect("destroy should succeed");
        assert!(handle.borrow().is_destroyed());
        assert_eq!(store.table_len("mem::Widget"), 0);
        // Fields stay readable on the destroyed instance.
        assert_eq!(handle.borrow().primary_key(), Value::Uint(1));
    }
}
