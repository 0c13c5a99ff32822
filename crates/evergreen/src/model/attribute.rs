use crate::{
    error::EngineError,
    record::{Datastore, Record},
    value::Value,
};
use std::{fmt, rc::Rc};

/// Caller-supplied computation for one persisted attribute. Receives the
/// owning record and the datastore, since a computation commonly reads
/// related records.
pub type ComputeFn = Rc<dyn Fn(&dyn Record, &dyn Datastore) -> Result<Value, EngineError>>;

///
/// AttributeSpec
///
/// Immutable runtime spec for one persisted computed attribute: the
/// owning type, the field the value is stored under, the resolved Force
/// strategy, and the computation itself. Built once at configuration
/// time by `DependencyRegistry::declare`.
///

#[derive(Clone)]
pub struct AttributeSpec {
    pub owner_path: &'static str,
    pub attribute: &'static str,
    /// Force strategy: equal-value skip + narrow write when set, full
    /// save through the validation pipeline when not.
    pub performant: bool,
    compute: ComputeFn,
}

impl AttributeSpec {
    pub(crate) fn new(
        owner_path: &'static str,
        attribute: &'static str,
        performant: bool,
        compute: ComputeFn,
    ) -> Self {
        Self {
            owner_path,
            attribute,
            performant,
            compute,
        }
    }

    /// Run the computation against the current record and store state.
    pub fn compute(&self, record: &dyn Record, ds: &dyn Datastore) -> Result<Value, EngineError> {
        (self.compute)(record, ds)
    }
}

impl fmt::Debug for AttributeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeSpec")
            .field("owner_path", &self.owner_path)
            .field("attribute", &self.attribute)
            .field("performant", &self.performant)
            .finish_non_exhaustive()
    }
}
