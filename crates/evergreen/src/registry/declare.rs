use crate::{
    error::EngineError,
    model::attribute::ComputeFn,
    record::{Datastore, Record},
    registry::predicate::PredicateSet,
    value::Value,
};
use std::rc::Rc;

///
/// AttributeDecl
///
/// Builder for one persisted computed attribute declaration: the
/// computation, the optional Force-mode override, and the dependency
/// list in its three forms (single relation, list of relations, relation
/// with explicit gating predicates).
///

pub struct AttributeDecl {
    pub(crate) owner_path: &'static str,
    pub(crate) attribute: &'static str,
    pub(crate) performant: Option<bool>,
    pub(crate) compute: ComputeFn,
    pub(crate) dependencies: Vec<(&'static str, PredicateSet)>,
}

impl AttributeDecl {
    #[must_use]
    pub fn new(
        owner_path: &'static str,
        attribute: &'static str,
        compute: impl Fn(&dyn Record, &dyn Datastore) -> Result<Value, EngineError> + 'static,
    ) -> Self {
        Self {
            owner_path,
            attribute,
            performant: None,
            compute: Rc::new(compute),
            dependencies: Vec::new(),
        }
    }

    /// Override the registry-wide default Force strategy.
    #[must_use]
    pub fn performant(mut self, performant: bool) -> Self {
        self.performant = Some(performant);
        self
    }

    /// Depend on one relation with default (always-true) gating.
    #[must_use]
    pub fn depending_on(mut self, relation: &'static str) -> Self {
        self.dependencies.push((relation, PredicateSet::default()));
        self
    }

    /// Depend on several relations with default gating.
    #[must_use]
    pub fn depending_on_all(mut self, relations: impl IntoIterator<Item = &'static str>) -> Self {
        for relation in relations {
            self.dependencies.push((relation, PredicateSet::default()));
        }
        self
    }

    /// Depend on one relation with explicit gating predicates.
    #[must_use]
    pub fn depending_on_gated(mut self, relation: &'static str, predicates: PredicateSet) -> Self {
        self.dependencies.push((relation, predicates));
        self
    }
}
