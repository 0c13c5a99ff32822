use crate::record::{ChangeKind, Record};
use std::rc::Rc;

/// Gating predicate over (owner, related). Trusted caller code: panics
/// propagate uncaught.
pub type PredicateFn = Rc<dyn Fn(&dyn Record, &dyn Record) -> bool>;

///
/// PredicateSet
///
/// Declaration-surface bundle of optional gating predicates for one
/// propagation edge. Any function left unset defaults to "always true"
/// when the set is compiled into a `ConditionalPredicate`.
///

#[derive(Clone, Default)]
pub struct PredicateSet {
    when: Option<PredicateFn>,
    save: Option<PredicateFn>,
    destroy: Option<PredicateFn>,
}

impl PredicateSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outer gate, consulted before the change-kind specific predicate.
    #[must_use]
    pub fn when(mut self, f: impl Fn(&dyn Record, &dyn Record) -> bool + 'static) -> Self {
        self.when = Some(Rc::new(f));
        self
    }

    /// Gate applied to save-triggered propagation.
    #[must_use]
    pub fn save(mut self, f: impl Fn(&dyn Record, &dyn Record) -> bool + 'static) -> Self {
        self.save = Some(Rc::new(f));
        self
    }

    /// Gate applied to destroy-triggered propagation.
    #[must_use]
    pub fn destroy(mut self, f: impl Fn(&dyn Record, &dyn Record) -> bool + 'static) -> Self {
        self.destroy = Some(Rc::new(f));
        self
    }
}

///
/// ConditionalPredicate
///
/// Fully-defaulted per-edge gate. Dispatch: `when(owner, related)` first;
/// if it passes, the predicate matching the change kind decides.
///

#[derive(Clone)]
pub struct ConditionalPredicate {
    when: PredicateFn,
    save: PredicateFn,
    destroy: PredicateFn,
}

impl ConditionalPredicate {
    fn always() -> PredicateFn {
        Rc::new(|_, _| true)
    }

    #[must_use]
    pub fn from_set(set: PredicateSet) -> Self {
        Self {
            when: set.when.unwrap_or_else(Self::always),
            save: set.save.unwrap_or_else(Self::always),
            destroy: set.destroy.unwrap_or_else(Self::always),
        }
    }

    #[must_use]
    pub fn allows(&self, owner: &dyn Record, related: &dyn Record, kind: ChangeKind) -> bool {
        if !(self.when)(owner, related) {
            return false;
        }

        match kind {
            ChangeKind::Save => (self.save)(owner, related),
            ChangeKind::Destroy => (self.destroy)(owner, related),
        }
    }
}

impl Default for ConditionalPredicate {
    fn default() -> Self {
        Self::from_set(PredicateSet::default())
    }
}
