use crate::{
    engine::strategy::OwnerResolution, model::relation::RelationShape,
    registry::predicate::ConditionalPredicate,
};
use derive_more::Deref;
use std::fmt;

///
/// CallbackName
///
/// Generated identity of one propagation edge, derived from the attribute
/// and the owning type path. Distinct names keep unrelated propagation
/// chains from ever sharing gating logic; the name is also the key into
/// the predicate store.
///

#[derive(Clone, Debug, Deref, Eq, Ord, PartialEq, PartialOrd)]
pub struct CallbackName(String);

impl CallbackName {
    #[must_use]
    pub fn generate(attribute: &str, owner_path: &str) -> Self {
        let mut slug = String::with_capacity(owner_path.len());
        for ch in owner_path.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else {
                slug.push('_');
            }
        }

        Self(format!("update_{attribute}_in_{slug}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// DependencyEdge
///
/// Compiled propagation edge: "changes to `related_path` must refresh
/// `owner_path.attribute`". Built at configuration time from a declared
/// dependency and the relation catalog; read-only at runtime.
///

#[derive(Clone, Debug)]
pub struct DependencyEdge {
    pub owner_path: &'static str,
    pub attribute: &'static str,
    pub related_path: &'static str,
    /// Relation name the edge was declared through.
    pub relation: &'static str,
    pub shape: RelationShape,
    pub callback: CallbackName,
    pub(crate) resolution: OwnerResolution,
}

///
/// PropagationBinding
///
/// A `DependencyEdge` installed on its related type together with the
/// compiled gate. One binding per (owner, attribute, related) triple.
///

#[derive(Clone)]
pub struct PropagationBinding {
    pub edge: DependencyEdge,
    pub(crate) predicate: ConditionalPredicate,
}
