mod binding;
mod declare;
mod predicate;

pub use binding::{CallbackName, DependencyEdge, PropagationBinding};
pub use declare::AttributeDecl;
pub use predicate::{ConditionalPredicate, PredicateFn, PredicateSet};

use crate::{
    engine::strategy::OwnerResolution,
    error::ConfigError,
    model::attribute::AttributeSpec,
    record::RelationCatalog,
};
use std::{collections::BTreeMap, rc::Rc};

///
/// RegistryConfig
///
/// Process-wide defaults owned by the registry: the default Force
/// strategy for declarations that do not choose one, and the bound on
/// engine re-entries within a single top-level save/destroy.
///

#[derive(Clone, Copy, Debug)]
pub struct RegistryConfig {
    pub performant_default: bool,
    pub max_cascade_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            performant_default: true,
            max_cascade_depth: crate::DEFAULT_CASCADE_DEPTH,
        }
    }
}

///
/// DependencyRegistry
///
/// Configuration-time registry mapping each persisted attribute to its
/// spec and each related type to the propagation bindings installed on
/// it. Built by `declare` during bootstrap, then frozen (typically
/// behind an `Rc`) and read by the engine at runtime; there is no hidden
/// process-wide state.
///

#[derive(Default)]
pub struct DependencyRegistry {
    config: RegistryConfig,
    specs: BTreeMap<(&'static str, &'static str), Rc<AttributeSpec>>,
    bindings: BTreeMap<&'static str, Vec<PropagationBinding>>,
}

impl DependencyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Declare one persisted computed attribute and compile its
    /// dependency edges against the relation catalog.
    ///
    /// Fails fast without mutating the registry when any dependency names
    /// an unknown relation or an unsupported shape. Re-declaring the same
    /// `(owner, attribute)` replaces the earlier spec and its bindings;
    /// installation is idempotent per (owner, attribute, related) triple.
    pub fn declare(
        &mut self,
        catalog: &dyn RelationCatalog,
        decl: AttributeDecl,
    ) -> Result<(), ConfigError> {
        let owner_path = decl.owner_path;
        let attribute = decl.attribute;
        let performant = decl.performant.unwrap_or(self.config.performant_default);

        // Compile every edge before touching registry state.
        let mut compiled = Vec::with_capacity(decl.dependencies.len());
        for (relation, predicates) in decl.dependencies {
            let model = catalog.relation(owner_path, relation).ok_or(
                ConfigError::UnknownRelation {
                    owner_path,
                    relation,
                },
            )?;
            let resolution = OwnerResolution::compile(owner_path, relation, model)?;

            let edge = DependencyEdge {
                owner_path,
                attribute,
                related_path: model.related_path,
                relation: model.name,
                shape: model.shape,
                callback: CallbackName::generate(attribute, owner_path),
                resolution,
            };
            compiled.push(PropagationBinding {
                edge,
                predicate: ConditionalPredicate::from_set(predicates),
            });
        }

        let spec = Rc::new(AttributeSpec::new(
            owner_path,
            attribute,
            performant,
            decl.compute,
        ));
        self.specs.insert((owner_path, attribute), spec);

        // Drop bindings from any earlier declaration of this attribute,
        // then install the fresh set, keeping one binding per related type.
        for bucket in self.bindings.values_mut() {
            bucket.retain(|binding| {
                !(binding.edge.owner_path == owner_path && binding.edge.attribute == attribute)
            });
        }
        for binding in compiled {
            let bucket = self.bindings.entry(binding.edge.related_path).or_default();
            if let Some(existing) = bucket.iter_mut().find(|b| {
                b.edge.owner_path == owner_path && b.edge.attribute == attribute
            }) {
                *existing = binding;
            } else {
                bucket.push(binding);
            }
        }

        Ok(())
    }

    /// Look up the spec for one persisted attribute.
    #[must_use]
    pub fn spec(&self, owner_path: &str, attribute: &str) -> Option<&Rc<AttributeSpec>> {
        self.specs
            .iter()
            .find(|((owner, attr), _)| *owner == owner_path && *attr == attribute)
            .map(|(_, spec)| spec)
    }

    /// All specs registered for one owner type, in attribute order.
    pub fn specs_for<'a>(
        &'a self,
        owner_path: &'a str,
    ) -> impl Iterator<Item = &'a Rc<AttributeSpec>> {
        self.specs
            .iter()
            .filter(move |((owner, _), _)| *owner == owner_path)
            .map(|(_, spec)| spec)
    }

    /// Propagation bindings installed on one related type.
    #[must_use]
    pub fn bindings_for(&self, related_path: &str) -> &[PropagationBinding] {
        self.bindings
            .get(related_path)
            .map_or(&[], Vec::as_slice)
    }

    /// Predicate-store lookup: the gate registered under one callback
    /// name on one related type.
    #[must_use]
    pub fn predicate(
        &self,
        related_path: &str,
        callback: &CallbackName,
    ) -> Option<&ConditionalPredicate> {
        self.bindings_for(related_path)
            .iter()
            .find(|binding| binding.edge.callback == *callback)
            .map(|binding| &binding.predicate)
    }
}
