use crate::{
    error::ConfigError,
    model::relation::{RelationModel, RelationShape},
    obs::sink::{self, EngineEvent, HaltReason},
    record::{Datastore, Record, RecordHandle},
    value::Value,
};

///
/// OwnerResolution
///
/// Closed dispatch over the supported relationship shapes: given a
/// changed related record, resolve the owner record(s) whose persisted
/// attribute must refresh. Compiled from catalog metadata at
/// configuration time; shapes outside this union are rejected there.
///
/// A missing foreign key, intermediate, or owner row is never an error:
/// the dependent simply cannot be resolved yet, and propagation halts
/// with an observability event.
///

#[derive(Clone, Debug)]
pub(crate) enum OwnerResolution {
    /// `ManyToOne` / `OneToOne`: the related record carries the owner's key.
    ByForeignKey { foreign_key: &'static str },

    /// `ManyToManyThrough`: related -> intermediate -> owner.
    ThroughIntermediate {
        intermediate_path: &'static str,
        intermediate_foreign_key: &'static str,
        owner_foreign_key: &'static str,
    },

    /// `OneToMany` inverse: every owner row carrying the related record's
    /// key refreshes independently.
    FanOut { foreign_key: &'static str },
}

impl OwnerResolution {
    pub(crate) fn compile(
        owner_path: &'static str,
        relation: &'static str,
        model: &RelationModel,
    ) -> Result<Self, ConfigError> {
        match model.shape {
            RelationShape::ManyToOne | RelationShape::OneToOne => Ok(Self::ByForeignKey {
                foreign_key: model.foreign_key,
            }),
            RelationShape::ManyToManyThrough => {
                model.through.map_or(
                    Err(ConfigError::MissingThrough {
                        shape: model.shape,
                        owner_path,
                        relation,
                    }),
                    |through| {
                        Ok(Self::ThroughIntermediate {
                            intermediate_path: through.intermediate_path,
                            intermediate_foreign_key: through.intermediate_foreign_key,
                            owner_foreign_key: through.owner_foreign_key,
                        })
                    },
                )
            }
            RelationShape::OneToMany => Ok(Self::FanOut {
                foreign_key: model.foreign_key,
            }),
            RelationShape::ManyToMany => Err(ConfigError::UnsupportedShape {
                shape: model.shape,
                owner_path,
                relation,
            }),
        }
    }

    /// Resolve the owner record(s) for one propagation event.
    pub(crate) fn resolve(
        &self,
        ds: &dyn Datastore,
        related: &dyn Record,
        owner_path: &'static str,
    ) -> Vec<RecordHandle> {
        match self {
            Self::ByForeignKey { foreign_key } => {
                let Some(owner_key) = present(related.read(foreign_key)) else {
                    halt(owner_path, HaltReason::MissingForeignKey);
                    return Vec::new();
                };
                match ds.find(owner_path, &owner_key) {
                    Some(owner) => vec![owner],
                    None => {
                        halt(owner_path, HaltReason::MissingOwner);
                        Vec::new()
                    }
                }
            }

            Self::ThroughIntermediate {
                intermediate_path,
                intermediate_foreign_key,
                owner_foreign_key,
            } => {
                let Some(intermediate_key) = present(related.read(intermediate_foreign_key))
                else {
                    halt(owner_path, HaltReason::MissingForeignKey);
                    return Vec::new();
                };
                let Some(intermediate) = ds.find(intermediate_path, &intermediate_key) else {
                    halt(owner_path, HaltReason::MissingIntermediate);
                    return Vec::new();
                };

                let owner_key = {
                    let intermediate = intermediate.borrow();
                    present(intermediate.read(owner_foreign_key))
                };
                let Some(owner_key) = owner_key else {
                    halt(owner_path, HaltReason::MissingForeignKey);
                    return Vec::new();
                };
                match ds.find(owner_path, &owner_key) {
                    Some(owner) => vec![owner],
                    None => {
                        halt(owner_path, HaltReason::MissingOwner);
                        Vec::new()
                    }
                }
            }

            Self::FanOut { foreign_key } => {
                ds.find_all_where(owner_path, foreign_key, &related.primary_key())
            }
        }
    }
}

// An absent column and an explicit null both mean "no key".
fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

fn halt(owner_path: &'static str, reason: HaltReason) {
    sink::record(EngineEvent::PropagationHalted { owner_path, reason });
}
