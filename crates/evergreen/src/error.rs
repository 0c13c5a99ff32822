use crate::model::relation::RelationShape;
use thiserror::Error as ThisError;

///
/// ConfigError
///
/// Declaration-time failures. These are fatal at bootstrap: the process
/// must not start serving with a half-configured dependency graph.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ConfigError {
    #[error("{shape} relations are not supported: {owner_path} depends on '{relation}'")]
    UnsupportedShape {
        shape: RelationShape,
        owner_path: &'static str,
        relation: &'static str,
    },

    #[error("unknown relation: {owner_path} has no relation named '{relation}'")]
    UnknownRelation {
        owner_path: &'static str,
        relation: &'static str,
    },

    #[error(
        "through metadata missing: {owner_path} relation '{relation}' is {shape} but carries no intermediate"
    )]
    MissingThrough {
        shape: RelationShape,
        owner_path: &'static str,
        relation: &'static str,
    },
}

///
/// EngineError
///
/// Runtime failures surfaced out of the refresh/propagation path. Host
/// collaborators construct the `Validation` and `Backend` variants so
/// their failures flow through a cascade unchanged.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EngineError {
    #[error("validation failed: {type_path}: {message}")]
    Validation { type_path: String, message: String },

    #[error("backend failure: {message}")]
    Backend { message: String },

    #[error("no persisted attribute registered: {type_path}.{attribute}")]
    UnknownAttribute {
        type_path: String,
        attribute: String,
    },

    #[error("computation failed: {type_path}.{attribute}: {message}")]
    Compute {
        type_path: String,
        attribute: String,
        message: String,
    },

    #[error("cascade depth limit exceeded ({limit})")]
    CascadeDepthExceeded { limit: usize },

    #[error("engine invariant violated: {message}")]
    Invariant { message: String },
}

impl EngineError {
    /// Construct a host validation failure.
    pub fn validation(type_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            type_path: type_path.into(),
            message: message.into(),
        }
    }

    /// Construct a storage-level failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Construct a computation failure for a specific attribute.
    pub fn compute(
        type_path: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Compute {
            type_path: type_path.into(),
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown_attribute(type_path: &str, attribute: &str) -> Self {
        Self::UnknownAttribute {
            type_path: type_path.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
