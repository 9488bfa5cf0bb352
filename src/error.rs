//! Error taxonomy for schema derivation and binding.
//!
//! Derivation and required-value access fail fast; optional accessors on
//! [`crate::values::ValueBag`] never produce these.
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The spec type is missing its schema-source tag, or carries an
    /// unusable name.
    #[error("cannot derive marker schema from `{type_name}`: {reason}")]
    SchemaDerivation { type_name: String, reason: String },

    /// A declared member type has no parameter type descriptor.
    #[error("type `{type_name}` is not supported in marker specs")]
    UnsupportedType { type_name: String },

    /// A required value is absent or has the wrong shape.
    #[error("marker value `{name}`: {reason}")]
    Binding { name: String, reason: String },

    /// Only raised under `ResolutionPolicy::Strict`.
    #[error("ambiguous constructor for `{marker}`: candidates {candidates:?}")]
    AmbiguousConstructor {
        marker: String,
        candidates: Vec<String>,
    },
}

impl Error {
    pub(crate) fn missing(name: &str) -> Self {
        Error::Binding {
            name: name.to_string(),
            reason: "required value was not found".to_string(),
        }
    }

    pub(crate) fn mismatch(name: &str, expected: &str) -> Self {
        Error::Binding {
            name: name.to_string(),
            reason: format!("value is null or not of type {expected}"),
        }
    }

    pub(crate) fn derivation(type_name: &str, reason: impl Into<String>) -> Self {
        Error::SchemaDerivation {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }
}
