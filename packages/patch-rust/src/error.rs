//! Typed patch failures and their protocol-level error body.
//!
//! Every violated precondition aborts the whole apply call with one
//! [`PatchError`]. The REST layer outside this crate renders the body; the
//! engine only supplies the classification (`scimType`) and detail text.
//! All kinds map to HTTP 400.

use serde::{Deserialize, Serialize};

/// Classified failure raised by the patch engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    /// The operation list was absent or empty.
    #[error("patch request contains no operations")]
    InvalidSyntax,

    /// No target: path omitted on REMOVE, or a filtered REPLACE matched
    /// nothing.
    #[error("no target for operation: {detail}")]
    NoTarget { detail: String },

    /// The path or its filter could not be parsed, or names an attribute
    /// the schema does not define.
    #[error("invalid path: {detail}")]
    InvalidPath { detail: String },

    /// The operation value's runtime shape does not match the attribute's
    /// declared kind.
    #[error("invalid value: {detail}")]
    InvalidValue { detail: String },

    /// REMOVE or a value-changing write against a required, read-only, or
    /// immutable attribute.
    #[error("attribute cannot be modified: {detail}")]
    Mutability { detail: String },

    /// A sub-attribute-scoped REMOVE filter matched more than one element;
    /// the caller must narrow the filter.
    #[error("filter matched more than one element: {detail}")]
    TooMany { detail: String },
}

impl PatchError {
    pub(crate) fn no_target(detail: impl Into<String>) -> Self {
        PatchError::NoTarget { detail: detail.into() }
    }

    pub(crate) fn invalid_path(detail: impl Into<String>) -> Self {
        PatchError::InvalidPath { detail: detail.into() }
    }

    pub(crate) fn invalid_value(detail: impl Into<String>) -> Self {
        PatchError::InvalidValue { detail: detail.into() }
    }

    pub(crate) fn mutability(detail: impl Into<String>) -> Self {
        PatchError::Mutability { detail: detail.into() }
    }

    pub(crate) fn too_many(detail: impl Into<String>) -> Self {
        PatchError::TooMany { detail: detail.into() }
    }

    /// Machine-readable SCIM error classification for this failure.
    #[must_use]
    pub fn scim_type(&self) -> &'static str {
        match self {
            PatchError::InvalidSyntax => "invalidSyntax",
            PatchError::NoTarget { .. } => "noTarget",
            PatchError::InvalidPath { .. } => "invalidPath",
            PatchError::InvalidValue { .. } => "invalidValue",
            PatchError::Mutability { .. } => "mutability",
            PatchError::TooMany { .. } => "tooMany",
        }
    }

    /// Serializable HTTP 400 error body for this failure.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: "400".to_string(),
            scim_type: self.scim_type().to_string(),
            detail: self.to_string(),
        }
    }
}

/// Wire shape of a failed patch call: `{status, scimType, detail}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: String,
    pub scim_type: String,
    pub detail: String,
}
