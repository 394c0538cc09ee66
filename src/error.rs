//! Error types for schema loading and validation

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised while loading or resolving a schema document.
///
/// These are distinct from data errors: a malformed schema fails the
/// whole validation call, while data nonconformance is collected as
/// [`ErrorRecord`](crate::report::ErrorRecord) values.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unresolved reference: {0}")]
    UnresolvedRef(String),

    #[error("unknown schema type '{0}' (expected \"group\" or \"dataset\")")]
    UnknownType(String),

    #[error("invalid dtype descriptor: {0}")]
    InvalidDtype(String),

    #[error("compound dtype layout error: {0}")]
    CompoundLayout(String),

    #[error("invalid schema document: {0}")]
    InvalidSchema(String),

    #[error("array-valued const is not supported; use a scalar const or enum")]
    UnsupportedConst,

    #[error("invalid tree document: {0}")]
    InvalidTree(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
