//! Data-error records collected during validation
//!
//! Nonconformance is reported as values, never exceptions: the walker
//! appends records and keeps going. Only a malformed schema terminates a
//! validation call early.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// The kind of a single data error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    KindMismatch,
    DtypeMismatch,
    ShapeMismatch,
    MissingMember,
    MissingAttribute,
    EnumViolation,
    ConstViolation,
    MinLengthViolation,
    MaxLengthViolation,
    PatternViolation,
    FormatViolation,
    AnyOfFailed,
    OneOfNoneMatched,
    OneOfMultipleMatched,
    NotFailed,
    DependentRequiredFailed,
    DependentSchemasFailed,
    IoError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One conformance error, annotated with the path of the offending node.
///
/// Combinator and dependent-schema failures carry the branch errors that
/// caused them as `sub_errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub path: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_errors: Vec<ErrorRecord>,
}

impl ErrorRecord {
    pub fn new(path: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
            context: Map::new(),
            sub_errors: Vec::new(),
        }
    }

    /// Attach a context entry for machine consumers.
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Attach the branch errors behind an aggregate failure.
    pub fn with_sub_errors(mut self, sub_errors: Vec<ErrorRecord>) -> Self {
        self.sub_errors = sub_errors;
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.path, self.kind, self.message)
    }
}
