//! Scalar and attribute values read from a tree

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::dtype::Dtype;

/// A single element value read from a dataset or attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    /// The string payload, if this is a string element.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Compare against a JSON value from a schema `enum` or `const`.
    ///
    /// Integers compare exactly; floats compare by value and `NaN` never
    /// matches anything, so a `const` over NaN data always fails.
    pub fn matches_json(&self, expected: &Value) -> bool {
        match (self, expected) {
            (ScalarValue::Bool(a), Value::Bool(b)) => a == b,
            (ScalarValue::Str(a), Value::String(b)) => a == b,
            (ScalarValue::Int(a), Value::Number(n)) => match n.as_i64() {
                Some(b) => *a == b,
                None => n.as_f64().map(|b| *a as f64 == b).unwrap_or(false),
            },
            (ScalarValue::Uint(a), Value::Number(n)) => match n.as_u64() {
                Some(b) => *a == b,
                None => n.as_f64().map(|b| *a as f64 == b).unwrap_or(false),
            },
            (ScalarValue::Float(a), Value::Number(n)) => {
                n.as_f64().map(|b| *a == b).unwrap_or(false)
            }
            _ => false,
        }
    }

    /// Build from a JSON literal, e.g. a dataset value in a tree document.
    pub fn from_json(value: &Value) -> Option<ScalarValue> {
        match value {
            Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            Value::String(s) => Some(ScalarValue::Str(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(ScalarValue::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(ScalarValue::Uint(u))
                } else {
                    n.as_f64().map(ScalarValue::Float)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(i) => write!(f, "{}", i),
            ScalarValue::Uint(u) => write!(f, "{}", u),
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// Scalar-or-array payload of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrData {
    Scalar(ScalarValue),
    Array(Vec<ScalarValue>),
}

/// An attribute value: a dtype descriptor plus a scalar or 1-D array.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrValue {
    pub dtype: Dtype,
    pub data: AttrData,
}

impl AttrValue {
    /// A scalar attribute with an explicit dtype.
    pub fn scalar(dtype: Dtype, value: ScalarValue) -> Self {
        Self {
            dtype,
            data: AttrData::Scalar(value),
        }
    }

    /// A 1-D array attribute with an explicit dtype.
    pub fn array(dtype: Dtype, values: Vec<ScalarValue>) -> Self {
        Self {
            dtype,
            data: AttrData::Array(values),
        }
    }

    /// A scalar string attribute; the dtype is a `U<chars>` descriptor.
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        let dtype = Dtype::unicode(value.chars().count() as u32);
        Self::scalar(dtype, ScalarValue::Str(value))
    }

    /// Shape of the payload: `[]` for a scalar, `[n]` for an array.
    pub fn shape(&self) -> Vec<u64> {
        match &self.data {
            AttrData::Scalar(_) => Vec::new(),
            AttrData::Array(values) => vec![values.len() as u64],
        }
    }

    /// Elements of the payload, a single-element slice for scalars.
    pub fn values(&self) -> Vec<&ScalarValue> {
        match &self.data {
            AttrData::Scalar(v) => vec![v],
            AttrData::Array(values) => values.iter().collect(),
        }
    }
}
