//! Tree adapter and the in-memory container backend
//!
//! The validation engine only ever sees the [`TreeNode`] trait: path
//! navigation, node kind, dtype, shape, attributes and on-demand element
//! reads. [`MemoryTree`] is the bundled backend, loadable from a JSON
//! description so the CLIs and tests can run end to end without a binary
//! container reader.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::dtype::Dtype;
use crate::error::{Result, SchemaError};
use crate::value::{AttrData, AttrValue, ScalarValue};

/// The two node kinds a container tree is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Dataset,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Group => write!(f, "group"),
            NodeKind::Dataset => write!(f, "dataset"),
        }
    }
}

/// Read-only view of one node in a hierarchical container.
///
/// The engine borrows nodes for the duration of a validation call and
/// never mutates them. `read_values` is only invoked for datasets whose
/// schema carries a value constraint, and may fail with an I/O error.
pub trait TreeNode {
    fn kind(&self) -> NodeKind;

    /// Named children of a group; empty for datasets.
    fn children(&self) -> Vec<(&str, &dyn TreeNode)>;

    /// Attributes attached to this node.
    fn attrs(&self) -> Vec<(&str, &AttrValue)>;

    /// Element dtype of a dataset; `None` for groups.
    fn dtype(&self) -> Option<&Dtype>;

    /// Dimension extents of a dataset; `None` for groups.
    fn shape(&self) -> Option<&[u64]>;

    /// Element values of a dataset, flattened.
    fn read_values(&self) -> io::Result<Vec<ScalarValue>>;
}

/// One node of the in-memory backend.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryNode {
    Group {
        children: BTreeMap<String, MemoryNode>,
        attrs: BTreeMap<String, AttrValue>,
    },
    Dataset {
        dtype: Dtype,
        shape: Vec<u64>,
        values: Vec<ScalarValue>,
        attrs: BTreeMap<String, AttrValue>,
    },
}

impl MemoryNode {
    /// An empty group.
    pub fn group() -> Self {
        MemoryNode::Group {
            children: BTreeMap::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// A dataset with no materialized values.
    pub fn dataset(dtype: Dtype, shape: Vec<u64>) -> Self {
        MemoryNode::Dataset {
            dtype,
            shape,
            values: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// A dataset with element values.
    pub fn dataset_with_values(dtype: Dtype, shape: Vec<u64>, values: Vec<ScalarValue>) -> Self {
        MemoryNode::Dataset {
            dtype,
            shape,
            values,
            attrs: BTreeMap::new(),
        }
    }

    /// Attach a child; only meaningful on groups.
    pub fn with_child(mut self, name: impl Into<String>, node: MemoryNode) -> Self {
        if let MemoryNode::Group { children, .. } = &mut self {
            children.insert(name.into(), node);
        }
        self
    }

    /// Attach an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        match &mut self {
            MemoryNode::Group { attrs, .. } | MemoryNode::Dataset { attrs, .. } => {
                attrs.insert(name.into(), value);
            }
        }
        self
    }

    fn from_value(value: &Value) -> Result<MemoryNode> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidTree(format!("expected an object, got {}", value)))?;
        let kind = obj
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::InvalidTree("node is missing 'kind'".into()))?;

        match kind {
            "group" => {
                let mut children = BTreeMap::new();
                if let Some(members) = obj.get("children").and_then(Value::as_object) {
                    for (name, child) in members {
                        children.insert(name.clone(), MemoryNode::from_value(child)?);
                    }
                }
                Ok(MemoryNode::Group {
                    children,
                    attrs: parse_attrs(obj.get("attrs"))?,
                })
            }
            "dataset" => {
                let dtype = obj
                    .get("dtype")
                    .ok_or_else(|| SchemaError::InvalidTree("dataset is missing 'dtype'".into()))
                    .and_then(Dtype::from_schema_value)?;
                let shape = obj
                    .get("shape")
                    .and_then(Value::as_array)
                    .ok_or_else(|| SchemaError::InvalidTree("dataset is missing 'shape'".into()))?
                    .iter()
                    .map(|v| {
                        v.as_u64().ok_or_else(|| {
                            SchemaError::InvalidTree(format!("bad shape dimension {}", v))
                        })
                    })
                    .collect::<Result<Vec<u64>>>()?;
                let mut values = Vec::new();
                if let Some(elements) = obj.get("values").and_then(Value::as_array) {
                    for element in elements {
                        values.push(ScalarValue::from_json(element).ok_or_else(|| {
                            SchemaError::InvalidTree(format!("bad element value {}", element))
                        })?);
                    }
                }
                Ok(MemoryNode::Dataset {
                    dtype,
                    shape,
                    values,
                    attrs: parse_attrs(obj.get("attrs"))?,
                })
            }
            other => Err(SchemaError::InvalidTree(format!(
                "unknown node kind '{}'",
                other
            ))),
        }
    }
}

/// Parse an attribute map; entries are either `{dtype, value}` objects or
/// bare JSON values whose dtype is inferred.
fn parse_attrs(value: Option<&Value>) -> Result<BTreeMap<String, AttrValue>> {
    let mut attrs = BTreeMap::new();
    let Some(obj) = value.and_then(Value::as_object) else {
        return Ok(attrs);
    };
    for (name, entry) in obj {
        attrs.insert(name.clone(), parse_attr_value(entry)?);
    }
    Ok(attrs)
}

fn parse_attr_value(entry: &Value) -> Result<AttrValue> {
    if let Some(obj) = entry.as_object() {
        if let (Some(dtype), Some(value)) = (obj.get("dtype"), obj.get("value")) {
            let dtype = Dtype::from_schema_value(dtype)?;
            let data = parse_attr_data(value)?;
            return Ok(AttrValue { dtype, data });
        }
    }
    infer_attr_value(entry)
}

fn parse_attr_data(value: &Value) -> Result<AttrData> {
    if let Some(elements) = value.as_array() {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(ScalarValue::from_json(element).ok_or_else(|| {
                SchemaError::InvalidTree(format!("bad attribute element {}", element))
            })?);
        }
        return Ok(AttrData::Array(values));
    }
    ScalarValue::from_json(value)
        .map(AttrData::Scalar)
        .ok_or_else(|| SchemaError::InvalidTree(format!("bad attribute value {}", value)))
}

fn infer_attr_value(value: &Value) -> Result<AttrValue> {
    let data = parse_attr_data(value)?;
    let sample = match &data {
        AttrData::Scalar(v) => Some(v),
        AttrData::Array(values) => values.first(),
    };
    let dtype = match sample {
        Some(ScalarValue::Str(s)) => Dtype::unicode(s.chars().count() as u32),
        Some(ScalarValue::Bool(_)) => Dtype::parse("|b1")?,
        Some(ScalarValue::Int(_)) => Dtype::parse("<i8")?,
        Some(ScalarValue::Uint(_)) => Dtype::parse("<u8")?,
        Some(ScalarValue::Float(_)) | None => Dtype::parse("<f8")?,
    };
    Ok(AttrValue { dtype, data })
}

impl TreeNode for MemoryNode {
    fn kind(&self) -> NodeKind {
        match self {
            MemoryNode::Group { .. } => NodeKind::Group,
            MemoryNode::Dataset { .. } => NodeKind::Dataset,
        }
    }

    fn children(&self) -> Vec<(&str, &dyn TreeNode)> {
        match self {
            MemoryNode::Group { children, .. } => children
                .iter()
                .map(|(name, node)| (name.as_str(), node as &dyn TreeNode))
                .collect(),
            MemoryNode::Dataset { .. } => Vec::new(),
        }
    }

    fn attrs(&self) -> Vec<(&str, &AttrValue)> {
        let attrs = match self {
            MemoryNode::Group { attrs, .. } | MemoryNode::Dataset { attrs, .. } => attrs,
        };
        attrs.iter().map(|(name, v)| (name.as_str(), v)).collect()
    }

    fn dtype(&self) -> Option<&Dtype> {
        match self {
            MemoryNode::Dataset { dtype, .. } => Some(dtype),
            MemoryNode::Group { .. } => None,
        }
    }

    fn shape(&self) -> Option<&[u64]> {
        match self {
            MemoryNode::Dataset { shape, .. } => Some(shape),
            MemoryNode::Group { .. } => None,
        }
    }

    fn read_values(&self) -> io::Result<Vec<ScalarValue>> {
        match self {
            MemoryNode::Dataset { values, .. } => Ok(values.clone()),
            MemoryNode::Group { .. } => Ok(Vec::new()),
        }
    }
}

/// An owned in-memory container tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTree {
    root: MemoryNode,
}

impl MemoryTree {
    /// Wrap a root node; the root is always a group in practice.
    pub fn new(root: MemoryNode) -> Self {
        Self { root }
    }

    /// Load a tree from its JSON description.
    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(Self {
            root: MemoryNode::from_value(value)?,
        })
    }

    /// Load a tree from JSON text.
    pub fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Load a tree from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// The root node, for handing to the validator.
    pub fn root(&self) -> &MemoryNode {
        &self.root
    }
}
