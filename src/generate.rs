//! Schema synthesis from a live tree
//!
//! Produces a schema document that the source tree itself satisfies:
//! every present child becomes a literal, required member; dtypes and
//! shapes are recorded exactly. The output is a starting point for
//! hand-editing in patterns, optional members and value constraints.

use serde_json::{json, Map, Value};

use crate::tree::{NodeKind, TreeNode};
use crate::value::AttrValue;

/// Synthesize a schema document for the tree rooted at `node`.
pub fn schema_for(node: &dyn TreeNode) -> Value {
    match node.kind() {
        NodeKind::Group => group_schema(node),
        NodeKind::Dataset => dataset_schema(node),
    }
}

fn group_schema(node: &dyn TreeNode) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("group"));

    let mut members = Map::new();
    let mut required = Vec::new();
    for (name, child) in node.children() {
        members.insert(name.to_string(), schema_for(child));
        required.push(json!(name));
    }
    schema.insert("members".into(), Value::Object(members));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }

    if let Some(attrs) = attr_specs(node) {
        schema.insert("attrs".into(), attrs);
    }
    Value::Object(schema)
}

fn dataset_schema(node: &dyn TreeNode) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), json!("dataset"));
    if let Some(dtype) = node.dtype() {
        schema.insert("dtype".into(), dtype.to_schema_value());
    }
    if let Some(shape) = node.shape() {
        schema.insert("shape".into(), json!(shape));
    }
    if let Some(attrs) = attr_specs(node) {
        schema.insert("attrs".into(), attrs);
    }
    Value::Object(schema)
}

fn attr_specs(node: &dyn TreeNode) -> Option<Value> {
    let attrs = node.attrs();
    if attrs.is_empty() {
        return None;
    }
    let specs: Vec<Value> = attrs
        .iter()
        .map(|(name, value)| attr_spec(name, value))
        .collect();
    Some(Value::Array(specs))
}

fn attr_spec(name: &str, value: &AttrValue) -> Value {
    let mut spec = Map::new();
    spec.insert("name".into(), json!(name));
    spec.insert("dtype".into(), value.dtype.to_schema_value());
    let shape = value.shape();
    if !shape.is_empty() {
        spec.insert("shape".into(), json!(shape));
    }
    spec.insert("required".into(), json!(true));
    Value::Object(spec)
}
