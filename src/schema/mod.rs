//! Schema documents: AST arena, `$defs` registry, reference diagnostics

mod graph;
mod loader;
mod node;

pub use node::{
    Annotations, AttrSpec, CommonRules, Conditional, DatasetSchema, Dependents, GroupSchema,
    Logic, NodeId, PatternMember, RefNode, SchemaNode, ValueRules,
};

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;

/// A loaded schema document: the node arena, the root node, and the
/// `$defs` registry. Built once per document and immutable afterwards;
/// compiled regexes live for its lifetime.
pub struct SchemaDoc {
    raw: Value,
    nodes: Vec<SchemaNode>,
    root: NodeId,
    defs: BTreeMap<String, NodeId>,
}

impl SchemaDoc {
    /// Build from a parsed JSON document.
    pub fn from_value(value: &Value) -> Result<Self> {
        let loaded = loader::Loader::load_document(value)?;
        Ok(Self {
            raw: value.clone(),
            nodes: loaded.nodes,
            root: loaded.root,
            defs: loaded.defs,
        })
    }

    /// Build from JSON text.
    pub fn from_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Build from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Arena id of the document root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Look up an arena node.
    pub(crate) fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    /// Names registered under `$defs`, sorted.
    pub fn def_names(&self) -> Vec<&str> {
        self.defs.keys().map(String::as_str).collect()
    }

    /// The original JSON document.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Reference cycles among the root and its `$defs`, each group listed
    /// as the participating pointers.
    pub fn ref_cycles(&self) -> Vec<Vec<String>> {
        graph::ref_cycles(&self.raw)
    }
}
