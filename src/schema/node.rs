//! Schema AST node model
//!
//! Nodes live in an arena owned by [`SchemaDoc`](super::SchemaDoc) and
//! reference each other by [`NodeId`]; `$ref` nodes hold a resolved arena
//! id rather than a pointer graph. Combinator, conditional and dependency
//! rules are fields on the node, not sibling variants.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Index of a schema node in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Keys that are ignored by semantics but preserved for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    pub description: Option<String>,
    pub comment: Option<String>,
    pub id: Option<String>,
}

/// Value constraints shared by datasets and attribute specs.
#[derive(Debug, Clone, Default)]
pub struct ValueRules {
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub format: Option<String>,
}

impl ValueRules {
    /// True when no constraint is present, so element reads can be skipped.
    pub fn is_empty(&self) -> bool {
        self.enum_values.is_none()
            && self.const_value.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.pattern.is_none()
            && self.format.is_none()
    }
}

/// Declared constraints for a single attribute.
#[derive(Debug, Clone)]
pub struct AttrSpec {
    pub name: String,
    pub dtype: Option<crate::dtype::Dtype>,
    pub shape: Option<Vec<i64>>,
    pub required: bool,
    pub value: ValueRules,
}

/// The `allOf`/`anyOf`/`oneOf`/`not` combinators of a node.
#[derive(Debug, Clone, Default)]
pub struct Logic {
    pub all_of: Vec<NodeId>,
    pub any_of: Vec<NodeId>,
    pub one_of: Vec<NodeId>,
    pub not: Option<NodeId>,
}

/// The `if`/`then`/`else` triple of a node.
#[derive(Debug, Clone, Default)]
pub struct Conditional {
    pub if_schema: Option<NodeId>,
    pub then_schema: Option<NodeId>,
    pub else_schema: Option<NodeId>,
}

/// Dependency rules keyed by the triggering name.
///
/// On a group node the trigger and the dependents are child names; on a
/// dataset node they are attribute names.
#[derive(Debug, Clone, Default)]
pub struct Dependents {
    pub required: BTreeMap<String, Vec<String>>,
    pub schemas: BTreeMap<String, NodeId>,
}

/// Rules every node kind carries: attribute specs, combinators,
/// conditionals, dependency rules and annotations.
#[derive(Debug, Clone, Default)]
pub struct CommonRules {
    pub attrs: Vec<AttrSpec>,
    pub logic: Logic,
    pub conditional: Conditional,
    pub dependents: Dependents,
    pub annotations: Annotations,
}

/// A regex-keyed group member, in declaration order.
#[derive(Debug, Clone)]
pub struct PatternMember {
    pub pattern: Regex,
    pub node: NodeId,
}

/// Schema for a group node.
#[derive(Debug, Clone, Default)]
pub struct GroupSchema {
    /// Literal children; a literal match suppresses pattern matches.
    pub members: BTreeMap<String, NodeId>,
    /// Pattern-keyed children; every matching pattern applies.
    pub pattern_members: Vec<PatternMember>,
    /// Child names that must exist, in declaration order.
    pub required: Vec<String>,
    pub common: CommonRules,
}

/// Schema for a dataset node.
#[derive(Debug, Clone, Default)]
pub struct DatasetSchema {
    pub dtype: Option<crate::dtype::Dtype>,
    pub shape: Option<Vec<i64>>,
    pub value: ValueRules,
    pub common: CommonRules,
}

/// A `$ref` node: the original pointer plus its resolved arena id.
#[derive(Debug, Clone)]
pub struct RefNode {
    pub pointer: String,
    pub target: NodeId,
}

/// One node of the schema AST.
///
/// `Transparent` is a typeless constraint-only overlay: it carries common
/// rules but no kind, and is applied to whatever the actual node is.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Group(GroupSchema),
    Dataset(DatasetSchema),
    Transparent(CommonRules),
    Ref(RefNode),
}

impl SchemaNode {
    /// The common rules of a non-ref node.
    pub fn common(&self) -> Option<&CommonRules> {
        match self {
            SchemaNode::Group(g) => Some(&g.common),
            SchemaNode::Dataset(d) => Some(&d.common),
            SchemaNode::Transparent(c) => Some(c),
            SchemaNode::Ref(_) => None,
        }
    }
}
