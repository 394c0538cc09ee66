//! Schema AST loader
//!
//! Builds the arena of [`SchemaNode`]s from a parsed JSON document.
//! Dispatches on `"type"`, treats a sibling `$ref` as taking precedence
//! over every other key, compiles regexes eagerly, and resolves all
//! `$ref` pointers against the document so that an unresolved reference
//! fails the load instead of the walk.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::node::{
    AttrSpec, CommonRules, Conditional, DatasetSchema, Dependents, GroupSchema, Logic, NodeId,
    PatternMember, RefNode, SchemaNode, ValueRules,
};
use crate::dtype::Dtype;
use crate::error::{Result, SchemaError};
use crate::tree::NodeKind;

pub(crate) struct Loader<'a> {
    document: &'a Value,
    arena: Vec<SchemaNode>,
    /// Pointer -> arena id of the loaded target, pre-registered before the
    /// target is built so that reference cycles tie back to the same id.
    ref_targets: HashMap<String, NodeId>,
}

pub(crate) struct LoadedDocument {
    pub nodes: Vec<SchemaNode>,
    pub root: NodeId,
    pub defs: BTreeMap<String, NodeId>,
}

impl<'a> Loader<'a> {
    pub(crate) fn load_document(document: &'a Value) -> Result<LoadedDocument> {
        let mut loader = Loader {
            document,
            arena: Vec::new(),
            ref_targets: HashMap::new(),
        };

        let root = loader.load(document, None)?;

        // Load $defs entries the root never referenced, so their regexes
        // and layouts are checked and diagnostics can list them.
        let mut defs = BTreeMap::new();
        if let Some(entries) = document.get("$defs").and_then(Value::as_object) {
            for name in entries.keys() {
                let pointer = format!("#/$defs/{}", name);
                let id = loader.load_pointer(&pointer)?;
                defs.insert(name.clone(), id);
            }
        }

        debug!(nodes = loader.arena.len(), defs = defs.len(), "schema loaded");
        Ok(LoadedDocument {
            nodes: loader.arena,
            root,
            defs,
        })
    }

    fn push(&mut self, node: SchemaNode) -> NodeId {
        self.arena.push(node);
        NodeId(self.arena.len() - 1)
    }

    fn load(&mut self, value: &'a Value, hint: Option<NodeKind>) -> Result<NodeId> {
        let node = self.build(value, hint)?;
        Ok(self.push(node))
    }

    fn build(&mut self, value: &'a Value, hint: Option<NodeKind>) -> Result<SchemaNode> {
        let obj = value.as_object().ok_or_else(|| {
            SchemaError::InvalidSchema(format!("expected a schema object, got {}", value))
        })?;

        // A sibling $ref suppresses every other key at this node.
        if let Some(pointer) = obj.get("$ref") {
            let pointer = pointer.as_str().ok_or_else(|| {
                SchemaError::InvalidSchema(format!("$ref must be a string, got {}", pointer))
            })?;
            let target = self.load_pointer(pointer)?;
            return Ok(SchemaNode::Ref(RefNode {
                pointer: pointer.to_string(),
                target,
            }));
        }

        let kind = match obj.get("type") {
            Some(Value::String(name)) => match name.as_str() {
                "group" => Some(NodeKind::Group),
                "dataset" => Some(NodeKind::Dataset),
                other => return Err(SchemaError::UnknownType(other.to_string())),
            },
            Some(other) => return Err(SchemaError::UnknownType(other.to_string())),
            None => hint,
        };

        match kind {
            Some(NodeKind::Group) => {
                let common = self.parse_common(obj, Some(NodeKind::Group))?;
                self.build_group(obj, common).map(SchemaNode::Group)
            }
            Some(NodeKind::Dataset) => {
                let common = self.parse_common(obj, Some(NodeKind::Dataset))?;
                build_dataset(obj, common).map(SchemaNode::Dataset)
            }
            None => {
                if !has_common_keys(obj) {
                    return Err(SchemaError::InvalidSchema(
                        "node has neither a 'type' nor combinator keywords".into(),
                    ));
                }
                let common = self.parse_common(obj, None)?;
                Ok(SchemaNode::Transparent(common))
            }
        }
    }

    fn build_group(
        &mut self,
        obj: &'a serde_json::Map<String, Value>,
        common: CommonRules,
    ) -> Result<GroupSchema> {
        let mut members = BTreeMap::new();
        let mut inner_required: Vec<String> = Vec::new();
        if let Some(entries) = obj.get("members").and_then(Value::as_object) {
            for (name, member) in entries {
                // The legacy wire form nests the required list inside the
                // members map.
                if name == "required" {
                    if let Some(names) = member.as_array() {
                        inner_required = parse_name_list(names)?;
                        continue;
                    }
                }
                members.insert(name.clone(), self.load(member, None)?);
            }
        }

        let mut pattern_members = Vec::new();
        if let Some(entries) = obj.get("patternMembers").and_then(Value::as_object) {
            for (source, member) in entries {
                let pattern = regex::Regex::new(source).map_err(|e| SchemaError::InvalidRegex {
                    pattern: source.clone(),
                    source: e,
                })?;
                pattern_members.push(PatternMember {
                    pattern,
                    node: self.load(member, None)?,
                });
            }
        }

        let required = match obj.get("required").and_then(Value::as_array) {
            Some(names) => parse_name_list(names)?,
            None => inner_required,
        };

        Ok(GroupSchema {
            members,
            pattern_members,
            required,
            common,
        })
    }

    fn parse_common(
        &mut self,
        obj: &'a serde_json::Map<String, Value>,
        kind: Option<NodeKind>,
    ) -> Result<CommonRules> {
        let mut logic = Logic::default();
        if let Some(branches) = obj.get("allOf").and_then(Value::as_array) {
            for branch in branches {
                logic.all_of.push(self.load(branch, kind)?);
            }
        }
        if let Some(branches) = obj.get("anyOf").and_then(Value::as_array) {
            for branch in branches {
                logic.any_of.push(self.load(branch, kind)?);
            }
        }
        if let Some(branches) = obj.get("oneOf").and_then(Value::as_array) {
            for branch in branches {
                logic.one_of.push(self.load(branch, kind)?);
            }
        }
        if let Some(branch) = obj.get("not") {
            logic.not = Some(self.load(branch, kind)?);
        }

        let mut conditional = Conditional::default();
        if let Some(branch) = obj.get("if") {
            conditional.if_schema = Some(self.load(branch, kind)?);
            if let Some(then) = obj.get("then") {
                conditional.then_schema = Some(self.load(then, kind)?);
            }
            if let Some(otherwise) = obj.get("else") {
                conditional.else_schema = Some(self.load(otherwise, kind)?);
            }
        }

        let mut dependents = Dependents::default();
        if let Some(entries) = obj.get("dependentRequired").and_then(Value::as_object) {
            for (trigger, deps) in entries {
                let deps = deps.as_array().ok_or_else(|| {
                    SchemaError::InvalidSchema(format!(
                        "dependentRequired entry '{}' must list names",
                        trigger
                    ))
                })?;
                dependents
                    .required
                    .insert(trigger.clone(), parse_name_list(deps)?);
            }
        }
        if let Some(entries) = obj.get("dependentSchemas").and_then(Value::as_object) {
            for (trigger, schema) in entries {
                dependents
                    .schemas
                    .insert(trigger.clone(), self.load(schema, kind)?);
            }
        }

        let mut attrs = Vec::new();
        if let Some(entries) = obj.get("attrs").and_then(Value::as_array) {
            for entry in entries {
                attrs.push(parse_attr_spec(entry)?);
            }
        }

        Ok(CommonRules {
            attrs,
            logic,
            conditional,
            dependents,
            annotations: parse_annotations(obj),
        })
    }

    fn load_pointer(&mut self, pointer: &str) -> Result<NodeId> {
        if let Some(&id) = self.ref_targets.get(pointer) {
            return Ok(id);
        }

        let target = resolve_pointer(self.document, pointer)?;

        // Pre-register a placeholder so a cycle through this pointer
        // resolves to the slot being built.
        let id = self.push(SchemaNode::Transparent(CommonRules::default()));
        self.ref_targets.insert(pointer.to_string(), id);

        let node = self.build(target, None)?;
        self.arena[id.0] = node;
        Ok(id)
    }
}

/// Walk a `#/`-rooted JSON pointer through the document.
fn resolve_pointer<'a>(document: &'a Value, pointer: &str) -> Result<&'a Value> {
    let rest = pointer
        .strip_prefix("#/")
        .ok_or_else(|| SchemaError::UnresolvedRef(pointer.to_string()))?;

    let mut current = document;
    for part in rest.split('/') {
        let part = part.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(obj) => obj.get(&part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(|| SchemaError::UnresolvedRef(pointer.to_string()))?;
    }
    Ok(current)
}

fn has_common_keys(obj: &serde_json::Map<String, Value>) -> bool {
    const KEYS: [&str; 10] = [
        "allOf",
        "anyOf",
        "oneOf",
        "not",
        "if",
        "then",
        "else",
        "dependentRequired",
        "dependentSchemas",
        "attrs",
    ];
    KEYS.iter().any(|k| obj.contains_key(*k))
}

fn build_dataset(
    obj: &serde_json::Map<String, Value>,
    common: CommonRules,
) -> Result<DatasetSchema> {
    let dtype = obj.get("dtype").map(Dtype::from_schema_value).transpose()?;
    let shape = obj
        .get("shape")
        .map(|v| parse_shape(v))
        .transpose()?;
    Ok(DatasetSchema {
        dtype,
        shape,
        value: parse_value_rules(obj)?,
        common,
    })
}

fn parse_attr_spec(entry: &Value) -> Result<AttrSpec> {
    let obj = entry.as_object().ok_or_else(|| {
        SchemaError::InvalidSchema(format!("attribute spec must be an object, got {}", entry))
    })?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::InvalidSchema("attribute spec is missing 'name'".into()))?;
    Ok(AttrSpec {
        name: name.to_string(),
        dtype: obj.get("dtype").map(Dtype::from_schema_value).transpose()?,
        shape: obj.get("shape").map(parse_shape).transpose()?,
        required: obj
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        value: parse_value_rules(obj)?,
    })
}

fn parse_value_rules(obj: &serde_json::Map<String, Value>) -> Result<ValueRules> {
    let const_value = match obj.get("const") {
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            return Err(SchemaError::UnsupportedConst)
        }
        Some(value) => Some(value.clone()),
        None => None,
    };
    let pattern = obj
        .get("pattern")
        .and_then(Value::as_str)
        .map(|source| {
            regex::Regex::new(source).map_err(|e| SchemaError::InvalidRegex {
                pattern: source.to_string(),
                source: e,
            })
        })
        .transpose()?;
    Ok(ValueRules {
        enum_values: obj.get("enum").and_then(Value::as_array).cloned(),
        const_value,
        min_length: obj
            .get("minLength")
            .and_then(Value::as_u64)
            .map(|n| n as usize),
        max_length: obj
            .get("maxLength")
            .and_then(Value::as_u64)
            .map(|n| n as usize),
        pattern,
        format: obj.get("format").and_then(Value::as_str).map(String::from),
    })
}

fn parse_shape(value: &Value) -> Result<Vec<i64>> {
    let dims = value
        .as_array()
        .ok_or_else(|| SchemaError::InvalidSchema(format!("shape must be a list, got {}", value)))?;
    dims.iter()
        .map(|dim| {
            dim.as_i64()
                .filter(|n| *n >= -1)
                .ok_or_else(|| SchemaError::InvalidSchema(format!("bad shape dimension {}", dim)))
        })
        .collect()
}

fn parse_name_list(values: &[Value]) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(values.len());
    for value in values {
        let name = value.as_str().ok_or_else(|| {
            SchemaError::InvalidSchema(format!("expected a name string, got {}", value))
        })?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn parse_annotations(obj: &serde_json::Map<String, Value>) -> super::node::Annotations {
    super::node::Annotations {
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(String::from),
        comment: obj
            .get("$comment")
            .and_then(Value::as_str)
            .map(String::from),
        id: obj.get("$id").and_then(Value::as_str).map(String::from),
    }
}
