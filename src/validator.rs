//! The validation walker
//!
//! Drives a depth-first, pre-order traversal of the tree against the
//! schema AST, accumulating `/a/b/c` paths and collecting
//! [`ErrorRecord`]s. Data errors never abort the walk; only a malformed
//! schema (caught at load) fails a call outright.
//!
//! Per-node ordering is stable to keep error lists snapshot-friendly:
//! dtype, shape, value constraints, attributes, missing-required
//! members, child recursion in adapter order, then combinators,
//! conditionals and dependency rules.

use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::format::FormatValidators;
use crate::report::{ErrorKind, ErrorRecord};
use crate::schema::{
    AttrSpec, CommonRules, DatasetSchema, GroupSchema, NodeId, SchemaDoc, SchemaNode, ValueRules,
};
use crate::tree::{NodeKind, TreeNode};
use crate::value::ScalarValue;

/// Validates trees against one loaded schema document.
pub struct Validator<'a> {
    doc: &'a SchemaDoc,
}

impl<'a> Validator<'a> {
    pub fn new(doc: &'a SchemaDoc) -> Self {
        Self { doc }
    }

    /// Collect every conformance error for the tree rooted at `root`.
    pub fn iter_errors(&self, root: &dyn TreeNode) -> Vec<ErrorRecord> {
        let mut walk = Walk {
            doc: self.doc,
            active_refs: HashSet::new(),
            formats: FormatValidators::new(),
        };
        let errors = walk.eval(root, self.doc.root(), "/");
        debug!(errors = errors.len(), "validation finished");
        errors
    }
}

/// Validate a tree against a schema document, returning all errors.
pub fn validate(root: &dyn TreeNode, doc: &SchemaDoc) -> Vec<ErrorRecord> {
    Validator::new(doc).iter_errors(root)
}

/// True when the tree conforms to the schema document.
pub fn is_valid(root: &dyn TreeNode, doc: &SchemaDoc) -> bool {
    validate(root, doc).is_empty()
}

struct Walk<'a> {
    doc: &'a SchemaDoc,
    /// Reference applications currently on the evaluation stack, keyed by
    /// (resolved node, data path). Re-entering a pair means a `$ref`
    /// cycle that consumes no data, which terminates successfully.
    active_refs: HashSet<(NodeId, String)>,
    formats: FormatValidators,
}

impl<'a> Walk<'a> {
    fn eval(&mut self, node: &dyn TreeNode, id: NodeId, path: &str) -> Vec<ErrorRecord> {
        match self.doc.node(id) {
            SchemaNode::Ref(r) => {
                let key = (r.target, path.to_string());
                if !self.active_refs.insert(key.clone()) {
                    return Vec::new();
                }
                let errors = self.eval(node, r.target, path);
                self.active_refs.remove(&key);
                errors
            }
            SchemaNode::Group(group) => {
                if node.kind() != NodeKind::Group {
                    return vec![kind_mismatch(path, NodeKind::Group, node.kind())];
                }
                self.eval_group(node, group, path)
            }
            SchemaNode::Dataset(dataset) => {
                if node.kind() != NodeKind::Dataset {
                    return vec![kind_mismatch(path, NodeKind::Dataset, node.kind())];
                }
                self.eval_dataset(node, dataset, path)
            }
            SchemaNode::Transparent(common) => {
                let mut errors = self.eval_attrs(node, &common.attrs, path);
                errors.extend(self.eval_common(node, common, path));
                errors
            }
        }
    }

    fn eval_group(
        &mut self,
        node: &dyn TreeNode,
        schema: &'a GroupSchema,
        path: &str,
    ) -> Vec<ErrorRecord> {
        let mut errors = self.eval_attrs(node, &schema.common.attrs, path);

        let children = node.children();
        let names: BTreeSet<&str> = children.iter().map(|(name, _)| *name).collect();
        for required in &schema.required {
            if !names.contains(required.as_str()) {
                errors.push(
                    ErrorRecord::new(
                        path,
                        ErrorKind::MissingMember,
                        format!("required member '{}' is missing", required),
                    )
                    .with_context("member", json!(required)),
                );
            }
        }

        for (name, child) in &children {
            let child_path = join_path(path, name);
            if let Some(&member) = schema.members.get(*name) {
                // A literal member suppresses pattern matches for this child.
                errors.extend(self.eval(*child, member, &child_path));
            } else {
                for pattern in &schema.pattern_members {
                    if pattern.pattern.is_match(name) {
                        errors.extend(self.eval(*child, pattern.node, &child_path));
                    }
                }
            }
        }

        errors.extend(self.eval_common(node, &schema.common, path));
        errors
    }

    fn eval_dataset(
        &mut self,
        node: &dyn TreeNode,
        schema: &'a DatasetSchema,
        path: &str,
    ) -> Vec<ErrorRecord> {
        let mut errors = Vec::new();

        if let Some(declared) = &schema.dtype {
            if let Some(actual) = node.dtype() {
                if !declared.matches(actual) {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::DtypeMismatch,
                            format!("dtype '{}' does not match declared '{}'", actual, declared),
                        )
                        .with_context("expected", json!(declared.to_string()))
                        .with_context("actual", json!(actual.to_string())),
                    );
                }
            }
        }

        if let Some(declared) = &schema.shape {
            if let Some(actual) = node.shape() {
                if !shape_matches(declared, actual) {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::ShapeMismatch,
                            format!("shape {:?} does not match declared {:?}", actual, declared),
                        )
                        .with_context("expected", json!(declared))
                        .with_context("actual", json!(actual)),
                    );
                }
            }
        }

        if !schema.value.is_empty() {
            match node.read_values() {
                Ok(values) => {
                    let refs: Vec<&ScalarValue> = values.iter().collect();
                    errors.extend(self.check_values(
                        &schema.value,
                        &refs,
                        node.dtype().and_then(|d| d.kind()),
                        path,
                        "dataset",
                    ));
                }
                Err(e) => {
                    errors.push(ErrorRecord::new(
                        path,
                        ErrorKind::IoError,
                        format!("failed to read element values: {}", e),
                    ));
                }
            }
        }

        errors.extend(self.eval_attrs(node, &schema.common.attrs, path));
        errors.extend(self.eval_common(node, &schema.common, path));
        errors
    }

    fn eval_attrs(
        &mut self,
        node: &dyn TreeNode,
        specs: &'a [AttrSpec],
        path: &str,
    ) -> Vec<ErrorRecord> {
        let mut errors = Vec::new();
        let attrs = node.attrs();

        for spec in specs {
            let Some((_, value)) = attrs.iter().find(|(name, _)| *name == spec.name) else {
                if spec.required {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::MissingAttribute,
                            format!("required attribute '{}' is missing", spec.name),
                        )
                        .with_context("attribute", json!(spec.name)),
                    );
                }
                continue;
            };

            if let Some(declared) = &spec.dtype {
                if !declared.matches(&value.dtype) {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::DtypeMismatch,
                            format!(
                                "attribute '{}' dtype '{}' does not match declared '{}'",
                                spec.name, value.dtype, declared
                            ),
                        )
                        .with_context("attribute", json!(spec.name))
                        .with_context("expected", json!(declared.to_string()))
                        .with_context("actual", json!(value.dtype.to_string())),
                    );
                }
            }

            if let Some(declared) = &spec.shape {
                let actual = value.shape();
                if !shape_matches(declared, &actual) {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::ShapeMismatch,
                            format!(
                                "attribute '{}' shape {:?} does not match declared {:?}",
                                spec.name, actual, declared
                            ),
                        )
                        .with_context("attribute", json!(spec.name)),
                    );
                }
            }

            if !spec.value.is_empty() {
                let subject = format!("attribute '{}'", spec.name);
                errors.extend(self.check_values(
                    &spec.value,
                    &value.values(),
                    value.dtype.kind(),
                    path,
                    &subject,
                ));
            }
        }

        errors
    }

    /// Element-level constraints; each constraint reports at most the
    /// first offending element.
    fn check_values(
        &self,
        rules: &ValueRules,
        values: &[&ScalarValue],
        kind: Option<char>,
        path: &str,
        subject: &str,
    ) -> Vec<ErrorRecord> {
        let mut errors = Vec::new();

        if let Some(allowed) = &rules.enum_values {
            for (index, value) in values.iter().enumerate() {
                if !allowed.iter().any(|e| value.matches_json(e)) {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::EnumViolation,
                            format!(
                                "{} element {} at index {} is not an allowed value",
                                subject, value, index
                            ),
                        )
                        .with_context("index", json!(index)),
                    );
                    break;
                }
            }
        }

        if let Some(expected) = &rules.const_value {
            for (index, value) in values.iter().enumerate() {
                if !value.matches_json(expected) {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::ConstViolation,
                            format!(
                                "{} element {} at index {} does not equal const {}",
                                subject, value, index, expected
                            ),
                        )
                        .with_context("index", json!(index)),
                    );
                    break;
                }
            }
        }

        if let Some(min) = rules.min_length {
            errors.extend(check_string_elements(
                values,
                kind,
                path,
                subject,
                ErrorKind::MinLengthViolation,
                |len| len >= min,
                &format!("shorter than minLength {}", min),
            ));
        }

        if let Some(max) = rules.max_length {
            errors.extend(check_string_elements(
                values,
                kind,
                path,
                subject,
                ErrorKind::MaxLengthViolation,
                |len| len <= max,
                &format!("longer than maxLength {}", max),
            ));
        }

        if let Some(pattern) = &rules.pattern {
            for (index, value) in values.iter().enumerate() {
                match value.as_str() {
                    Some(s) if pattern.is_match(s) => {}
                    Some(s) => {
                        errors.push(
                            ErrorRecord::new(
                                path,
                                ErrorKind::PatternViolation,
                                format!(
                                    "{} element '{}' at index {} does not match pattern '{}'",
                                    subject,
                                    s,
                                    index,
                                    pattern.as_str()
                                ),
                            )
                            .with_context("index", json!(index)),
                        );
                        break;
                    }
                    None => {
                        errors.push(ErrorRecord::new(
                            path,
                            ErrorKind::PatternViolation,
                            format!("{} pattern check requires string data", subject),
                        ));
                        break;
                    }
                }
            }
        }

        if let Some(format) = &rules.format {
            for (index, value) in values.iter().enumerate() {
                let Some(s) = value.as_str() else {
                    errors.push(ErrorRecord::new(
                        path,
                        ErrorKind::FormatViolation,
                        format!("{} format check requires string data", subject),
                    ));
                    break;
                };
                match self.formats.check(format, s) {
                    // Unknown format names are ignored entirely.
                    None => break,
                    Some(true) => {}
                    Some(false) => {
                        errors.push(
                            ErrorRecord::new(
                                path,
                                ErrorKind::FormatViolation,
                                format!(
                                    "{} element '{}' at index {} is not a valid '{}'",
                                    subject, s, index, format
                                ),
                            )
                            .with_context("index", json!(index))
                            .with_context("format", json!(format)),
                        );
                        break;
                    }
                }
            }
        }

        errors
    }

    fn eval_common(
        &mut self,
        node: &dyn TreeNode,
        common: &'a CommonRules,
        path: &str,
    ) -> Vec<ErrorRecord> {
        let mut errors = Vec::new();

        for &branch in &common.logic.all_of {
            errors.extend(self.eval(node, branch, path));
        }

        if !common.logic.any_of.is_empty() {
            let branches: Vec<Vec<ErrorRecord>> = common
                .logic
                .any_of
                .iter()
                .map(|&branch| self.eval(node, branch, path))
                .collect();
            if branches.iter().all(|b| !b.is_empty()) {
                let count = branches.len();
                errors.push(
                    ErrorRecord::new(
                        path,
                        ErrorKind::AnyOfFailed,
                        format!("no anyOf branch matched ({} branches)", count),
                    )
                    .with_context("branches", json!(count))
                    .with_sub_errors(branches.into_iter().flatten().collect()),
                );
            }
        }

        if !common.logic.one_of.is_empty() {
            let branches: Vec<Vec<ErrorRecord>> = common
                .logic
                .one_of
                .iter()
                .map(|&branch| self.eval(node, branch, path))
                .collect();
            let matching: Vec<usize> = branches
                .iter()
                .enumerate()
                .filter(|(_, b)| b.is_empty())
                .map(|(i, _)| i)
                .collect();
            match matching.len() {
                1 => {}
                0 => {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::OneOfNoneMatched,
                            "no oneOf branch matched",
                        )
                        .with_sub_errors(branches.into_iter().flatten().collect()),
                    );
                }
                _ => {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::OneOfMultipleMatched,
                            format!(
                                "oneOf matched branches {:?} (expected exactly one)",
                                matching
                            ),
                        )
                        .with_context("matching_indices", json!(matching)),
                    );
                }
            }
        }

        if let Some(branch) = common.logic.not {
            if self.eval(node, branch, path).is_empty() {
                errors.push(ErrorRecord::new(
                    path,
                    ErrorKind::NotFailed,
                    "matched 'not' schema (should not validate)",
                ));
            }
        }

        if let Some(condition) = common.conditional.if_schema {
            // The 'if' branch runs silently; its errors only pick a side.
            let matched = self.eval(node, condition, path).is_empty();
            let branch = if matched {
                common.conditional.then_schema
            } else {
                common.conditional.else_schema
            };
            if let Some(branch) = branch {
                errors.extend(self.eval(node, branch, path));
            }
        }

        if !common.dependents.required.is_empty() || !common.dependents.schemas.is_empty() {
            let present = present_names(node);
            for (trigger, deps) in &common.dependents.required {
                if !present.contains(trigger.as_str()) {
                    continue;
                }
                for dep in deps {
                    if !present.contains(dep.as_str()) {
                        errors.push(
                            ErrorRecord::new(
                                path,
                                ErrorKind::DependentRequiredFailed,
                                format!(
                                    "'{}' is present but required dependent '{}' is missing",
                                    trigger, dep
                                ),
                            )
                            .with_context("trigger", json!(trigger))
                            .with_context("missing", json!(dep)),
                        );
                    }
                }
            }
            for (trigger, &schema) in &common.dependents.schemas {
                if !present.contains(trigger.as_str()) {
                    continue;
                }
                let branch = self.eval(node, schema, path);
                if !branch.is_empty() {
                    errors.push(
                        ErrorRecord::new(
                            path,
                            ErrorKind::DependentSchemasFailed,
                            format!("'{}' is present but its dependent schema failed", trigger),
                        )
                        .with_context("trigger", json!(trigger))
                        .with_sub_errors(branch),
                    );
                }
            }
        }

        errors
    }
}

/// Names that dependency rules test for presence: children of a group,
/// attributes of a dataset.
fn present_names(node: &dyn TreeNode) -> BTreeSet<String> {
    match node.kind() {
        NodeKind::Group => node
            .children()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect(),
        NodeKind::Dataset => node
            .attrs()
            .iter()
            .map(|(name, _)| name.to_string())
            .collect(),
    }
}

fn check_string_elements(
    values: &[&ScalarValue],
    kind: Option<char>,
    path: &str,
    subject: &str,
    error_kind: ErrorKind,
    ok: impl Fn(usize) -> bool,
    description: &str,
) -> Vec<ErrorRecord> {
    let mut errors = Vec::new();
    for (index, value) in values.iter().enumerate() {
        let Some(s) = value.as_str() else {
            errors.push(ErrorRecord::new(
                path,
                error_kind,
                format!("{} length check requires string data", subject),
            ));
            break;
        };
        let length = string_length(s, kind);
        if !ok(length) {
            errors.push(
                ErrorRecord::new(
                    path,
                    error_kind,
                    format!(
                        "{} element '{}' at index {} has length {}, {}",
                        subject, s, index, length, description
                    ),
                )
                .with_context("index", json!(index))
                .with_context("length", json!(length)),
            );
            break;
        }
    }
    errors
}

/// Character length: bytes for `S` data, Unicode code points otherwise.
fn string_length(s: &str, kind: Option<char>) -> usize {
    match kind {
        Some('S') => s.len(),
        _ => s.chars().count(),
    }
}

fn shape_matches(declared: &[i64], actual: &[u64]) -> bool {
    declared.len() == actual.len()
        && declared
            .iter()
            .zip(actual)
            .all(|(d, a)| *d == -1 || *d == *a as i64)
}

fn kind_mismatch(path: &str, expected: NodeKind, actual: NodeKind) -> ErrorRecord {
    ErrorRecord::new(
        path,
        ErrorKind::KindMismatch,
        format!("expected a {}, found a {}", expected, actual),
    )
    .with_context("expected", json!(expected.to_string()))
    .with_context("actual", json!(actual.to_string()))
}

fn join_path(path: &str, name: &str) -> String {
    if path == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", path, name)
    }
}
