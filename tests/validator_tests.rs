//! Core validation walks: kinds, members, dtypes, shapes, attributes and
//! value constraints.

use serde_json::{json, Value};
use std::io;

use treeschema::{
    validate, AttrValue, Dtype, ErrorKind, ErrorRecord, MemoryTree, NodeKind, ScalarValue,
    SchemaDoc, TreeNode,
};

fn errors(tree: Value, schema: Value) -> Vec<ErrorRecord> {
    let tree = MemoryTree::from_value(&tree).unwrap();
    let schema = SchemaDoc::from_value(&schema).unwrap();
    validate(tree.root(), &schema)
}

#[test]
fn test_simple_dataset_match() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "data": {"kind": "dataset", "dtype": "<f8", "shape": [100, 50]},
            }
        }),
        json!({
            "type": "group",
            "members": {
                "data": {"type": "dataset", "dtype": "<f8", "shape": [100, 50]},
            },
            "required": ["data"],
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);
}

#[test]
fn test_shape_mismatch_reported_at_dataset_path() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "data": {"kind": "dataset", "dtype": "<f8", "shape": [100, 50]},
            }
        }),
        json!({
            "type": "group",
            "members": {
                "data": {"type": "dataset", "dtype": "<f8", "shape": [100, 3]},
            },
            "required": ["data"],
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::ShapeMismatch);
    assert_eq!(found[0].path, "/data");
}

#[test]
fn test_pattern_members_constrain_only_matching_children() {
    let sensor = |dtype: &str| {
        json!({
            "kind": "group",
            "children": {
                "readings": {"kind": "dataset", "dtype": dtype, "shape": [5]},
            }
        })
    };
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "sensor_1": sensor("<f8"),
                "sensor_2": sensor("<f4"),
                "other": sensor("<f8"),
            }
        }),
        json!({
            "type": "group",
            "patternMembers": {
                "^sensor_[0-9]+$": {
                    "type": "group",
                    "members": {
                        "readings": {"type": "dataset", "dtype": "<f4", "shape": [-1]},
                    },
                    "required": ["readings"],
                }
            }
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::DtypeMismatch);
    assert_eq!(found[0].path, "/sensor_1/readings");
}

#[test]
fn test_recursive_ref_terminates_on_nested_data() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "observables": {
                    "kind": "group",
                    "children": {
                        "observables": {
                            "kind": "group",
                            "children": {
                                "observables": {"kind": "group"},
                            }
                        }
                    }
                }
            }
        }),
        json!({
            "type": "group",
            "members": {
                "observables": {"$ref": "#/$defs/observables"},
            },
            "required": ["observables"],
            "$defs": {
                "observables": {
                    "type": "group",
                    "members": {
                        "observables": {"$ref": "#/$defs/observables"},
                    }
                }
            }
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);
}

#[test]
fn test_one_of_mutual_exclusion_reports_matching_indices() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "raw_data": {"kind": "dataset", "dtype": "<f8", "shape": [10]},
                "processed_data": {"kind": "dataset", "dtype": "<f8", "shape": [10]},
            }
        }),
        json!({
            "type": "group",
            "oneOf": [
                {"members": {"raw_data": {"type": "dataset", "dtype": "<f8"}}, "required": ["raw_data"]},
                {"members": {"processed_data": {"type": "dataset", "dtype": "<f8"}}, "required": ["processed_data"]},
            ]
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::OneOfMultipleMatched);
    assert_eq!(found[0].context["matching_indices"], json!([0, 1]));
}

#[test]
fn test_conditional_then_requires_attribute() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "data": {
                    "kind": "dataset",
                    "dtype": "<f4",
                    "shape": [10],
                    "attrs": {"sensor_type": "temperature"},
                }
            }
        }),
        json!({
            "type": "group",
            "members": {
                "data": {
                    "type": "dataset",
                    "if": {"attrs": [{"name": "sensor_type", "const": "temperature", "required": true}]},
                    "then": {"attrs": [{"name": "units", "required": true}]},
                }
            }
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::MissingAttribute);
    assert_eq!(found[0].context["attribute"], json!("units"));
}

#[test]
fn test_kind_mismatch_stops_subtree() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "data": {"kind": "group", "children": {"nested": {"kind": "group"}}},
            }
        }),
        json!({
            "type": "group",
            "members": {
                "data": {
                    "type": "dataset",
                    "dtype": "<f8",
                    "attrs": [{"name": "units", "required": true}],
                }
            }
        }),
    );
    // Only the kind mismatch: no dtype or attribute errors follow.
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::KindMismatch);
    assert_eq!(found[0].path, "/data");
}

#[test]
fn test_missing_required_member() {
    let found = errors(
        json!({"kind": "group"}),
        json!({
            "type": "group",
            "members": {"data": {"type": "dataset", "dtype": "<f8"}},
            "required": ["data"],
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::MissingMember);
    assert_eq!(found[0].path, "/");
    assert_eq!(found[0].context["member"], json!("data"));
}

#[test]
fn test_extra_members_and_attrs_are_open_world() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "data": {"kind": "dataset", "dtype": "<f8", "shape": [3]},
                "undeclared": {"kind": "group"},
            },
            "attrs": {"undeclared_attr": 42},
        }),
        json!({
            "type": "group",
            "members": {"data": {"type": "dataset", "dtype": "<f8"}},
            "required": ["data"],
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);
}

#[test]
fn test_compound_dtype_match_and_mismatch() {
    let tree = json!({
        "kind": "group",
        "children": {
            "attachments": {
                "kind": "dataset",
                "dtype": {
                    "formats": [
                        {"name": "file", "format": "S128", "offset": 0},
                        {"name": "title", "format": "S128", "offset": 128},
                    ],
                    "itemsize": 256,
                },
                "shape": [2],
            }
        }
    });

    // Legacy list form computes the same packed layout.
    let found = errors(
        tree.clone(),
        json!({
            "type": "group",
            "members": {
                "attachments": {
                    "type": "dataset",
                    "dtype": [
                        {"name": "file", "dtype": "S128"},
                        {"name": "title", "dtype": "S128"},
                    ],
                }
            }
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);

    let found = errors(
        tree,
        json!({
            "type": "group",
            "members": {
                "attachments": {
                    "type": "dataset",
                    "dtype": [
                        {"name": "file", "dtype": "S128"},
                        {"name": "caption", "dtype": "S128"},
                    ],
                }
            }
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::DtypeMismatch);
}

#[test]
fn test_attribute_dtype_and_shape() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "data": {
                    "kind": "dataset",
                    "dtype": "<f4",
                    "shape": [10],
                    "attrs": {
                        "valid_range": {"dtype": "<f4", "value": [0.0, 100.0]},
                    }
                }
            }
        }),
        json!({
            "type": "group",
            "members": {
                "data": {
                    "type": "dataset",
                    "dtype": "<f4",
                    "attrs": [
                        {"name": "valid_range", "dtype": "<f4", "shape": [2], "required": true},
                        {"name": "fill_value", "dtype": "<f4", "required": false},
                    ],
                }
            }
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);
}

#[test]
fn test_enum_and_const_on_dataset_values() {
    let base = json!({
        "kind": "group",
        "children": {
            "flags": {"kind": "dataset", "dtype": "<i8", "shape": [3], "values": [1, 2, 3]},
        }
    });

    let found = errors(
        base.clone(),
        json!({
            "type": "group",
            "members": {"flags": {"type": "dataset", "enum": [1, 2]}},
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::EnumViolation);
    assert_eq!(found[0].context["index"], json!(2));

    let found = errors(
        base,
        json!({
            "type": "group",
            "members": {"flags": {"type": "dataset", "const": 1}},
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::ConstViolation);
}

#[test]
fn test_string_constraints_on_dataset_values() {
    let tree = json!({
        "kind": "group",
        "children": {
            "labels": {
                "kind": "dataset",
                "dtype": "U16",
                "shape": [2],
                "values": ["sensor_1", "xx"],
            }
        }
    });

    let found = errors(
        tree.clone(),
        json!({
            "type": "group",
            "members": {"labels": {"type": "dataset", "minLength": 3}},
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::MinLengthViolation);
    assert_eq!(found[0].context["index"], json!(1));

    let found = errors(
        tree.clone(),
        json!({
            "type": "group",
            "members": {"labels": {"type": "dataset", "pattern": "^sensor_"}},
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::PatternViolation);

    // Search semantics: an unanchored pattern matches a substring.
    let found = errors(
        tree,
        json!({
            "type": "group",
            "members": {"labels": {"type": "dataset", "pattern": "x"}},
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].context["index"], json!(0));
}

#[test]
fn test_format_constraint_and_unknown_format() {
    let tree = json!({
        "kind": "group",
        "children": {
            "stamps": {
                "kind": "dataset",
                "dtype": "U32",
                "shape": [1],
                "values": ["not a timestamp"],
            }
        }
    });

    let found = errors(
        tree.clone(),
        json!({
            "type": "group",
            "members": {"stamps": {"type": "dataset", "format": "date-time"}},
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::FormatViolation);

    // Unknown format names are ignored, not failed.
    let found = errors(
        tree,
        json!({
            "type": "group",
            "members": {"stamps": {"type": "dataset", "format": "postal-code"}},
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);
}

#[test]
fn test_attribute_value_constraints_elementwise() {
    let found = errors(
        json!({
            "kind": "group",
            "attrs": {
                "stations": {"dtype": "U8", "value": ["alpha", "beta", "x"]},
            }
        }),
        json!({
            "type": "group",
            "attrs": [{"name": "stations", "minLength": 2, "required": true}],
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::MinLengthViolation);
    assert_eq!(found[0].context["index"], json!(2));
}

/// A dataset whose element reader always fails.
struct UnreadableDataset {
    dtype: Dtype,
    shape: Vec<u64>,
}

impl TreeNode for UnreadableDataset {
    fn kind(&self) -> NodeKind {
        NodeKind::Dataset
    }
    fn children(&self) -> Vec<(&str, &dyn TreeNode)> {
        Vec::new()
    }
    fn attrs(&self) -> Vec<(&str, &AttrValue)> {
        Vec::new()
    }
    fn dtype(&self) -> Option<&Dtype> {
        Some(&self.dtype)
    }
    fn shape(&self) -> Option<&[u64]> {
        Some(&self.shape)
    }
    fn read_values(&self) -> io::Result<Vec<ScalarValue>> {
        Err(io::Error::new(io::ErrorKind::Other, "truncated chunk"))
    }
}

#[test]
fn test_read_failure_is_contained_to_value_constraints() {
    let node = UnreadableDataset {
        dtype: Dtype::parse("<i4").unwrap(),
        shape: vec![4],
    };
    let schema = SchemaDoc::from_value(&json!({
        "type": "dataset",
        "dtype": "<i8",
        "enum": [1, 2, 3],
        "attrs": [{"name": "units", "required": true}],
    }))
    .unwrap();

    let found = validate(&node, &schema);
    let kinds: Vec<ErrorKind> = found.iter().map(|e| e.kind).collect();
    // The dtype check, the read failure, and the attribute check all
    // still report; only the enum check is abandoned.
    assert_eq!(
        kinds,
        vec![
            ErrorKind::DtypeMismatch,
            ErrorKind::IoError,
            ErrorKind::MissingAttribute,
        ]
    );
}

#[test]
fn test_error_ordering_is_local_then_attrs_then_members() {
    let found = errors(
        json!({
            "kind": "group",
            "children": {
                "data": {"kind": "dataset", "dtype": "<f4", "shape": [2, 2]},
            }
        }),
        json!({
            "type": "group",
            "attrs": [{"name": "version", "required": true}],
            "members": {
                "data": {"type": "dataset", "dtype": "<f8", "shape": [3, -1]},
            },
            "required": ["data", "extra"],
        }),
    );
    let kinds: Vec<ErrorKind> = found.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::MissingAttribute,
            ErrorKind::MissingMember,
            ErrorKind::DtypeMismatch,
            ErrorKind::ShapeMismatch,
        ]
    );
    assert_eq!(found[1].context["member"], json!("extra"));
}
