//! Invariants of the validation engine: determinism, pattern
//! resolution, cycle safety, combinator algebra, and the generator
//! round-trip contract.

use rstest::rstest;
use serde_json::{json, Value};

use treeschema::{generate, validate, ErrorKind, ErrorRecord, MemoryTree, SchemaDoc};

fn errors(tree: &Value, schema: &Value) -> Vec<ErrorRecord> {
    let tree = MemoryTree::from_value(tree).unwrap();
    let schema = SchemaDoc::from_value(schema).unwrap();
    validate(tree.root(), &schema)
}

#[test]
fn test_determinism() {
    let tree = json!({
        "kind": "group",
        "children": {
            "a": {"kind": "dataset", "dtype": "<f4", "shape": [2]},
            "b": {"kind": "group", "children": {
                "c": {"kind": "dataset", "dtype": "<i4", "shape": [3]},
            }},
        }
    });
    let schema = json!({
        "type": "group",
        "members": {
            "a": {"type": "dataset", "dtype": "<f8", "shape": [3]},
            "b": {"type": "group", "members": {
                "c": {"type": "dataset", "dtype": "<i8"},
            }},
        },
        "required": ["a", "b", "missing"],
        "anyOf": [
            {"required": ["never"]},
        ],
    });

    let first = errors(&tree, &schema);
    let second = errors(&tree, &schema);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_schema_absence_neutrality() {
    // A schema with none of the checked keys contributes zero errors.
    let tree = json!({
        "kind": "group",
        "children": {
            "anything": {"kind": "dataset", "dtype": ">i2", "shape": [7, 7],
                         "attrs": {"whatever": 1}},
        },
        "attrs": {"extra": "attr"},
    });
    assert!(errors(&tree, &json!({"type": "group"})).is_empty());
    assert!(errors(
        &tree,
        &json!({"type": "group", "members": {"anything": {"type": "dataset"}}})
    )
    .is_empty());
}

#[test]
fn test_literal_member_suppresses_patterns() {
    // The literal schema accepts <f8; the also-matching pattern would
    // reject it. The literal must win outright.
    let found = errors(
        &json!({
            "kind": "group",
            "children": {
                "special": {"kind": "dataset", "dtype": "<f8", "shape": [1]},
                "special_2": {"kind": "dataset", "dtype": "<i4", "shape": [1]},
            }
        }),
        &json!({
            "type": "group",
            "members": {
                "special": {"type": "dataset", "dtype": "<f8"},
            },
            "patternMembers": {
                "^special": {"type": "dataset", "dtype": "<i4"},
            }
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);
}

#[test]
fn test_all_matching_patterns_apply_conjunctively() {
    let found = errors(
        &json!({
            "kind": "group",
            "children": {
                "sensor_raw": {"kind": "dataset", "dtype": "<f8", "shape": [4]},
            }
        }),
        &json!({
            "type": "group",
            "patternMembers": {
                "^sensor_": {"type": "dataset", "dtype": "<f8"},
                "_raw$": {"type": "dataset", "shape": [9]},
            }
        }),
    );
    // Both patterns matched; only the second one's shape check fails.
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::ShapeMismatch);
}

#[test]
fn test_cycle_safety_with_errors() {
    // A $ref cycle over a finite tree terminates with a finite list.
    let found = errors(
        &json!({
            "kind": "group",
            "children": {
                "observables": {
                    "kind": "group",
                    "children": {
                        "observables": {
                            "kind": "group",
                            "children": {
                                "stray": {"kind": "dataset", "dtype": "<u2", "shape": [1]},
                            }
                        }
                    }
                }
            }
        }),
        &json!({
            "type": "group",
            "members": {"observables": {"$ref": "#/$defs/observables"}},
            "$defs": {
                "observables": {
                    "type": "group",
                    "members": {
                        "observables": {"$ref": "#/$defs/observables"},
                        "stray": {"type": "dataset", "dtype": "<u4"},
                    }
                }
            }
        }),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::DtypeMismatch);
    assert_eq!(found[0].path, "/observables/observables/stray");
}

#[rstest]
#[case::matching(json!({
    "kind": "group",
    "children": {"data": {"kind": "dataset", "dtype": "<f8", "shape": [1]}}
}))]
#[case::missing_member(json!({"kind": "group"}))]
#[case::wrong_dtype(json!({
    "kind": "group",
    "children": {"data": {"kind": "dataset", "dtype": "<i4", "shape": [1]}}
}))]
fn test_not_duality(#[case] tree: Value) {
    let inner = json!({
        "members": {"data": {"type": "dataset", "dtype": "<f8"}},
        "required": ["data"],
    });
    let mut plain = inner.as_object().unwrap().clone();
    plain.insert("type".into(), json!("group"));
    let plain = Value::Object(plain);
    let negated = json!({"type": "group", "not": inner});

    let direct_fails = !errors(&tree, &plain).is_empty();
    let negated_ok = errors(&tree, &negated).is_empty();
    assert_eq!(direct_fails, negated_ok);
}

#[test]
fn test_all_of_associativity() {
    let tree = json!({
        "kind": "group",
        "children": {
            "a": {"kind": "dataset", "dtype": "<f4", "shape": [1]},
        }
    });
    let s1 = json!({"required": ["a"]});
    let s2 = json!({"members": {"a": {"type": "dataset", "dtype": "<f8"}}});
    let s3 = json!({"required": ["b"]});

    let nested = json!({"type": "group", "allOf": [s1.clone(), {"allOf": [s2.clone(), s3.clone()]}]});
    let flat = json!({"type": "group", "allOf": [s1, s2, s3]});

    assert_eq!(errors(&tree, &nested), errors(&tree, &flat));
}

#[rstest]
#[case::rank1(vec![5])]
#[case::rank2(vec![4, 6])]
#[case::rank3(vec![2, 3, 4])]
fn test_wildcard_shape_matches_any_extents(#[case] shape: Vec<u64>) {
    let wildcard: Vec<i64> = shape.iter().map(|_| -1).collect();
    let found = errors(
        &json!({
            "kind": "group",
            "children": {
                "data": {"kind": "dataset", "dtype": "<f8", "shape": shape},
            }
        }),
        &json!({
            "type": "group",
            "members": {"data": {"type": "dataset", "shape": wildcard}},
        }),
    );
    assert!(found.is_empty(), "unexpected errors: {:?}", found);
}

#[test]
fn test_generator_round_trip() {
    let tree = MemoryTree::from_value(&json!({
        "kind": "group",
        "attrs": {
            "product_id": "A",
            "icd_version": {"dtype": "S5", "value": "1.0.0"},
        },
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
            },
            "observables": {
                "kind": "group",
                "children": {
                    "data": {
                        "kind": "dataset",
                        "dtype": "<f4",
                        "shape": [3],
                        "values": [1.0, 2.0, 3.0],
                        "attrs": {
                            "valid_range": {"dtype": "<f4", "value": [0.0, 100.0]},
                        }
                    }
                }
            },
            "labels": {
                "kind": "dataset",
                "dtype": "U16",
                "shape": [2],
                "values": ["sensor_1", "sensor_2"],
            },
        }
    }))
    .unwrap();

    let generated = generate::schema_for(tree.root());
    let schema = SchemaDoc::from_value(&generated).unwrap();
    let found = validate(tree.root(), &schema);
    assert!(found.is_empty(), "round trip failed: {:?}", found);
}

#[test]
fn test_generated_schema_rejects_a_different_tree() {
    let original = MemoryTree::from_value(&json!({
        "kind": "group",
        "children": {
            "data": {"kind": "dataset", "dtype": "<f8", "shape": [10]},
        }
    }))
    .unwrap();
    let schema = SchemaDoc::from_value(&generate::schema_for(original.root())).unwrap();

    let other = MemoryTree::from_value(&json!({
        "kind": "group",
        "children": {
            "data": {"kind": "dataset", "dtype": "<f4", "shape": [10]},
        }
    }))
    .unwrap();
    let found = validate(other.root(), &schema);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ErrorKind::DtypeMismatch);
}

#[test]
fn test_file_based_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let tree_path = dir.path().join("tree.json");
    let schema_path = dir.path().join("schema.json");
    std::fs::write(
        &tree_path,
        serde_json::to_string_pretty(&json!({
            "kind": "group",
            "children": {
                "data": {"kind": "dataset", "dtype": "<f8", "shape": [100, 50]},
            }
        }))
        .unwrap(),
    )
    .unwrap();
    std::fs::write(
        &schema_path,
        serde_json::to_string_pretty(&json!({
            "type": "group",
            "members": {
                "data": {"type": "dataset", "dtype": "<f8", "shape": [100, -1]},
            },
            "required": ["data"],
        }))
        .unwrap(),
    )
    .unwrap();

    let tree = MemoryTree::from_path(&tree_path).unwrap();
    let schema = SchemaDoc::from_path(&schema_path).unwrap();
    assert!(treeschema::is_valid(tree.root(), &schema));
}

#[test]
fn test_error_records_serialize_for_machine_output() {
    let found = errors(
        &json!({"kind": "group"}),
        &json!({
            "type": "group",
            "required": ["data"],
        }),
    );
    let rendered = serde_json::to_value(&found).unwrap();
    assert_eq!(rendered[0]["kind"], json!("MissingMember"));
    assert_eq!(rendered[0]["path"], json!("/"));
}
