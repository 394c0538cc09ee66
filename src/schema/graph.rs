//! Reference-graph diagnostics
//!
//! Builds a directed graph over the document root and its `$defs`
//! entries, with an edge for every `$ref`, and reports the strongly
//! connected components that form genuine cycles. Purely diagnostic:
//! termination at validation time is guaranteed by the walker's cycle
//! guard, not by this analysis.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;
use std::collections::HashMap;

const ROOT: &str = "#";

/// Cycle groups among the root schema and its `$defs`, each group listed
/// as the pointers participating in the cycle.
pub(crate) fn ref_cycles(document: &Value) -> Vec<Vec<String>> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices: HashMap<String, NodeIndex> = HashMap::new();

    let mut index_of = |graph: &mut DiGraph<String, ()>, name: &str| -> NodeIndex {
        *indices
            .entry(name.to_string())
            .or_insert_with(|| graph.add_node(name.to_string()))
    };

    let root_idx = index_of(&mut graph, ROOT);
    let mut def_names: Vec<String> = Vec::new();
    if let Some(defs) = document.get("$defs").and_then(Value::as_object) {
        for name in defs.keys() {
            let pointer = format!("#/$defs/{}", name);
            index_of(&mut graph, &pointer);
            def_names.push(name.clone());
        }
    }

    // Edges out of the root body (everything but the $defs subtree).
    if let Some(obj) = document.as_object() {
        for (key, value) in obj {
            if key == "$defs" {
                continue;
            }
            for target in collect_ref_targets(value) {
                let to = index_of(&mut graph, &target);
                graph.add_edge(root_idx, to, ());
            }
        }
    }

    // Edges out of each definition.
    for name in &def_names {
        let pointer = format!("#/$defs/{}", name);
        let from = index_of(&mut graph, &pointer);
        if let Some(body) = document.get("$defs").and_then(|d| d.get(name)) {
            for target in collect_ref_targets(body) {
                let to = index_of(&mut graph, &target);
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut cycles = Vec::new();
    for scc in kosaraju_scc(&graph) {
        let is_cycle = scc.len() > 1
            || scc
                .first()
                .map(|&idx| graph.find_edge(idx, idx).is_some())
                .unwrap_or(false);
        if is_cycle {
            let mut group: Vec<String> = scc
                .into_iter()
                .map(|idx| graph[idx].clone())
                .collect();
            group.sort();
            cycles.push(group);
        }
    }
    cycles.sort();
    cycles
}

/// Collect every `$ref` under a value, truncated to its owning `$defs`
/// entry so that a pointer deeper inside a definition still counts as an
/// edge to that definition.
fn collect_ref_targets(value: &Value) -> Vec<String> {
    let mut targets = Vec::new();
    collect(value, &mut targets);
    targets
}

fn collect(value: &Value, targets: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            if let Some(pointer) = obj.get("$ref").and_then(Value::as_str) {
                targets.push(owning_entry(pointer));
            }
            for child in obj.values() {
                collect(child, targets);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, targets);
            }
        }
        _ => {}
    }
}

fn owning_entry(pointer: &str) -> String {
    if let Some(rest) = pointer.strip_prefix("#/$defs/") {
        let name = rest.split('/').next().unwrap_or(rest);
        format!("#/$defs/{}", name)
    } else {
        ROOT.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_self_reference_is_a_cycle() {
        let document = json!({
            "type": "group",
            "members": {"observables": {"$ref": "#/$defs/observables"}},
            "$defs": {
                "observables": {
                    "type": "group",
                    "patternMembers": {
                        "^observables$": {"$ref": "#/$defs/observables"}
                    }
                }
            }
        });
        let cycles = ref_cycles(&document);
        assert_eq!(cycles, vec![vec!["#/$defs/observables".to_string()]]);
    }

    #[test]
    fn test_acyclic_defs_report_nothing() {
        let document = json!({
            "type": "group",
            "members": {"a": {"$ref": "#/$defs/a"}},
            "$defs": {
                "a": {"type": "group", "members": {"b": {"$ref": "#/$defs/b"}}},
                "b": {"type": "dataset", "dtype": "<f8"},
            }
        });
        assert!(ref_cycles(&document).is_empty());
    }

    #[test]
    fn test_mutual_reference_grouped() {
        let document = json!({
            "type": "group",
            "$defs": {
                "a": {"type": "group", "members": {"b": {"$ref": "#/$defs/b"}}},
                "b": {"type": "group", "members": {"a": {"$ref": "#/$defs/a"}}},
            }
        });
        let cycles = ref_cycles(&document);
        assert_eq!(cycles.len(), 1);
        assert_eq!(
            cycles[0],
            vec!["#/$defs/a".to_string(), "#/$defs/b".to_string()]
        );
    }
}
