#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;
use wfv_wasm::{hash_id, WorkflowViewerGraph};

const DIAMOND: &str = r#"{
    "A": {"label": "Start", "parents": []},
    "B": {"label": "Left", "parents": ["A"]},
    "C": {"label": "Right", "parents": ["A"]},
    "D": {"label": "Join", "parents": ["B", "C"]}
}"#;

#[wasm_bindgen_test]
fn levels_and_labels() {
    let graph = WorkflowViewerGraph::new(DIAMOND, None).ok().unwrap();
    let levels: Vec<Vec<String>> =
        serde_json::from_str(&graph.get_nodes_topological_sort().ok().unwrap()).unwrap();
    assert_eq!(levels.len(), 3);
    assert_eq!(levels[0], vec![hash_id("A")]);

    let join = graph.canonical_id("D").unwrap();
    assert_eq!(graph.get_label(&join).ok().unwrap(), "Join");
}

#[wasm_bindgen_test]
fn verbatim_config() {
    let graph = WorkflowViewerGraph::new(DIAMOND, Some(r#"{"id_scheme": "verbatim"}"#.into())).ok().unwrap();
    let parents: Vec<String> = serde_json::from_str(&graph.get_parents("D").ok().unwrap()).unwrap();
    assert_eq!(parents, vec!["B", "C"]);
}

#[wasm_bindgen_test]
fn cycle_is_rejected() {
    let cyclic = r#"{"A": {"label": "A", "parents": ["B"]}, "B": {"label": "B", "parents": ["A"]}}"#;
    assert!(WorkflowViewerGraph::new(cyclic, None).is_err());
}
