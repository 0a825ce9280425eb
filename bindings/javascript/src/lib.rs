//! JavaScript/TypeScript bindings for the workflow viewer graph engine
//!
//! Thin wrapper around `wfv-core` compiled to WebAssembly.
//! ZERO logic here — all behavior from the canonical Rust implementation.
//! Structured results are returned as JSON strings.

use wasm_bindgen::prelude::*;
use wfv_core::{parser, verifier, NormalizerConfig, WorkflowGraph};

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

fn js_err(e: wfv_core::Error) -> JsError {
    JsError::new(&e.to_string())
}

/// A normalized workflow graph.
///
/// Construct once from the graph JSON, then query. Every method returns a
/// fresh copy; nothing the caller does can change the graph.
#[wasm_bindgen]
pub struct WorkflowViewerGraph {
    inner: WorkflowGraph,
}

#[wasm_bindgen]
impl WorkflowViewerGraph {
    /// @param json - graph document: `{ key: { label, parents, info_collections } }`
    /// @param config - optional JSON normalizer configuration
    /// @throws Error if the document cannot be parsed or the graph is invalid
    #[wasm_bindgen(constructor)]
    pub fn new(json: &str, config: Option<String>) -> Result<WorkflowViewerGraph, JsError> {
        let config = match config {
            Some(text) => serde_json::from_str::<NormalizerConfig>(&text)
                .map_err(|e| JsError::new(&format!("Configuration error: {}", e)))?,
            None => NormalizerConfig::default(),
        };
        let inner = WorkflowGraph::from_json_with_config(json, &config).map_err(js_err)?;
        Ok(WorkflowViewerGraph { inner })
    }

    /// @returns JSON `string[][]`, one array per level
    #[wasm_bindgen(js_name = "getNodesTopologicalSort")]
    pub fn get_nodes_topological_sort(&self) -> Result<String, JsError> {
        to_json(&self.inner.get_nodes_topological_sort())
    }

    /// @returns JSON `string[]` of canonical ids in document order
    #[wasm_bindgen(js_name = "getNodes")]
    pub fn get_nodes(&self) -> Result<String, JsError> {
        to_json(&self.inner.get_nodes())
    }

    #[wasm_bindgen(js_name = "getParents")]
    pub fn get_parents(&self, node_id: &str) -> Result<String, JsError> {
        to_json(&self.inner.get_parents(node_id).map_err(js_err)?)
    }

    #[wasm_bindgen(js_name = "getChildren")]
    pub fn get_children(&self, node_id: &str) -> Result<String, JsError> {
        to_json(&self.inner.get_children(node_id).map_err(js_err)?)
    }

    #[wasm_bindgen(js_name = "getLabel")]
    pub fn get_label(&self, node_id: &str) -> Result<String, JsError> {
        self.inner.get_label(node_id).map_err(js_err)
    }

    /// @returns JSON `{ name, input_id, node_id? }[]`
    #[wasm_bindgen(js_name = "getInputs")]
    pub fn get_inputs(&self, node_id: &str) -> Result<String, JsError> {
        to_json(&self.inner.get_inputs(node_id).map_err(js_err)?)
    }

    /// @returns JSON object mapping output id to `{ name, ... }`
    #[wasm_bindgen(js_name = "getOutputs")]
    pub fn get_outputs(&self, node_id: &str) -> Result<String, JsError> {
        to_json(&self.inner.get_outputs(node_id).map_err(js_err)?)
    }

    /// @returns JSON `string[]` of children consuming `output_id` of `node_id`
    #[wasm_bindgen(js_name = "getChildrenWithInput")]
    pub fn get_children_with_input(&self, node_id: &str, output_id: &str) -> Result<String, JsError> {
        to_json(
            &self
                .inner
                .get_children_with_input(node_id, output_id)
                .map_err(js_err)?,
        )
    }

    /// @returns producer node id of an input, or `undefined`
    #[wasm_bindgen(js_name = "getProducer")]
    pub fn get_producer(&self, node_id: &str, input_id: &str) -> Result<Option<String>, JsError> {
        self.inner.get_producer(node_id, input_id).map_err(js_err)
    }

    /// @returns canonical id for a caller key, or `undefined`
    #[wasm_bindgen(js_name = "canonicalId")]
    pub fn canonical_id(&self, raw_key: &str) -> Option<String> {
        self.inner.canonical_id(raw_key)
    }
}

/// Check a graph document without normalizing it.
///
/// @param json - graph document
/// @returns JSON string: { valid: boolean, errors: [...], warnings: [...] }
/// @throws Error if the document cannot be parsed
#[wasm_bindgen]
pub fn verify(json: &str) -> Result<String, JsError> {
    let raw = parser::parse_graph(json).map_err(js_err)?;
    let result = verifier::verify(&raw, &NormalizerConfig::default());

    let describe = |d: &&verifier::Diagnostic| {
        serde_json::json!({
            "kind": d.kind.to_string(),
            "message": d.message,
        })
    };
    let errors: Vec<serde_json::Value> = result.errors().iter().map(describe).collect();
    let warnings: Vec<serde_json::Value> = result.warnings().iter().map(describe).collect();

    to_json(&serde_json::json!({
        "valid": result.is_valid(),
        "errors": errors,
        "warnings": warnings,
    }))
}

/// Canonical id of a string under the default namespace.
#[wasm_bindgen(js_name = "hashId")]
pub fn hash_id(value: &str) -> String {
    wfv_core::canonical_id(value)
}
