//! Graph query service — read-only accessors over a normalized graph
//!
//! Every accessor returns an owned copy, so no caller can observe or cause
//! mutation of the canonical structure. Ids passed in are canonical ids;
//! use [`WorkflowGraph::canonical_id`] to translate a caller's raw key.

use tracing::instrument;

use crate::config::NormalizerConfig;
use crate::hash::IdCanonicalizer;
use crate::model::{CanonicalNode, InputDescriptor, OrderedMap, OutputDescriptor, RawGraph};
use crate::normalizer::{self, NormalizedGraph};
use crate::{parser, Error, Result};

/// A normalized workflow graph ready to serve queries
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowGraph {
    graph: NormalizedGraph,
}

impl WorkflowGraph {
    /// Normalize `raw` with the default configuration
    pub fn new(raw: &RawGraph) -> Result<Self> {
        Self::with_config(raw, &NormalizerConfig::default())
    }

    pub fn with_config(raw: &RawGraph, config: &NormalizerConfig) -> Result<Self> {
        let graph = normalizer::normalize(raw, config)?;
        Ok(Self { graph })
    }

    /// Normalize with an injected id strategy (the config's `id_scheme` is ignored)
    pub fn with_canonicalizer(
        raw: &RawGraph,
        config: &NormalizerConfig,
        canonicalizer: &dyn IdCanonicalizer,
    ) -> Result<Self> {
        let graph = normalizer::normalize_with(raw, config, canonicalizer)?;
        Ok(Self { graph })
    }

    /// Parse and normalize a JSON graph document
    #[instrument(skip_all)]
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(&parser::parse_graph(json)?)
    }

    pub fn from_json_with_config(json: &str, config: &NormalizerConfig) -> Result<Self> {
        Self::with_config(&parser::parse_graph(json)?, config)
    }

    /// Read-only view of the underlying normalized graph
    pub fn normalized(&self) -> &NormalizedGraph {
        &self.graph
    }

    /// SHA-256 fingerprint of the canonical graph
    pub fn fingerprint(&self) -> Result<String> {
        normalizer::fingerprint(&self.graph)
    }

    pub fn len(&self) -> usize {
        self.graph.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.nodes.is_empty()
    }

    // ── Level table ────────────────────────────────────

    /// Levels ascending from 0; ids sorted lexicographically within a level
    pub fn get_nodes_topological_sort(&self) -> Vec<Vec<String>> {
        self.graph.levels.clone()
    }

    pub fn get_level(&self, node_id: &str) -> Result<usize> {
        Ok(self.node(node_id)?.level)
    }

    // ── Node lookups ───────────────────────────────────

    /// All canonical ids in the order nodes appeared in the raw graph
    pub fn get_nodes(&self) -> Vec<String> {
        self.graph.nodes.keys().map(str::to_string).collect()
    }

    /// Canonical id of a raw key, if the key was part of the input
    pub fn canonical_id(&self, raw_key: &str) -> Option<String> {
        self.graph.keys.get(raw_key).cloned()
    }

    /// Accepts either a canonical id or a raw key
    pub fn resolve(&self, id_or_key: &str) -> Result<String> {
        if self.graph.nodes.contains_key(id_or_key) {
            return Ok(id_or_key.to_string());
        }
        self.canonical_id(id_or_key)
            .ok_or_else(|| Error::NodeNotFound(id_or_key.to_string()))
    }

    pub fn get_node(&self, node_id: &str) -> Result<CanonicalNode> {
        self.node(node_id).cloned()
    }

    /// The caller's original key for a canonical id
    pub fn get_key(&self, node_id: &str) -> Result<String> {
        Ok(self.node(node_id)?.key.clone())
    }

    pub fn get_label(&self, node_id: &str) -> Result<String> {
        Ok(self.node(node_id)?.label.clone())
    }

    pub fn get_parents(&self, node_id: &str) -> Result<Vec<String>> {
        Ok(self.node(node_id)?.parents.clone())
    }

    pub fn get_children(&self, node_id: &str) -> Result<Vec<String>> {
        Ok(self.node(node_id)?.children.clone())
    }

    pub fn get_inputs(&self, node_id: &str) -> Result<Vec<InputDescriptor>> {
        Ok(self.node(node_id)?.inputs.clone())
    }

    pub fn get_outputs(&self, node_id: &str) -> Result<OrderedMap<OutputDescriptor>> {
        Ok(self.node(node_id)?.outputs.clone())
    }

    pub fn roots(&self) -> Vec<String> {
        self.graph
            .nodes
            .values()
            .filter(|n| n.parents.is_empty())
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn leaves(&self) -> Vec<String> {
        self.graph
            .nodes
            .values()
            .filter(|n| n.children.is_empty())
            .map(|n| n.id.clone())
            .collect()
    }

    // ── Input/output cross-references ──────────────────

    /// Children of `node_id` with an input wired to its output `output_id`
    ///
    /// Children keep their derived order; a child with several matching
    /// inputs is listed once.
    pub fn get_children_with_input(&self, node_id: &str, output_id: &str) -> Result<Vec<String>> {
        let node = self.node(node_id)?;
        let mut consumers = Vec::new();
        for child_id in &node.children {
            let child = self.node(child_id)?;
            let consumes = child
                .inputs
                .iter()
                .any(|input| input.source() == Some(node_id) && input.input_id == output_id);
            if consumes {
                consumers.push(child_id.clone());
            }
        }
        Ok(consumers)
    }

    /// Producer node feeding input `input_id` of `node_id`
    ///
    /// `Ok(None)` when the input exists but is not fed by a tracked node.
    pub fn get_producer(&self, node_id: &str, input_id: &str) -> Result<Option<String>> {
        let node = self.node(node_id)?;
        let input = node
            .inputs
            .iter()
            .find(|input| input.input_id == input_id)
            .ok_or_else(|| {
                Error::NodeNotFound(format!("input '{}' on node '{}'", input_id, node_id))
            })?;
        Ok(input.source().map(str::to_string))
    }

    fn node(&self, node_id: &str) -> Result<&CanonicalNode> {
        self.graph
            .nodes
            .get(node_id)
            .ok_or_else(|| Error::NodeNotFound(node_id.to_string()))
    }
}
