//! Graph normalizer — converts a raw graph to its canonical, query-ready form
//!
//! # Pipeline
//!
//! `RawGraph → copy → verify → canonicalize ids → derive children → level`
//!
//! # Guarantees
//!
//! - **Isolated**: the caller's graph is copied and never aliased
//! - **Deterministic**: same input always produces the same canonical graph
//! - **Inverse-consistent**: `B ∈ A.children ⇔ A ∈ B.parents`, no duplicate children
//! - **Leveled**: every node sits exactly one level below its deepest parent

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::config::NormalizerConfig;
use crate::hash::IdCanonicalizer;
use crate::model::{CanonicalNode, InputDescriptor, OrderedMap, RawGraph};
use crate::verifier;
use crate::{Error, Result};

/// A canonicalized graph plus its topological level table
///
/// Immutable once built; [`crate::WorkflowGraph`] hands out copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedGraph {
    pub(crate) levels: Vec<Vec<String>>,
    pub(crate) nodes: OrderedMap<CanonicalNode>,
    /// Raw key → canonical id
    #[serde(skip)]
    pub(crate) keys: OrderedMap<String>,
}

// ── Public API ─────────────────────────────────────────────

/// Normalize a raw graph with the canonicalizer `config` selects
pub fn normalize(raw: &RawGraph, config: &NormalizerConfig) -> Result<NormalizedGraph> {
    config.validate()?;
    let canonicalizer = config.canonicalizer();
    normalize_with(raw, config, canonicalizer.as_ref())
}

/// Normalize a raw graph with an explicit canonicalizer
///
/// # Errors
/// Returns `InvalidGraph` if verification finds an error (or any warning
/// when `warnings_as_errors` is set), or if leveling exceeds the
/// configured relaxation bound.
#[instrument(skip_all, fields(nodes = raw.len()))]
pub fn normalize_with(
    raw: &RawGraph,
    config: &NormalizerConfig,
    canonicalizer: &dyn IdCanonicalizer,
) -> Result<NormalizedGraph> {
    let raw = raw.clone();

    let report = verifier::verify_with(&raw, canonicalizer, config.reject_collisions);
    for diagnostic in report.warnings() {
        warn!(kind = %diagnostic.kind, "{}", diagnostic.message);
    }
    if !report.is_valid() {
        return Err(Error::InvalidGraph(report.error_summary()));
    }
    if config.warnings_as_errors && !report.warnings().is_empty() {
        let summary = report
            .warnings()
            .iter()
            .map(|d| format!("[{}] {}", d.kind, d.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::InvalidGraph(summary));
    }

    let limit = config.relaxation_limit(raw.len());
    let (mut nodes, keys) = canonicalize_ids(raw, canonicalizer);
    derive_children(&mut nodes);
    let levels = assign_levels(&mut nodes, limit)?;

    debug!(nodes = nodes.len(), levels = levels.len(), "graph normalized");
    Ok(NormalizedGraph {
        levels,
        nodes,
        keys,
    })
}

/// SHA-256 over the canonical JSON serialization, hex encoded
pub fn fingerprint(graph: &NormalizedGraph) -> Result<String> {
    let canonical = serde_json::to_vec(graph)
        .map_err(|e| Error::InvalidGraph(format!("cannot serialize graph: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

// ── Step 1: Id canonicalization ────────────────────────────

/// Rewrite every node key, parent reference, input reference and output key
///
/// A node whose key collides with an earlier one replaces it in place.
fn canonicalize_ids(
    raw: RawGraph,
    canonicalizer: &dyn IdCanonicalizer,
) -> (OrderedMap<CanonicalNode>, OrderedMap<String>) {
    let mut nodes = OrderedMap::with_capacity(raw.len());
    let mut keys = OrderedMap::with_capacity(raw.len());

    for (key, node) in raw {
        let id = canonicalizer.canonicalize(&key);

        let parents = node
            .parents
            .iter()
            .map(|p| canonicalizer.canonicalize(p))
            .collect();

        let inputs = node
            .info_collections
            .inputs
            .into_iter()
            .map(|input| {
                let node_id = input.source().map(|s| canonicalizer.canonicalize(s));
                InputDescriptor {
                    input_id: canonicalizer.canonicalize(&input.input_id),
                    node_id,
                    ..input
                }
            })
            .collect();

        let outputs = node
            .info_collections
            .outputs
            .into_iter()
            .map(|(output_id, output)| (canonicalizer.canonicalize(&output_id), output))
            .collect();

        keys.insert(key.clone(), id.clone());
        nodes.insert(
            id.clone(),
            CanonicalNode {
                id,
                key,
                label: node.label,
                level: 0,
                parents,
                children: Vec::new(),
                inputs,
                outputs,
            },
        );
    }

    (nodes, keys)
}

// ── Step 2: Children derivation ────────────────────────────

fn derive_children(nodes: &mut OrderedMap<CanonicalNode>) {
    let edges: Vec<(String, String)> = nodes
        .values()
        .flat_map(|node| {
            node.parents
                .iter()
                .map(move |parent| (parent.clone(), node.id.clone()))
        })
        .collect();

    for (parent, child) in edges {
        if let Some(parent) = nodes.get_mut(&parent) {
            if !parent.children.contains(&child) {
                parent.children.push(child);
            }
        }
    }
}

// ── Step 3: Topological leveling ───────────────────────────

/// Assign levels by FIFO relaxation and group nodes into the level table
///
/// Every node starts at level 0. The queue is seeded with the children of
/// each root at level 1; popping `(node, suggested)` commits the suggestion
/// only if it raises the node's level, then offers `level + 1` to each
/// child. Levels only increase, so on a DAG the loop converges to
/// `1 + max(parent levels)`. `limit` caps the number of commits.
fn assign_levels(
    nodes: &mut OrderedMap<CanonicalNode>,
    limit: usize,
) -> Result<Vec<Vec<String>>> {
    let mut committed: HashMap<String, usize> =
        nodes.keys().map(|id| (id.to_string(), 0)).collect();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();

    for root in nodes.values().filter(|n| n.parents.is_empty()) {
        for child in &root.children {
            queue.push_back((child.as_str(), 1));
        }
    }

    let mut relaxations = 0usize;
    while let Some((id, suggested)) = queue.pop_front() {
        let Some(level) = committed.get_mut(id) else {
            continue;
        };
        if suggested <= *level {
            continue;
        }

        relaxations += 1;
        if relaxations > limit {
            return Err(Error::InvalidGraph(format!(
                "leveling did not converge within {} relaxations; the graph is not acyclic",
                limit
            )));
        }
        *level = suggested;

        if let Some(node) = nodes.get(id) {
            for child in &node.children {
                queue.push_back((child.as_str(), suggested + 1));
            }
        }
    }
    debug!(relaxations, "levels committed");

    let depth = committed.values().copied().max().map_or(0, |max| max + 1);
    let mut levels: Vec<Vec<String>> = vec![Vec::new(); depth];
    for (id, &level) in &committed {
        levels[level].push(id.clone());
        if let Some(node) = nodes.get_mut(id) {
            node.level = level;
        }
    }
    // UTF-16 code unit order, matching how the viewer sorts ids
    for row in &mut levels {
        row.sort_by(|a, b| a.encode_utf16().cmp(b.encode_utf16()));
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdScheme;
    use crate::hash::{canonical_id, Verbatim};
    use crate::model::{OutputDescriptor, RawNode};

    fn node(parents: &[&str]) -> RawNode {
        RawNode::new("n").with_parents(parents.iter().copied())
    }

    fn verbatim() -> NormalizerConfig {
        NormalizerConfig {
            id_scheme: IdScheme::Verbatim,
            ..NormalizerConfig::default()
        }
    }

    fn diamond() -> RawGraph {
        RawGraph::new()
            .with_node("A", node(&[]))
            .with_node("B", node(&["A"]))
            .with_node("C", node(&["A"]))
            .with_node("D", node(&["B", "C"]))
    }

    fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    // ── Leveling ───────────────────────────────────────

    #[test]
    fn test_diamond_levels() {
        let graph = normalize(&diamond(), &verbatim()).unwrap();
        assert_eq!(graph.levels, table(&[&["A"], &["B", "C"], &["D"]]));
    }

    #[test]
    fn test_isolated_node_is_alone_at_level_zero() {
        let raw = RawGraph::new().with_node("solo", node(&[]));
        let graph = normalize(&raw, &verbatim()).unwrap();
        assert_eq!(graph.levels, table(&[&["solo"]]));
        let solo = graph.nodes.get("solo").unwrap();
        assert!(solo.parents.is_empty() && solo.children.is_empty());
    }

    #[test]
    fn test_empty_graph_has_no_levels() {
        let graph = normalize(&RawGraph::new(), &verbatim()).unwrap();
        assert!(graph.levels.is_empty());
        assert!(graph.nodes.is_empty());
    }

    #[test]
    fn test_uneven_forest_uses_longest_path() {
        // r1 -> a -> b -> join, r2 -> join: join sits below its deepest parent
        let raw = RawGraph::new()
            .with_node("r2", node(&[]))
            .with_node("join", node(&["r2", "b"]))
            .with_node("r1", node(&[]))
            .with_node("a", node(&["r1"]))
            .with_node("b", node(&["a"]));
        let graph = normalize(&raw, &verbatim()).unwrap();
        assert_eq!(
            graph.levels,
            table(&[&["r1", "r2"], &["a"], &["b"], &["join"]])
        );
        assert_eq!(graph.nodes.get("join").unwrap().level, 3);
    }

    #[test]
    fn test_chain_from_original_viewer() {
        let raw = RawGraph::new()
            .with_node("A", node(&[]))
            .with_node("B", node(&["A"]))
            .with_node("C", node(&["A"]))
            .with_node("D", node(&["B", "C"]))
            .with_node("E", node(&["D"]))
            .with_node("F", node(&["E"]))
            .with_node("G", node(&["F"]))
            .with_node("H", node(&["D", "E", "F", "G"]));
        let graph = normalize(&raw, &verbatim()).unwrap();
        assert_eq!(
            graph.levels,
            table(&[&["A"], &["B", "C"], &["D"], &["E"], &["F"], &["G"], &["H"]])
        );
    }

    #[test]
    fn test_levels_sorted_lexicographically() {
        let raw = RawGraph::new()
            .with_node("root", node(&[]))
            .with_node("zeta", node(&["root"]))
            .with_node("alpha", node(&["root"]))
            .with_node("Mid", node(&["root"]));
        let graph = normalize(&raw, &verbatim()).unwrap();
        assert_eq!(graph.levels[1], vec!["Mid", "alpha", "zeta"]);
    }

    #[test]
    fn test_levels_sorted_by_utf16_code_units() {
        // U+1F600 encodes as a surrogate pair (0xD83D ...), below U+FF61
        let raw = RawGraph::new()
            .with_node("root", node(&[]))
            .with_node("\u{FF61}", node(&["root"]))
            .with_node("\u{1F600}", node(&["root"]));
        let graph = normalize(&raw, &verbatim()).unwrap();
        assert_eq!(graph.levels[1], vec!["\u{1F600}", "\u{FF61}"]);
    }

    #[test]
    fn test_relaxation_limit_is_enforced() {
        let config = NormalizerConfig {
            max_relaxations: Some(2),
            ..verbatim()
        };
        let raw = RawGraph::new()
            .with_node("A", node(&[]))
            .with_node("B", node(&["A"]))
            .with_node("C", node(&["B"]))
            .with_node("D", node(&["C"]));
        let err = normalize(&raw, &config).unwrap_err();
        assert!(err.to_string().contains("did not converge"));
    }

    // ── Children ───────────────────────────────────────

    #[test]
    fn test_children_follow_node_order_without_duplicates() {
        let raw = RawGraph::new()
            .with_node("A", node(&[]))
            .with_node("C", node(&["A", "A"]))
            .with_node("B", node(&["A"]));
        let graph = normalize(&raw, &verbatim()).unwrap();
        assert_eq!(graph.nodes.get("A").unwrap().children, vec!["C", "B"]);
        // parents are kept as supplied
        assert_eq!(graph.nodes.get("C").unwrap().parents, vec!["A", "A"]);
    }

    #[test]
    fn test_children_inverse_of_parents() {
        let graph = normalize(&diamond(), &verbatim()).unwrap();
        for node in graph.nodes.values() {
            for child in &node.children {
                assert!(graph.nodes.get(child).unwrap().parents.contains(&node.id));
            }
            for parent in &node.parents {
                assert!(graph.nodes.get(parent).unwrap().children.contains(&node.id));
            }
        }
    }

    // ── Canonicalization ───────────────────────────────

    #[test]
    fn test_hashed_ids_rewrite_every_reference() {
        let raw = RawGraph::new()
            .with_node(
                "A",
                node(&[]).with_output("out1", OutputDescriptor::new("result")),
            )
            .with_node(
                "B",
                node(&["A"])
                    .with_input(InputDescriptor::new("data", "out1").from_node("A"))
                    .with_input(InputDescriptor::new("param", "p1")),
            );
        let graph = normalize(&raw, &NormalizerConfig::default()).unwrap();

        let a = canonical_id("A");
        let b = canonical_id("B");
        let out1 = canonical_id("out1");

        let node_a = graph.nodes.get(&a).unwrap();
        assert_eq!(node_a.key, "A");
        assert!(node_a.outputs.contains_key(&out1));
        assert_eq!(node_a.children, vec![b.clone()]);

        let node_b = graph.nodes.get(&b).unwrap();
        assert_eq!(node_b.parents, vec![a.clone()]);
        assert_eq!(node_b.inputs[0].node_id.as_deref(), Some(a.as_str()));
        assert_eq!(node_b.inputs[0].input_id, out1);
        assert_eq!(node_b.inputs[1].node_id, None);
        assert_eq!(node_b.inputs[1].input_id, canonical_id("p1"));

        assert_eq!(graph.keys.get("B"), Some(&b));
    }

    #[test]
    fn test_explicit_canonicalizer() {
        let graph = normalize_with(&diamond(), &NormalizerConfig::default(), &Verbatim).unwrap();
        assert!(graph.nodes.contains_key("D"));
    }

    #[test]
    fn test_caller_graph_is_not_aliased() {
        let mut raw = diamond();
        let graph = normalize(&raw, &verbatim()).unwrap();
        raw.insert("E", node(&["D"]));
        assert_eq!(graph.nodes.len(), 4);
        assert!(!graph.nodes.get("D").unwrap().children.contains(&"E".to_string()));
    }

    #[test]
    fn test_tolerated_collision_merges_nodes() {
        let raw = RawGraph::new()
            .with_node("Aa", RawNode::new("first"))
            .with_node("BB", RawNode::new("second"));
        let graph = normalize(&raw, &NormalizerConfig::default()).unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes.values().next().unwrap().label, "second");
    }

    #[test]
    fn test_collision_between_parent_and_child_rejected() {
        // "Aa" and "BB" share a hash, so BB would become its own parent
        let raw = RawGraph::new()
            .with_node("Aa", node(&[]))
            .with_node("BB", node(&["Aa"]));
        let err = normalize(&raw, &NormalizerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(ref m) if m.contains("[cycle]")));
        assert!(err.to_string().contains("BB"));
    }

    #[test]
    fn test_collision_between_ancestor_and_descendant_rejected() {
        let raw = RawGraph::new()
            .with_node("Aa", node(&[]))
            .with_node("mid", node(&["Aa"]))
            .with_node("BB", node(&["mid"]));
        let err = normalize(&raw, &NormalizerConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(ref m) if m.contains("[cycle]")));
    }

    #[test]
    fn test_collision_between_siblings_still_levels() {
        let raw = RawGraph::new()
            .with_node("root", node(&[]))
            .with_node("Aa", node(&["root"]))
            .with_node("BB", node(&["root"]));
        let graph = normalize(&raw, &NormalizerConfig::default()).unwrap();
        assert_eq!(graph.levels.len(), 2);
        assert_eq!(graph.levels[1], vec![canonical_id("Aa")]);
    }

    // ── Failure modes ──────────────────────────────────

    #[test]
    fn test_cycle_rejected_before_leveling() {
        let raw = RawGraph::new()
            .with_node("A", node(&["B"]))
            .with_node("B", node(&["A"]));
        let err = normalize(&raw, &verbatim()).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(ref m) if m.contains("[cycle]")));
    }

    #[test]
    fn test_dangling_parent_rejected() {
        let raw = RawGraph::new().with_node("A", node(&["missing"]));
        let err = normalize(&raw, &verbatim()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_warnings_as_errors() {
        let raw = RawGraph::new()
            .with_node("A", node(&[]))
            .with_node("B", node(&["A", "A"]));
        assert!(normalize(&raw, &verbatim()).is_ok());

        let strict = NormalizerConfig {
            warnings_as_errors: true,
            ..verbatim()
        };
        let err = normalize(&raw, &strict).unwrap_err();
        assert!(err.to_string().contains("[duplicate-parent]"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NormalizerConfig {
            namespace: String::new(),
            ..NormalizerConfig::default()
        };
        assert!(matches!(
            normalize(&diamond(), &config),
            Err(Error::ConfigError(_))
        ));
    }

    // ── Fingerprint ────────────────────────────────────

    #[test]
    fn test_fingerprint_is_deterministic_sha256() {
        let first = fingerprint(&normalize(&diamond(), &NormalizerConfig::default()).unwrap()).unwrap();
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        for _ in 0..10 {
            let again =
                fingerprint(&normalize(&diamond(), &NormalizerConfig::default()).unwrap()).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_fingerprint_changes_with_structure() {
        let base = fingerprint(&normalize(&diamond(), &verbatim()).unwrap()).unwrap();
        let changed = diamond().with_node("E", node(&["D"]));
        let other = fingerprint(&normalize(&changed, &verbatim()).unwrap()).unwrap();
        assert_ne!(base, other);
    }
}
