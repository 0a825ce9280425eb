//! Graph verifier — checks the structural preconditions of a raw graph
//!
//! Normalization assumes a well-formed DAG. The verifier checks that
//! assumption up front so malformed input fails with a descriptive error
//! instead of hanging in the leveling loop or silently dropping edges.
//! It accumulates all diagnostics rather than stopping at the first error.
//!
//! # Checks
//!
//! 1. **Parents** — every parent key names a node; duplicates are flagged
//! 2. **Acyclicity** — no node is its own ancestor
//! 3. **Inputs** — wired inputs name an existing producer that is a parent
//!    and declares the referenced output
//! 4. **Ids** — no two raw keys share a canonical id; a tolerated collision
//!    must not merge a node with one of its own ancestors

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::instrument;

use crate::config::NormalizerConfig;
use crate::hash::IdCanonicalizer;
use crate::model::RawGraph;

// ── Verification Result Types ─────────────────────────────

/// Result of graph verification — accumulates all diagnostics
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl VerificationResult {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    /// Returns true if no errors were found (warnings are OK)
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect()
    }

    /// One-line summary of every error, for `Error::InvalidGraph`
    pub fn error_summary(&self) -> String {
        self.errors()
            .iter()
            .map(|d| format!("[{}] {}", d.kind, d.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn add_error(&mut self, kind: DiagnosticKind, message: String) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            kind,
            message,
        });
    }

    fn add_warning(&mut self, kind: DiagnosticKind, message: String) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            kind,
            message,
        });
    }
}

impl Default for VerificationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// A single verification diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{} [{}]: {}", prefix, self.kind, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Category of verification issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    DanglingParent,
    DuplicateParent,
    Cycle,
    DanglingInputSource,
    InputSourceNotParent,
    UnknownOutput,
    IdCollision,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DiagnosticKind::DanglingParent => write!(f, "dangling-parent"),
            DiagnosticKind::DuplicateParent => write!(f, "duplicate-parent"),
            DiagnosticKind::Cycle => write!(f, "cycle"),
            DiagnosticKind::DanglingInputSource => write!(f, "dangling-input"),
            DiagnosticKind::InputSourceNotParent => write!(f, "input-not-parent"),
            DiagnosticKind::UnknownOutput => write!(f, "unknown-output"),
            DiagnosticKind::IdCollision => write!(f, "id-collision"),
        }
    }
}

// ── Public API ────────────────────────────────────────────

/// Verify a raw graph using the canonicalizer `config` selects
pub fn verify(graph: &RawGraph, config: &NormalizerConfig) -> VerificationResult {
    let canonicalizer = config.canonicalizer();
    verify_with(graph, canonicalizer.as_ref(), config.reject_collisions)
}

/// Verify a raw graph against an explicit canonicalizer
#[instrument(skip_all, fields(nodes = graph.len()))]
pub fn verify_with(
    graph: &RawGraph,
    canonicalizer: &dyn IdCanonicalizer,
    reject_collisions: bool,
) -> VerificationResult {
    let mut result = VerificationResult::new();

    verify_parents(graph, &mut result);
    verify_acyclic(graph, &mut result);
    verify_inputs(graph, &mut result);
    let collided = verify_ids(graph, canonicalizer, reject_collisions, &mut result);
    let raw_cycle = result
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Cycle);
    if collided && !reject_collisions && !raw_cycle {
        verify_merged_acyclic(graph, canonicalizer, &mut result);
    }

    result
}

// ── Phase 1: Parents ──────────────────────────────────────

fn verify_parents(graph: &RawGraph, result: &mut VerificationResult) {
    for (key, node) in graph.iter() {
        let mut seen = HashSet::new();
        for parent in &node.parents {
            if !graph.contains_key(parent) {
                result.add_error(
                    DiagnosticKind::DanglingParent,
                    format!("node '{}' lists unknown parent '{}'", key, parent),
                );
            } else if !seen.insert(parent.as_str()) {
                result.add_warning(
                    DiagnosticKind::DuplicateParent,
                    format!("node '{}' lists parent '{}' more than once", key, parent),
                );
            }
        }
    }
}

// ── Phase 2: Acyclicity ───────────────────────────────────

/// Peel off nodes whose parents are all resolved; anything left over sits
/// on or below a cycle. Dangling parents are ignored here.
fn verify_acyclic(graph: &RawGraph, result: &mut VerificationResult) {
    let mut pending: HashMap<&str, usize> = HashMap::with_capacity(graph.len());
    let mut children: HashMap<&str, Vec<&str>> = HashMap::with_capacity(graph.len());

    for (key, node) in graph.iter() {
        let mut count = 0;
        let mut seen = HashSet::new();
        for parent in &node.parents {
            if graph.contains_key(parent) && seen.insert(parent.as_str()) {
                count += 1;
                children.entry(parent.as_str()).or_default().push(key);
            }
        }
        pending.insert(key, count);
    }

    let mut ready: VecDeque<&str> = graph
        .keys()
        .filter(|k| pending.get(k) == Some(&0))
        .collect();
    let mut resolved = HashSet::with_capacity(graph.len());

    while let Some(key) = ready.pop_front() {
        resolved.insert(key);
        for &child in children.get(key).map(Vec::as_slice).unwrap_or_default() {
            if let Some(count) = pending.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(child);
                }
            }
        }
    }

    if resolved.len() == graph.len() {
        return;
    }

    let stuck: HashSet<&str> = graph.keys().filter(|k| !resolved.contains(k)).collect();
    if let Some(path) = find_cycle(graph, &stuck) {
        result.add_error(
            DiagnosticKind::Cycle,
            format!(
                "cycle detected: {} ({} node(s) cannot be leveled)",
                path.join(" -> "),
                stuck.len()
            ),
        );
    }
}

/// Walk upward through unresolved parents until a node repeats
///
/// Every unresolved node has at least one unresolved parent, so the walk
/// never dead-ends. The returned path runs parent → child.
fn find_cycle<'a>(graph: &'a RawGraph, stuck: &HashSet<&'a str>) -> Option<Vec<&'a str>> {
    let start = graph.keys().find(|k| stuck.contains(k))?;
    let mut walk = vec![start];
    let mut position: HashMap<&str, usize> = HashMap::from([(start, 0)]);
    let mut current = start;

    loop {
        let parent = graph
            .get(current)?
            .parents
            .iter()
            .map(String::as_str)
            .find(|p| stuck.contains(p))?;

        if let Some(&at) = position.get(parent) {
            let mut cycle: Vec<&str> = walk[at..].to_vec();
            cycle.reverse();
            cycle.push(cycle[0]);
            return Some(cycle);
        }
        position.insert(parent, walk.len());
        walk.push(parent);
        current = parent;
    }
}

// ── Phase 3: Inputs ───────────────────────────────────────

fn verify_inputs(graph: &RawGraph, result: &mut VerificationResult) {
    for (key, node) in graph.iter() {
        for input in &node.info_collections.inputs {
            let Some(source) = input.source() else {
                continue;
            };
            match graph.get(source) {
                None => result.add_warning(
                    DiagnosticKind::DanglingInputSource,
                    format!(
                        "input '{}' of node '{}' references unknown node '{}'",
                        input.name, key, source
                    ),
                ),
                Some(producer) => {
                    if !node.parents.iter().any(|p| p == source) {
                        result.add_warning(
                            DiagnosticKind::InputSourceNotParent,
                            format!(
                                "input '{}' of node '{}' comes from '{}', which is not a parent",
                                input.name, key, source
                            ),
                        );
                    }
                    if !producer.info_collections.outputs.contains_key(&input.input_id) {
                        result.add_warning(
                            DiagnosticKind::UnknownOutput,
                            format!(
                                "input '{}' of node '{}' references output '{}' not declared by '{}'",
                                input.name, key, input.input_id, source
                            ),
                        );
                    }
                }
            }
        }
    }
}

// ── Phase 4: Ids ──────────────────────────────────────────

/// Returns whether any two keys collided
fn verify_ids(
    graph: &RawGraph,
    canonicalizer: &dyn IdCanonicalizer,
    reject_collisions: bool,
    result: &mut VerificationResult,
) -> bool {
    let mut collided = false;
    let mut owners: HashMap<String, &str> = HashMap::with_capacity(graph.len());
    for key in graph.keys() {
        let id = canonicalizer.canonicalize(key);
        if let Some(first) = owners.get(&id) {
            collided = true;
            let message = format!(
                "nodes '{}' and '{}' share canonical id '{}'",
                first, key, id
            );
            if reject_collisions {
                result.add_error(DiagnosticKind::IdCollision, message);
            } else {
                result.add_warning(DiagnosticKind::IdCollision, message);
            }
        } else {
            owners.insert(id, key);
        }
    }
    collided
}

/// Kahn's algorithm over canonical ids, merging colliding keys the way
/// normalization does (the later node wins)
fn verify_merged_acyclic(
    graph: &RawGraph,
    canonicalizer: &dyn IdCanonicalizer,
    result: &mut VerificationResult,
) {
    let mut order: Vec<String> = Vec::with_capacity(graph.len());
    let mut merged: HashMap<String, (&str, Vec<String>)> = HashMap::with_capacity(graph.len());
    for (key, node) in graph.iter() {
        let id = canonicalizer.canonicalize(key);
        let mut parents: Vec<String> = Vec::with_capacity(node.parents.len());
        for parent in &node.parents {
            let parent = canonicalizer.canonicalize(parent);
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
        if merged.insert(id.clone(), (key, parents)).is_none() {
            order.push(id);
        }
    }

    let mut pending: HashMap<&str, usize> = HashMap::with_capacity(order.len());
    let mut children: HashMap<&str, Vec<&str>> = HashMap::with_capacity(order.len());
    for id in &order {
        let mut count = 0;
        if let Some((_, parents)) = merged.get(id) {
            for parent in parents.iter().filter(|p| merged.contains_key(p.as_str())) {
                count += 1;
                children.entry(parent.as_str()).or_default().push(id);
            }
        }
        pending.insert(id, count);
    }

    let mut ready: VecDeque<&str> = order
        .iter()
        .map(String::as_str)
        .filter(|id| pending.get(id) == Some(&0))
        .collect();
    let mut resolved = 0usize;
    while let Some(id) = ready.pop_front() {
        resolved += 1;
        for &child in children.get(id).map(Vec::as_slice).unwrap_or_default() {
            if let Some(count) = pending.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(child);
                }
            }
        }
    }

    if resolved == order.len() {
        return;
    }

    let stuck: Vec<String> = order
        .iter()
        .filter(|id| pending.get(id.as_str()).map_or(false, |&c| c > 0))
        .filter_map(|id| merged.get(id).map(|(key, _)| format!("'{}' ({})", key, id)))
        .collect();
    result.add_error(
        DiagnosticKind::Cycle,
        format!(
            "colliding ids merge a node with its own ancestor: {} cannot be leveled",
            stuck.join(", ")
        ),
    );
}

// ── Tests ─────────────────────────────────────────────────
