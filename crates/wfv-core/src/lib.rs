//! Workflow viewer core — graph preparation and query engine
//!
//! This is the single source of truth for graph semantics. The CLI and the
//! WebAssembly binding are thin surfaces over this crate.
//!
//! # Architecture
//!
//! ```text
//! JSON → Parser → RawGraph → Verifier → Normalizer → NormalizedGraph
//!                                                          ↓
//!                                               WorkflowGraph (queries)
//! ```
//!
//! The normalizer hashes every caller-supplied id into a namespaced
//! canonical id, derives children lists as the inverse of `parents`, and
//! groups nodes into topological levels. A presentation layer renders one
//! row per level and calls the query methods to highlight relatives and
//! populate the input/output panel.
//!
//! # Guarantees
//!
//! - **Deterministic**: same input always produces identical ids and levels
//! - **Isolated**: the caller's graph is copied; accessors return copies
//! - **Fail-fast**: dangling parents and cycles are rejected with an error,
//!   including cycles closed by two keys sharing a canonical id
//!
//! # Example
//!
//! ```
//! use wfv_core::WorkflowGraph;
//!
//! let graph = WorkflowGraph::from_json(r#"{
//!     "A": {"label": "Start", "parents": []},
//!     "B": {"label": "Left", "parents": ["A"]},
//!     "C": {"label": "Right", "parents": ["A"]},
//!     "D": {"label": "Join", "parents": ["B", "C"]}
//! }"#).unwrap();
//!
//! let levels = graph.get_nodes_topological_sort();
//! assert_eq!(levels.len(), 3);
//!
//! let join = graph.canonical_id("D").unwrap();
//! assert_eq!(graph.get_label(&join).unwrap(), "Join");
//! assert_eq!(graph.get_parents(&join).unwrap().len(), 2);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod hash;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod verifier;

pub use config::{IdScheme, NormalizerConfig};
pub use error::{Error, Result};
pub use graph::WorkflowGraph;
pub use hash::{canonical_id, IdCanonicalizer, NamespacedHash, Verbatim};
pub use model::*;
pub use normalizer::NormalizedGraph;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
