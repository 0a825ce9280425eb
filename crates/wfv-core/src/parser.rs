//! Wire format decoding — JSON document → [`RawGraph`]
//!
//! The document is an object mapping node keys to node descriptors:
//!
//! ```json
//! {
//!   "align": {
//!     "label": "Align reads",
//!     "parents": ["fetch"],
//!     "info_collections": {
//!       "inputs": [{"name": "reads", "input_id": "out_reads", "node_id": "fetch"}],
//!       "outputs": {"out_bam": {"name": "alignments"}}
//!     }
//!   }
//! }
//! ```

use std::io::Read;

use crate::model::RawGraph;
use crate::{Error, Result};

/// Parse a raw graph from JSON text
pub fn parse_graph(json: &str) -> Result<RawGraph> {
    serde_json::from_str(json).map_err(|e| Error::ParseError(e.to_string()))
}

/// Parse a raw graph from any reader
pub fn parse_graph_reader<R: Read>(reader: R) -> Result<RawGraph> {
    serde_json::from_reader(reader).map_err(|e| Error::ParseError(e.to_string()))
}

/// Convert an already-decoded JSON value into a raw graph
pub fn parse_graph_value(value: serde_json::Value) -> Result<RawGraph> {
    serde_json::from_value(value).map_err(|e| Error::ParseError(e.to_string()))
}
