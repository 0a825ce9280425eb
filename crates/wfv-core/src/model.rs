//! Graph data model — raw input types and their canonical counterparts
//!
//! The raw types mirror the JSON wire format one-to-one. Node keys and
//! output ids keep the order in which they appear in the source document,
//! since that order is the "underlying node sequence" every query follows.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── OrderedMap ─────────────────────────────────────────────

/// String-keyed map that remembers insertion order
///
/// Serializes as a JSON object. Re-inserting an existing key replaces the
/// value in place, so the key keeps its original position.
#[derive(Clone)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a value, returning the previous value for `key` if any
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        match self.index.get(key) {
            Some(&pos) => Some(&mut self.entries[pos].1),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for OrderedMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V: PartialEq> PartialEq for OrderedMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V: Eq> Eq for OrderedMap<V> {}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = OrderedMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V> IntoIterator for OrderedMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

// ── Descriptors ────────────────────────────────────────────

/// A named input slot, optionally wired to an output of a producer node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub name: String,
    pub input_id: String,
    /// Producer node; `None` when the input is not fed by a tracked node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Any further fields carried verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InputDescriptor {
    pub fn new(name: impl Into<String>, input_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_id: input_id.into(),
            node_id: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Wire this input to a producer node
    pub fn from_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// The producer node, treating an empty id as absent
    pub fn source(&self) -> Option<&str> {
        self.node_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// A named output slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OutputDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoCollections {
    #[serde(default)]
    pub inputs: Vec<InputDescriptor>,
    #[serde(default)]
    pub outputs: OrderedMap<OutputDescriptor>,
}

// ── Raw graph ──────────────────────────────────────────────

/// A node as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub info_collections: InfoCollections,
}

impl RawNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_input(mut self, input: InputDescriptor) -> Self {
        self.info_collections.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output_id: impl Into<String>, output: OutputDescriptor) -> Self {
        self.info_collections.outputs.insert(output_id, output);
        self
    }
}

/// Node-keyed graph description, in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawGraph {
    nodes: OrderedMap<RawNode>,
}

impl RawGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, node: RawNode) -> Option<RawNode> {
        self.nodes.insert(key, node)
    }

    /// Builder form of [`RawGraph::insert`]
    pub fn with_node(mut self, key: impl Into<String>, node: RawNode) -> Self {
        self.nodes.insert(key, node);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawNode> {
        self.nodes.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawNode)> {
        self.nodes.iter()
    }
}

impl IntoIterator for RawGraph {
    type Item = (String, RawNode);
    type IntoIter = std::vec::IntoIter<(String, RawNode)>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

// ── Canonical graph ────────────────────────────────────────

/// A node after id canonicalization, children derivation and leveling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
    pub id: String,
    /// The caller's original key
    pub key: String,
    pub label: String,
    pub level: usize,
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub inputs: Vec<InputDescriptor>,
    pub outputs: OrderedMap<OutputDescriptor>,
}
