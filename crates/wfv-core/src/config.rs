//! Normalizer configuration
//!
//! Every field has a default, so an empty document (or no document at all)
//! yields the standard behavior: hashed ids under the `workflow_viewer_`
//! namespace, collisions tolerated with a warning.

use serde::{Deserialize, Serialize};

use crate::hash::{IdCanonicalizer, NamespacedHash, Verbatim, NAMESPACE};
use crate::{Error, Result};

/// How raw keys become canonical ids
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// Namespaced polynomial hash
    #[default]
    Hashed,
    /// Raw keys used unchanged
    Verbatim,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizerConfig {
    /// Tag prepended to hashed ids
    pub namespace: String,
    pub id_scheme: IdScheme,
    /// Treat two raw keys sharing a canonical id as an error
    pub reject_collisions: bool,
    /// Fail normalization on any verifier warning
    pub warnings_as_errors: bool,
    /// Upper bound on level commits during leveling; `None` derives it from
    /// the node count
    pub max_relaxations: Option<usize>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            namespace: NAMESPACE.to_string(),
            id_scheme: IdScheme::Hashed,
            reject_collisions: false,
            warnings_as_errors: false,
            max_relaxations: None,
        }
    }
}

impl NormalizerConfig {
    /// Build the canonicalizer this configuration selects
    pub fn canonicalizer(&self) -> Box<dyn IdCanonicalizer> {
        match self.id_scheme {
            IdScheme::Hashed => Box::new(NamespacedHash::new(self.namespace.clone())),
            IdScheme::Verbatim => Box::new(Verbatim),
        }
    }

    /// Relaxation bound for a graph of `node_count` nodes
    ///
    /// On a DAG each node's level rises at most `node_count - 1` times.
    pub fn relaxation_limit(&self, node_count: usize) -> usize {
        self.max_relaxations
            .unwrap_or_else(|| node_count.saturating_mul(node_count).max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.id_scheme == IdScheme::Hashed && self.namespace.is_empty() {
            return Err(Error::ConfigError(
                "namespace must not be empty when id_scheme is \"hashed\"".into(),
            ));
        }
        if self.max_relaxations == Some(0) {
            return Err(Error::ConfigError(
                "max_relaxations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
