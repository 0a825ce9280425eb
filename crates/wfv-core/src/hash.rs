//! Id canonicalization — maps caller-chosen keys to internal ids
//!
//! The default scheme is a 32-bit polynomial string hash (`h = h*31 + c`
//! over UTF-16 code units, wrapping) rendered in decimal behind the
//! `workflow_viewer_` namespace tag. The tag keeps canonical ids from
//! clashing with identifiers a presentation layer already uses.
//!
//! # Known limitation
//!
//! The hash is not collision-free. Two distinct keys that hash to the same
//! value merge into one node. The verifier reports such collisions, and
//! `NormalizerConfig::reject_collisions` turns the report into an error.

use std::fmt;

/// Namespace tag prepended to every hashed id
pub const NAMESPACE: &str = "workflow_viewer_";

/// Strategy for turning a raw key into a canonical id
///
/// Implementations must be pure and deterministic: the same input always
/// yields the same id.
pub trait IdCanonicalizer: fmt::Debug + Send + Sync {
    fn canonicalize(&self, raw: &str) -> String;
}

/// Polynomial string hash, wrapped to a signed 32-bit integer
///
/// Equivalent to `((h << 5) - h) + code_unit` folded over the UTF-16
/// encoding of `s`, starting from zero.
pub fn string_hash(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, c| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(c))
    })
}

/// Canonical id of `raw` under the default namespace
pub fn canonical_id(raw: &str) -> String {
    NamespacedHash::default().canonicalize(raw)
}

/// Default strategy: namespace tag + decimal string hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacedHash {
    namespace: String,
}

impl NamespacedHash {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Default for NamespacedHash {
    fn default() -> Self {
        Self::new(NAMESPACE)
    }
}

impl IdCanonicalizer for NamespacedHash {
    fn canonicalize(&self, raw: &str) -> String {
        format!("{}{}", self.namespace, string_hash(raw))
    }
}

/// Identity strategy: raw keys are used as canonical ids unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verbatim;

impl IdCanonicalizer for Verbatim {
    fn canonicalize(&self, raw: &str) -> String {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_hashes_to_zero() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(canonical_id(""), "workflow_viewer_0");
    }

    #[test]
    fn test_single_character_is_its_code_unit() {
        assert_eq!(string_hash("A"), 65);
        assert_eq!(canonical_id("A"), "workflow_viewer_65");
    }

    #[test]
    fn test_known_values() {
        assert_eq!(string_hash("AB"), 65 * 31 + 66);
        assert_eq!(string_hash("abc"), 96354);
        assert_eq!(string_hash("hello"), 99162322);
    }

    #[test]
    fn test_wraps_to_signed_32_bit() {
        assert_eq!(string_hash("polygenelubricants"), i32::MIN);
        assert_eq!(canonical_id("polygenelubricants"), "workflow_viewer_-2147483648");
    }

    #[test]
    fn test_hashes_utf16_code_units() {
        // U+1F600 is a surrogate pair: 0xD83D 0xDE00
        let expected = 0xD83D_i32.wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(string_hash("\u{1F600}"), expected);
    }

    #[test]
    fn test_known_collision_is_not_hidden() {
        // "Aa" and "BB" share a hash under this scheme
        assert_eq!(string_hash("Aa"), string_hash("BB"));
    }

    #[test]
    fn test_custom_namespace() {
        let hasher = NamespacedHash::new("wf_");
        assert_eq!(hasher.canonicalize("A"), "wf_65");
        assert_eq!(hasher.namespace(), "wf_");
    }

    #[test]
    fn test_verbatim_is_identity() {
        assert_eq!(Verbatim.canonicalize("step-1"), "step-1");
    }

    #[test]
    fn test_deterministic_across_calls() {
        let first = canonical_id("align_reads");
        for _ in 0..100 {
            assert_eq!(canonical_id("align_reads"), first);
        }
    }
}
