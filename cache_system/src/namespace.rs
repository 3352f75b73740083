//! Key namespacing
//!
//! Every manager binds to one namespace, prepended to each caller key so
//! deployments sharing one physical store never see each other's entries.

use sha2::{Digest, Sha256};
use std::fmt;

const GENERATED_PREFIX: &str = "lms_";
const HASH_SUFFIX_LEN: usize = 8;

/// Tenant-scoped key prefix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    /// Use `prefix` verbatim.
    ///
    /// Flushes match on the prefix as a plain string, so it should end in a
    /// separator (`_` or `:`); otherwise `p1` would also cover `p10`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Derive the namespace from a stable deployment identity.
    ///
    /// The same identity always yields the same prefix, so entries written
    /// before a restart stay reachable afterwards.
    pub fn from_identity(identity: &str) -> Self {
        let digest = Sha256::digest(identity.as_bytes());
        let hex = format!("{:x}", digest);
        Self::new(format!("{}{}_", GENERATED_PREFIX, &hex[..HASH_SUFFIX_LEN]))
    }

    /// Operator override wins, otherwise hash the identity
    pub fn resolve(prefix_override: Option<&str>, identity: &str) -> Self {
        match prefix_override {
            Some(prefix) if !prefix.is_empty() => Self::new(prefix),
            _ => Self::from_identity(identity),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Full storage key for a caller key
    pub fn key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.prefix.len() + key.len());
        full.push_str(&self.prefix);
        full.push_str(key);
        full
    }

    /// Caller key for a full storage key, `None` if it belongs elsewhere
    pub fn strip<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        full_key.strip_prefix(self.prefix.as_str())
    }

    /// Glob matching every key of this namespace (Redis `SCAN MATCH`)
    pub fn scan_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 2);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }

    /// SQL `LIKE` pattern matching every key of this namespace (escape char `\`)
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 2);
        for c in self.prefix.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_hash_is_stable() {
        let a = Namespace::from_identity("https://school.example.com");
        let b = Namespace::from_identity("https://school.example.com");
        assert_eq!(a, b);

        let prefix = a.as_str();
        assert!(prefix.starts_with("lms_"));
        assert!(prefix.ends_with('_'));
        let suffix = &prefix[4..prefix.len() - 1];
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_distinct_identities_do_not_collide() {
        let a = Namespace::from_identity("https://a.example.com");
        let b = Namespace::from_identity("https://b.example.com");
        assert_ne!(a, b);
    }

    #[test]
    fn test_override_wins() {
        let ns = Namespace::resolve(Some("tenant_"), "https://school.example.com");
        assert_eq!(ns.as_str(), "tenant_");

        let empty = Namespace::resolve(Some(""), "https://school.example.com");
        assert_eq!(empty, Namespace::from_identity("https://school.example.com"));
    }

    #[test]
    fn test_key_and_strip() {
        let ns = Namespace::new("p1:");
        assert_eq!(ns.key("course:42"), "p1:course:42");
        assert_eq!(ns.strip("p1:course:42"), Some("course:42"));
        assert_eq!(ns.strip("p2:course:42"), None);
    }

    #[test]
    fn test_patterns_escape_wildcards() {
        let ns = Namespace::new("a*b_[x]%");
        assert_eq!(ns.scan_pattern(), "a\\*b_\\[x\\]%*");
        assert_eq!(ns.like_pattern(), "a*b\\_[x]\\%%");
    }
}
