//! Deterministic cache keys.
//!
//! `CacheKey` has no public constructor other than [`CacheKey::derive`], so
//! every key in a store is namespaced by an entity and built from the same
//! inputs the same way.

use std::fmt;

use cachet_core::EntityDescriptor;
use sha2::{Digest, Sha256};

/// Separator between key segments.
const SEPARATOR: char = '_';

/// A cache key derived from an entity, a basis string and tags.
///
/// # Text Format
///
/// `_{Basename}_{hex(sha256(basis ++ salt))}` with `_{tag1_tag2}_`
/// appended when tags are present. The basename and tags stay readable so
/// keys can be inspected in a store; the basis is hashed so arbitrarily
/// long query text yields a bounded key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    namespace: String,
    digest: String,
    tags: Vec<String>,
    text: String,
}

impl CacheKey {
    /// Derive the key for `basis` within `entity`'s namespace.
    ///
    /// Tags keep their first-seen order; duplicates and empty tags are
    /// dropped.
    ///
    /// The namespace is the entity basename only. `App::A::Order` and
    /// `App::B::Order` share one keyspace, so the same basis (or explicit
    /// key) under both maps to the same entry. Distinct basenames or distinct
    /// `salt` values keep such entities apart.
    pub fn derive<S: AsRef<str>>(
        entity: &EntityDescriptor,
        basis: &str,
        tags: &[S],
        salt: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(basis.as_bytes());
        hasher.update(salt.as_bytes());
        let digest = hex::encode(hasher.finalize());

        let mut unique: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.as_ref().trim();
            if !tag.is_empty() && !unique.iter().any(|t| t == tag) {
                unique.push(tag.to_string());
            }
        }

        let namespace = entity.basename().to_string();
        let mut text = format!("{SEPARATOR}{namespace}{SEPARATOR}{digest}");
        if !unique.is_empty() {
            text.push(SEPARATOR);
            text.push_str(&unique.join("_"));
            text.push(SEPARATOR);
        }

        Self {
            inner: KeyInner {
                namespace,
                digest,
                tags: unique,
                text,
            },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner.text
    }

    /// Entity basename the key is namespaced under.
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Hex SHA-256 of the basis and salt.
    pub fn digest(&self) -> &str {
        &self.inner.digest
    }

    pub fn tags(&self) -> &[String] {
        &self.inner.tags
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.text)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
