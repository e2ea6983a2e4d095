//! Entity descriptors.
//!
//! A repository operates on exactly one data-model type. The descriptor is
//! the type token for that model: it names the fresh builder to instantiate
//! and namespaces every cache key the repository derives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CachetResult, ConfigError};

/// Immutable reference to the data-model type a repository operates on.
///
/// Accepts Rust-style (`App::Models::Order`) and namespace-style
/// (`App\Models\Order`) paths. Every segment must be an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityDescriptor {
    path: String,
    segments: Vec<String>,
}

impl EntityDescriptor {
    /// Parse an entity type path.
    pub fn parse(path: &str) -> CachetResult<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingEntity.into());
        }

        let segments: Vec<String> = trimmed
            .split("::")
            .flat_map(|part| part.split('\\'))
            .map(str::to_string)
            .collect();

        for segment in &segments {
            if !is_identifier(segment) {
                return Err(ConfigError::InvalidEntity {
                    path: trimmed.to_string(),
                    reason: if segment.is_empty() {
                        "empty path segment".to_string()
                    } else {
                        format!("'{}' is not an identifier", segment)
                    },
                }
                .into());
            }
        }

        Ok(Self {
            path: segments.join("::"),
            segments,
        })
    }

    /// Full path in `::` form.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment, used to namespace cache keys.
    pub fn basename(&self) -> &str {
        // parse() guarantees at least one segment
        self.segments.last().map(String::as_str).unwrap_or(&self.path)
    }
}

impl fmt::Display for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl TryFrom<String> for EntityDescriptor {
    type Error = crate::CachetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityDescriptor> for String {
    fn from(value: EntityDescriptor) -> Self {
        value.path
    }
}

/// Data-model types that carry a static descriptor.
pub trait Entity {
    /// Type path of the model, e.g. `"App::Models::Order"`.
    const PATH: &'static str;

    /// Parsed descriptor for this model.
    fn descriptor() -> CachetResult<EntityDescriptor> {
        EntityDescriptor::parse(Self::PATH)
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
