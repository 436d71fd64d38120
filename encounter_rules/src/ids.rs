//! Identifiers shared between the rules layer and the encounter graph.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable string identifier of an encounter.
///
/// Encounter ids are the only way other systems (selectors, save games,
/// interaction history) refer to an encounter, so they are plain strings
/// rather than indices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncounterId(pub String);

impl EncounterId {
    /// Create an encounter id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random encounter id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An id made only of whitespace is treated as "no encounter".
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for EncounterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for EncounterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
