//! String identifiers used as the only cross-references inside an encounter.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an id from any string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a fresh random id (UUID v4).
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// An empty or whitespace-only id means "no reference".
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a node, unique within its encounter.
    NodeId
);

string_id!(
    /// Identifier of an edge, unique within its owning node.
    EdgeId
);

string_id!(
    /// Identifier of an actor shown by bust and conversation nodes.
    ActorId
);

/// Treat a blank id in a reference slot as no reference at all.
pub fn non_blank(reference: Option<&NodeId>) -> Option<&NodeId> {
    reference.filter(|id| !id.is_blank())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        let blank = NodeId::new("  ");
        let real = NodeId::new("n1");
        assert_eq!(non_blank(Some(&blank)), None);
        assert_eq!(non_blank(Some(&real)), Some(&real));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = EdgeId::new("e7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"e7\"");
        assert_ne!(NodeId::generate(), NodeId::generate());
    }
}
