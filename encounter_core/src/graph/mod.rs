//! # Encounter Graph
//!
//! The polymorphic node/edge model of an encounter, the container holding it,
//! validation of its invariants, and its document form.
//!
//! Nodes reference each other only by [`NodeId`]; a run looks them up through
//! an [`EncounterGraph`] index instead of holding pointers.

mod document;
mod edge;
mod encounter;
mod ids;
mod node;
mod validation;

pub use edge::*;
pub use encounter::*;
pub use ids::*;
pub use node::*;
pub use validation::ValidationConfig;
