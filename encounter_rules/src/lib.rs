//! # Encounter Rules
//!
//! The leaf layer of the encounter engine: the typed fact store encounters
//! read and write, the fact operations key/value nodes perform, and the
//! predicate filters that gate branches. Nothing here knows about nodes,
//! edges or sequencing.
//!
//! ## Core Components
//!
//! - **facts**: normalized keys, typed values, the partitioned store and its diff
//! - **filters**: grouped, negatable predicates evaluated in disjunctive normal form
//! - **context**: the encounter/global stores and interaction history of one run

pub mod context;
pub mod error;
pub mod facts;
pub mod filters;
pub mod ids;

pub use context::*;
pub use error::*;
pub use facts::*;
pub use filters::*;
pub use ids::*;
