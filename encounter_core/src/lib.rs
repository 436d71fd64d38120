//! # Encounter Core
//!
//! Authored encounters as directed graphs of typed nodes, and the machinery
//! that plays them. Builds on `encounter_rules` for facts and filters.
//!
//! ## Core Components
//!
//! - **graph**: nodes, edges and encounters, their validation and JSON documents
//! - **resolution**: per-kind node behavior and blank-reference fallthrough
//! - **sequencer**: the resumable state machine that walks one encounter
//! - **events**: what the sequencer tells the game as a run progresses
//! - **config**: sequencer tuning loaded from TOML
//!
//! ## Design Philosophy
//!
//! - **Game-Driven**: the sequencer only moves when the game calls it; it never owns a loop
//! - **Event-Out**: side effects leave as queued events, never as callbacks

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod resolution;
pub mod sequencer;

pub use config::SequencerConfig;
pub use error::{EncounterError, GraphIntegrityError};
pub use events::{NodeOptions, SequencerEvent};
pub use graph::*;
pub use resolution::{ButtonOption, ButtonState, DialogPrompt, Next, OutcomeOption};
pub use sequencer::{Sequencer, SequencerState, SignalId, Suspension, Wait};
