//! Sequencer states and suspension tokens.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::EncounterError;
use crate::graph::{DialogOutcome, EdgeId, NodeId};
use crate::resolution::{ButtonOption, Next};

/// Token the game reports back when halting work finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SignalId(pub u64);

impl std::fmt::Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a halted run is waiting for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Wait {
    /// A non-halting node lingering for its duration.
    Timer { remaining: f32, next: Option<Next> },
    /// Halting work; `delays` holds signals the sequencer completes itself.
    Signals {
        outstanding: BTreeSet<SignalId>,
        delays: BTreeMap<SignalId, f32>,
        next: Option<Next>,
    },
    /// A button activation.
    Choice { options: Vec<ButtonOption> },
    /// A dialog outcome.
    Outcome {
        edge: EdgeId,
        outcomes: Vec<DialogOutcome>,
    },
}

/// Where a halted run stopped and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    pub node: NodeId,
    pub wait: Wait,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SequencerState {
    #[default]
    Idle,
    Running {
        node: NodeId,
    },
    Halted(Suspension),
    Complete {
        ending: NodeId,
    },
    Aborted {
        node: Option<NodeId>,
    },
    Failed(EncounterError),
}

impl SequencerState {
    /// Whether the run can no longer make progress.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SequencerState::Complete { .. }
                | SequencerState::Aborted { .. }
                | SequencerState::Failed(_)
        )
    }

    pub fn current_node(&self) -> Option<&NodeId> {
        match self {
            SequencerState::Running { node } => Some(node),
            SequencerState::Halted(suspension) => Some(&suspension.node),
            SequencerState::Complete { ending } => Some(ending),
            SequencerState::Aborted { node } => node.as_ref(),
            SequencerState::Idle | SequencerState::Failed(_) => None,
        }
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            SequencerState::Halted(suspension) => Some(suspension),
            _ => None,
        }
    }
}
