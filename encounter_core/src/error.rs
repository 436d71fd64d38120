//! Error taxonomy of the encounter engine.
//!
//! Fatal errors stop a run for good. Rejections refuse one caller input and
//! leave the run where it was.

use thiserror::Error;

use crate::graph::{DialogOutcome, EdgeId, NodeId};
use crate::sequencer::SignalId;

/// Structural violation found while validating an encounter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphIntegrityError {
    #[error("no node is marked as the beginning")]
    MissingBeginning,

    #[error("more than one beginning node: {}", join(.nodes))]
    MultipleBeginnings { nodes: Vec<NodeId> },

    #[error("no node is marked as an ending")]
    MissingEnding,

    #[error("node id {node} is used more than once")]
    DuplicateNodeId { node: NodeId },

    #[error("edge id {edge} is used more than once in node {node}")]
    DuplicateEdgeId { node: NodeId, edge: EdgeId },

    #[error("node {node}{} has a blank reference that cannot be resolved", edge_suffix(.edge))]
    BlankReference { node: NodeId, edge: Option<EdgeId> },

    #[error("node {node}{} references unknown node {target}", edge_suffix(.edge))]
    UnknownReference {
        node: NodeId,
        edge: Option<EdgeId>,
        target: NodeId,
    },

    #[error("default end {node} is not an ending node")]
    DefaultEndNotEnding { node: NodeId },

    #[error("nodes {} form a cycle with no exit and no ending", join(.nodes))]
    ClosedCycle { nodes: Vec<NodeId> },

    #[error("no ending node is reachable from beginning {beginning}")]
    UnreachableEnding { beginning: NodeId },
}

/// Every error the engine reports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncounterError {
    #[error("graph integrity violation: {0}")]
    GraphIntegrity(#[from] GraphIntegrityError),

    #[error("node {node}{} resolved to missing node {target}", edge_suffix(.edge))]
    DanglingReference {
        node: NodeId,
        edge: Option<EdgeId>,
        target: NodeId,
    },

    #[error("unrecognized {family} variant {tag:?} in {id}")]
    UnrecognizedVariant {
        family: &'static str,
        tag: String,
        id: String,
    },

    #[error("visited more than {limit} nodes in one step, last at {node}")]
    StepLimitExceeded { node: NodeId, limit: usize },

    #[error("malformed encounter document: {0}")]
    Document(String),

    #[error("malformed sequencer configuration: {0}")]
    Config(String),

    #[error("the encounter has not been started")]
    NotStarted,

    #[error("the encounter has already been started")]
    AlreadyStarted,

    #[error("the encounter run is over")]
    Finished,

    #[error("the sequencer is not waiting for {expected}")]
    NotWaiting { expected: &'static str },

    #[error("node {node} has no edge {edge}")]
    UnknownEdge { node: NodeId, edge: EdgeId },

    #[error("edge {edge} of node {node} is not available")]
    EdgeUnavailable { node: NodeId, edge: EdgeId },

    #[error("outcome {outcome} is not offered by node {node}")]
    OutcomeUnavailable { node: NodeId, outcome: DialogOutcome },

    #[error("signal {signal} was never issued")]
    SignalRejected { signal: SignalId },
}

impl EncounterError {
    /// Whether the error ends the run, as opposed to rejecting one input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EncounterError::GraphIntegrity(_)
                | EncounterError::DanglingReference { .. }
                | EncounterError::UnrecognizedVariant { .. }
                | EncounterError::StepLimitExceeded { .. }
                | EncounterError::Document(_)
                | EncounterError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EncounterError>;

fn edge_suffix(edge: &Option<EdgeId>) -> String {
    match edge {
        Some(edge) => format!(" (edge {edge})"),
        None => String::new(),
    }
}

fn join(nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
