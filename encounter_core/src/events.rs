//! Presentation-boundary events.
//!
//! The sequencer queues these as a run progresses; the game drains them each
//! frame and answers through the sequencer's input methods.

use encounter_rules::{FactDelta, FactTarget};

use crate::error::EncounterError;
use crate::graph::{
    ActorId, ConversationEntry, EdgeId, EncounterEvent, EncyclopediaEntry, NodeId, NodeTag,
};
use crate::resolution::{ButtonOption, DialogPrompt};
use crate::sequencer::SignalId;

/// Choices shown when a node is entered.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOptions {
    None,
    Buttons(Vec<ButtonOption>),
    Dialog(DialogPrompt),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// A node became current. Published before its side effects.
    NodeEntered {
        node: NodeId,
        tag: NodeTag,
        name: Option<String>,
        options: NodeOptions,
    },
    FactsChanged {
        node: NodeId,
        target: FactTarget,
        deltas: Vec<FactDelta>,
    },
    /// An event edge fired. `signal` is set when the node waits on it.
    EventInvoked {
        node: NodeId,
        edge: EdgeId,
        event: EncounterEvent,
        signal: Option<SignalId>,
    },
    ArticleSectionAdded {
        node: NodeId,
        edge: EdgeId,
        section: EncyclopediaEntry,
    },
    ActorInitialized {
        node: NodeId,
        edge: EdgeId,
        actor: ActorId,
        name: String,
        avatar: Option<String>,
    },
    /// `signal` is set unless the focus change is instant.
    ActorFocused {
        node: NodeId,
        edge: EdgeId,
        actor: ActorId,
        signal: Option<SignalId>,
    },
    MessageDisplayed {
        node: NodeId,
        edge: EdgeId,
        entry: ConversationEntry,
    },
    NodeCompleted {
        node: NodeId,
    },
    Completed {
        ending: NodeId,
    },
    Aborted {
        node: Option<NodeId>,
    },
    Failed {
        error: EncounterError,
    },
}

impl SequencerEvent {
    /// The node the event concerns, if any.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            SequencerEvent::NodeEntered { node, .. }
            | SequencerEvent::FactsChanged { node, .. }
            | SequencerEvent::EventInvoked { node, .. }
            | SequencerEvent::ArticleSectionAdded { node, .. }
            | SequencerEvent::ActorInitialized { node, .. }
            | SequencerEvent::ActorFocused { node, .. }
            | SequencerEvent::MessageDisplayed { node, .. }
            | SequencerEvent::NodeCompleted { node } => Some(node),
            SequencerEvent::Completed { ending } => Some(ending),
            SequencerEvent::Aborted { node } => node.as_ref(),
            SequencerEvent::Failed { .. } => None,
        }
    }

    /// The completion signal the game must report for this event, if any.
    pub fn signal(&self) -> Option<SignalId> {
        match self {
            SequencerEvent::EventInvoked { signal, .. }
            | SequencerEvent::ActorFocused { signal, .. } => *signal,
            _ => None,
        }
    }
}
