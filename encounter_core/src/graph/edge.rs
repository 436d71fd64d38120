//! Edges - the typed payload items a node carries.
//!
//! An edge never becomes the current position of a run. It carries what its
//! node kind needs: a filter and target for a switch, a clickable message for
//! a button, a dialog with outcomes, a piece of content to show.

use serde::{Deserialize, Serialize};

use encounter_rules::Filter;

use super::ids::{ActorId, EdgeId, NodeId};

/// The seven edge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Switch,
    Button,
    Encyclopedia,
    Event,
    Dialog,
    Bust,
    Conversation,
}

/// Shared edge envelope around a kind-specific entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge<E> {
    pub id: EdgeId,
    #[serde(default)]
    pub index: i32,
    /// Ignored edges are invisible to resolution.
    #[serde(default)]
    pub ignore: bool,
    pub entry: E,
}

impl<E> Edge<E> {
    pub fn new(id: impl Into<EdgeId>, entry: E) -> Self {
        Self {
            id: id.into(),
            index: 0,
            ignore: false,
            entry,
        }
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }
}

/// Non-ignored edges in ascending index order (stable for equal indices).
pub fn active<E>(edges: &[Edge<E>]) -> Vec<&Edge<E>> {
    let mut active: Vec<&Edge<E>> = edges.iter().filter(|edge| !edge.ignore).collect();
    active.sort_by_key(|edge| edge.index);
    active
}

fn default_weight() -> f32 {
    1.0
}

/// A conditional branch of a switch node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchEntry {
    #[serde(default)]
    pub filter: Filter,
    #[serde(default)]
    pub target: Option<NodeId>,
    /// Relative weight for weighted random selection.
    #[serde(default = "default_weight")]
    pub weight: f32,
}

impl SwitchEntry {
    pub fn new(filter: Filter, target: impl Into<NodeId>) -> Self {
        Self {
            filter,
            target: Some(target.into()),
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

/// A clickable choice of a button node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonEntry {
    pub message: String,
    #[serde(default)]
    pub target: Option<NodeId>,
    /// Whether the button is offered at all.
    #[serde(default = "Filter::passing")]
    pub enabled: Filter,
    /// Whether an offered button can be clicked.
    #[serde(default = "Filter::passing")]
    pub interactable: Filter,
    /// Whether the button is shown as already used.
    #[serde(default)]
    pub used: Filter,
    /// Mark the button used once activated.
    #[serde(default)]
    pub auto_use: bool,
    /// Stop offering the button once activated.
    #[serde(default)]
    pub auto_disable: bool,
}

impl ButtonEntry {
    pub fn new(message: impl Into<String>, target: Option<NodeId>) -> Self {
        Self {
            message: message.into(),
            target,
            enabled: Filter::passing(),
            interactable: Filter::passing(),
            used: Filter::new(),
            auto_use: false,
            auto_disable: false,
        }
    }

    pub fn auto_use(mut self) -> Self {
        self.auto_use = true;
        self
    }

    pub fn auto_disable(mut self) -> Self {
        self.auto_disable = true;
        self
    }

    pub fn enabled_when(mut self, filter: Filter) -> Self {
        self.enabled = filter;
        self
    }

    pub fn interactable_when(mut self, filter: Filter) -> Self {
        self.interactable = filter;
        self
    }
}

/// An article section added to the in-game encyclopedia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncyclopediaEntry {
    pub title: String,
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogSeverity {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaypointAction {
    Set,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraitOperation {
    Add,
    Remove,
}

/// Something an event node asks the game to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EncounterEvent {
    DebugLog {
        message: String,
        #[serde(default)]
        severity: LogSeverity,
    },
    Dialog {
        #[serde(default)]
        title: Option<String>,
        message: String,
    },
    Waypoint {
        waypoint: String,
        action: WaypointAction,
    },
    TraitMutation {
        trait_id: String,
        operation: TraitOperation,
    },
    /// Wait for game time to pass. A halting delay is completed by the sequencer.
    Delay { seconds: f32 },
    Custom {
        name: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl EncounterEvent {
    /// Wire tag of the invocation.
    pub fn type_name(&self) -> &'static str {
        match self {
            EncounterEvent::DebugLog { .. } => "DebugLog",
            EncounterEvent::Dialog { .. } => "Dialog",
            EncounterEvent::Waypoint { .. } => "Waypoint",
            EncounterEvent::TraitMutation { .. } => "TraitMutation",
            EncounterEvent::Delay { .. } => "Delay",
            EncounterEvent::Custom { .. } => "Custom",
        }
    }
}

/// An invocation fired by an event node when its filter passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    #[serde(default = "Filter::passing")]
    pub filter: Filter,
    /// The node may not advance until this invocation reports completion.
    #[serde(default)]
    pub halting: bool,
    pub event: EncounterEvent,
}

impl EventEntry {
    pub fn new(event: EncounterEvent) -> Self {
        Self {
            filter: Filter::passing(),
            halting: false,
            event,
        }
    }

    pub fn halting(mut self) -> Self {
        self.halting = true;
        self
    }

    pub fn when(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// The three ways a player can close a dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DialogOutcome {
    Confirm,
    Deny,
    Cancel,
}

impl std::fmt::Display for DialogOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialogOutcome::Confirm => write!(f, "confirm"),
            DialogOutcome::Deny => write!(f, "deny"),
            DialogOutcome::Cancel => write!(f, "cancel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogOption {
    pub text: String,
    #[serde(default)]
    pub target: Option<NodeId>,
}

impl DialogOption {
    pub fn new(text: impl Into<String>, target: Option<NodeId>) -> Self {
        Self {
            text: text.into(),
            target,
        }
    }
}

/// A modal dialog with up to three outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogEntry {
    #[serde(default = "Filter::passing")]
    pub filter: Filter,
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default)]
    pub confirm: Option<DialogOption>,
    #[serde(default)]
    pub deny: Option<DialogOption>,
    #[serde(default)]
    pub cancel: Option<DialogOption>,
}

impl DialogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            filter: Filter::passing(),
            title: None,
            message: message.into(),
            confirm: None,
            deny: None,
            cancel: None,
        }
    }

    pub fn with_outcome(mut self, outcome: DialogOutcome, option: DialogOption) -> Self {
        match outcome {
            DialogOutcome::Confirm => self.confirm = Some(option),
            DialogOutcome::Deny => self.deny = Some(option),
            DialogOutcome::Cancel => self.cancel = Some(option),
        }
        self
    }

    pub fn option(&self, outcome: DialogOutcome) -> Option<&DialogOption> {
        match outcome {
            DialogOutcome::Confirm => self.confirm.as_ref(),
            DialogOutcome::Deny => self.deny.as_ref(),
            DialogOutcome::Cancel => self.cancel.as_ref(),
        }
    }

    /// Configured outcomes in confirm, deny, cancel order.
    pub fn outcomes(&self) -> Vec<(DialogOutcome, &DialogOption)> {
        [DialogOutcome::Confirm, DialogOutcome::Deny, DialogOutcome::Cancel]
            .into_iter()
            .filter_map(|outcome| self.option(outcome).map(|option| (outcome, option)))
            .collect()
    }
}

/// Actor portrait management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BustEntry {
    Initialize {
        actor: ActorId,
        name: String,
        #[serde(default)]
        avatar: Option<String>,
    },
    /// Bring an actor to the front. Waits for the transition unless instant.
    Focus {
        actor: ActorId,
        #[serde(default)]
        instant: bool,
    },
}

impl BustEntry {
    pub fn actor(&self) -> &ActorId {
        match self {
            BustEntry::Initialize { actor, .. } | BustEntry::Focus { actor, .. } => actor,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            BustEntry::Initialize { .. } => "Initialize",
            BustEntry::Focus { .. } => "Focus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConversationStyle {
    #[default]
    Message,
    Prompt,
}

/// A line of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    #[serde(default)]
    pub actor: Option<ActorId>,
    #[serde(default)]
    pub style: ConversationStyle,
    pub message: String,
    /// Visual grouping only.
    #[serde(default)]
    pub indent: u8,
}

impl ConversationEntry {
    pub fn new(actor: Option<ActorId>, message: impl Into<String>) -> Self {
        Self {
            actor,
            style: ConversationStyle::Message,
            message: message.into(),
            indent: 0,
        }
    }
}

pub type SwitchEdge = Edge<SwitchEntry>;
pub type ButtonEdge = Edge<ButtonEntry>;
pub type EncyclopediaEdge = Edge<EncyclopediaEntry>;
pub type EventEdge = Edge<EventEntry>;
pub type DialogEdge = Edge<DialogEntry>;
pub type BustEdge = Edge<BustEntry>;
pub type ConversationEdge = Edge<ConversationEntry>;
