//! Nodes - the vertices of an encounter graph.

use serde::{Deserialize, Serialize};

use encounter_rules::{FactSource, KeyValueOperation};

use super::edge::{
    active, BustEdge, ButtonEdge, ConversationEdge, DialogEdge, EdgeKind, EncyclopediaEdge,
    EventEdge, SwitchEdge,
};
use super::ids::{non_blank, EdgeId, NodeId};

/// What "no target" means at a particular resolution site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlankPolicy {
    /// A blank reference is an authoring error.
    Disallowed,
    /// A blank reference uses the owning node's fallback.
    FallsThrough,
    /// The owning node's kind decides.
    SpecifiedByModel,
}

/// The nine node kinds, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeTag {
    Empty,
    KeyValue,
    Switch,
    Button,
    Encyclopedia,
    Event,
    Dialog,
    Bust,
    Conversation,
}

impl NodeTag {
    pub const ALL: [NodeTag; 9] = [
        NodeTag::Empty,
        NodeTag::KeyValue,
        NodeTag::Switch,
        NodeTag::Button,
        NodeTag::Encyclopedia,
        NodeTag::Event,
        NodeTag::Dialog,
        NodeTag::Bust,
        NodeTag::Conversation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeTag::Empty => "Empty",
            NodeTag::KeyValue => "KeyValue",
            NodeTag::Switch => "Switch",
            NodeTag::Button => "Button",
            NodeTag::Encyclopedia => "Encyclopedia",
            NodeTag::Event => "Event",
            NodeTag::Dialog => "Dialog",
            NodeTag::Bust => "Bust",
            NodeTag::Conversation => "Conversation",
        }
    }

    /// The kind of edge this node kind carries, if any.
    pub fn edge_kind(self) -> Option<EdgeKind> {
        match self {
            NodeTag::Empty | NodeTag::KeyValue => None,
            NodeTag::Switch => Some(EdgeKind::Switch),
            NodeTag::Button => Some(EdgeKind::Button),
            NodeTag::Encyclopedia => Some(EdgeKind::Encyclopedia),
            NodeTag::Event => Some(EdgeKind::Event),
            NodeTag::Dialog => Some(EdgeKind::Dialog),
            NodeTag::Bust => Some(EdgeKind::Bust),
            NodeTag::Conversation => Some(EdgeKind::Conversation),
        }
    }
}

impl std::fmt::Display for NodeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a switch picks its branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SwitchSelection {
    /// First edge, in index order, whose filter passes.
    #[default]
    FirstFilter,
    /// Uniform pick among all edges; filters ignored.
    Random,
    /// Pick proportional to edge weight; filters ignored.
    RandomWeighted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValueNode {
    #[serde(default)]
    pub operations: Vec<KeyValueOperation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchNode {
    #[serde(default)]
    pub selection: SwitchSelection,
    #[serde(default)]
    pub edges: Vec<SwitchEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonNode {
    #[serde(default)]
    pub edges: Vec<ButtonEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncyclopediaNode {
    #[serde(default)]
    pub edges: Vec<EncyclopediaEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventNode {
    /// Every fired invocation halts the node.
    #[serde(default)]
    pub always_halting: bool,
    #[serde(default)]
    pub edges: Vec<EventEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogNode {
    #[serde(default)]
    pub edges: Vec<DialogEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BustNode {
    #[serde(default)]
    pub edges: Vec<BustEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationNode {
    #[serde(default)]
    pub edges: Vec<ConversationEdge>,
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    Empty,
    KeyValue(KeyValueNode),
    Switch(SwitchNode),
    Button(ButtonNode),
    Encyclopedia(EncyclopediaNode),
    Event(EventNode),
    Dialog(DialogNode),
    Bust(BustNode),
    Conversation(ConversationNode),
}

/// Edge envelope fields, independent of the entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeHeader<'a> {
    pub id: &'a EdgeId,
    pub index: i32,
    pub ignore: bool,
}

/// A forward reference held by a node or one of its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    /// The edge holding the reference; `None` for the node's own fallback.
    pub edge: Option<&'a EdgeId>,
    pub target: Option<&'a NodeId>,
    pub policy: BlankPolicy,
}

macro_rules! headers {
    ($edges:expr) => {
        $edges
            .iter()
            .map(|edge| EdgeHeader {
                id: &edge.id,
                index: edge.index,
                ignore: edge.ignore,
            })
            .collect()
    };
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Empty => NodeTag::Empty,
            NodeKind::KeyValue(_) => NodeTag::KeyValue,
            NodeKind::Switch(_) => NodeTag::Switch,
            NodeKind::Button(_) => NodeTag::Button,
            NodeKind::Encyclopedia(_) => NodeTag::Encyclopedia,
            NodeKind::Event(_) => NodeTag::Event,
            NodeKind::Dialog(_) => NodeTag::Dialog,
            NodeKind::Bust(_) => NodeTag::Bust,
            NodeKind::Conversation(_) => NodeTag::Conversation,
        }
    }

    /// How a blank fallback on a node of this kind resolves.
    ///
    /// Never returns [`BlankPolicy::SpecifiedByModel`].
    pub fn model_blank_policy(&self) -> BlankPolicy {
        match self {
            NodeKind::Encyclopedia(_) => BlankPolicy::Disallowed,
            _ => BlankPolicy::FallsThrough,
        }
    }

    /// Envelope fields of every edge, in stored order.
    pub fn edge_headers(&self) -> Vec<EdgeHeader<'_>> {
        match self {
            NodeKind::Empty | NodeKind::KeyValue(_) => Vec::new(),
            NodeKind::Switch(node) => headers!(node.edges),
            NodeKind::Button(node) => headers!(node.edges),
            NodeKind::Encyclopedia(node) => headers!(node.edges),
            NodeKind::Event(node) => headers!(node.edges),
            NodeKind::Dialog(node) => headers!(node.edges),
            NodeKind::Bust(node) => headers!(node.edges),
            NodeKind::Conversation(node) => headers!(node.edges),
        }
    }

    /// Targets held by non-ignored edges. Dialog edges contribute one per outcome.
    pub fn edge_references(&self) -> Vec<Reference<'_>> {
        match self {
            NodeKind::Switch(node) => active(&node.edges)
                .into_iter()
                .map(|edge| edge_reference(&edge.id, edge.entry.target.as_ref()))
                .collect(),
            NodeKind::Button(node) => active(&node.edges)
                .into_iter()
                .map(|edge| edge_reference(&edge.id, edge.entry.target.as_ref()))
                .collect(),
            NodeKind::Dialog(node) => {
                let mut references = Vec::new();
                for edge in active(&node.edges) {
                    let outcomes = edge.entry.outcomes();
                    if outcomes.is_empty() {
                        references.push(edge_reference(&edge.id, None));
                    }
                    for (_, option) in outcomes {
                        references.push(edge_reference(&edge.id, option.target.as_ref()));
                    }
                }
                references
            }
            _ => Vec::new(),
        }
    }
}

fn edge_reference<'a>(edge: &'a EdgeId, target: Option<&'a NodeId>) -> Reference<'a> {
    Reference {
        edge: Some(edge),
        target,
        policy: BlankPolicy::FallsThrough,
    }
}

/// A node of an encounter graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub beginning: bool,
    #[serde(default)]
    pub ending: bool,
    /// Seconds of game time to linger before auto-advancing.
    #[serde(default)]
    pub duration: Option<f32>,
    #[serde(default)]
    pub fallback: Option<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            index: 0,
            name: None,
            notes: None,
            beginning: false,
            ending: false,
            duration: None,
            fallback: None,
            kind,
        }
    }

    pub fn beginning(mut self) -> Self {
        self.beginning = true;
        self
    }

    pub fn ending(mut self) -> Self {
        self.ending = true;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Into<NodeId>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    pub fn tag(&self) -> NodeTag {
        self.kind.tag()
    }

    /// Envelope fields of this node's edges in ascending index order.
    ///
    /// Ignored edges are included; resolution skips them.
    pub fn edges(&self) -> Vec<EdgeHeader<'_>> {
        let mut headers = self.kind.edge_headers();
        headers.sort_by_key(|header| header.index);
        headers
    }

    /// The node's own fallback, or `None` when blank.
    pub fn fallback(&self) -> Option<&NodeId> {
        non_blank(self.fallback.as_ref())
    }

    /// Every forward reference this node holds, the fallback first.
    pub fn references(&self) -> Vec<Reference<'_>> {
        let mut references = vec![Reference {
            edge: None,
            target: self.fallback.as_ref(),
            policy: BlankPolicy::SpecifiedByModel,
        }];
        references.extend(self.kind.edge_references());
        references
    }

    /// The statically known next node for fact-driven kinds.
    ///
    /// Player-driven kinds (button, dialog) and random switches have no
    /// candidate until the run supplies one, and a blank fallback gives
    /// `None` here; the sequencer resolves it further.
    pub fn next_candidate(&self, facts: &(impl FactSource + ?Sized)) -> Option<&NodeId> {
        match &self.kind {
            NodeKind::Switch(node) => match node.selection {
                SwitchSelection::FirstFilter => active(&node.edges)
                    .into_iter()
                    .find(|edge| edge.entry.filter.evaluate(facts))
                    .map_or_else(
                        || self.fallback(),
                        |edge| non_blank(edge.entry.target.as_ref()).or(self.fallback()),
                    ),
                SwitchSelection::Random | SwitchSelection::RandomWeighted => None,
            },
            NodeKind::Button(_) | NodeKind::Dialog(_) => None,
            _ => self.fallback(),
        }
    }
}
