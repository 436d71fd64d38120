//! # Graph Resolution
//!
//! Per-kind rules deciding what a node does when entered and where the run
//! goes next. Resolution applies fact mutations directly and reports every
//! other side effect as an [`Effect`] for the sequencer to publish.
//!
//! Every reference is resolved under a [`BlankPolicy`]:
//! - a node's own fallback uses `SpecifiedByModel`, which falls through to the
//!   encounter's default end except on encyclopedia nodes;
//! - edge and outcome targets use `FallsThrough`, landing on the owner's fallback.

mod choice;
mod switch;

pub use choice::*;
pub use switch::*;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use encounter_rules::{
    ordered_operations, EncounterContext, FactDelta, FactSource, FactTarget,
};

use crate::error::{EncounterError, GraphIntegrityError, Result};
use crate::graph::{
    active, non_blank, ActorId, BlankPolicy, BustEntry, ConversationEntry, EdgeId,
    EncounterEvent, EncounterGraph, EncyclopediaEntry, Node, NodeId, NodeKind,
};

/// A resolved move to another node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Next {
    pub target: NodeId,
    /// The edge the move came from, when an edge chose it.
    pub edge: Option<EdgeId>,
}

impl Next {
    pub fn new(target: &NodeId, edge: Option<&EdgeId>) -> Self {
        Self {
            target: target.clone(),
            edge: edge.cloned(),
        }
    }
}

/// What entering a node asks of the sequencer.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Done; move on once any duration has passed.
    Continue { next: Option<Next> },
    /// Move on once every halting effect has completed.
    Halt { next: Option<Next> },
    /// Wait for the player to activate one of these buttons.
    AwaitButton { options: Vec<ButtonOption> },
    /// Wait for the player to close this dialog.
    AwaitOutcome { prompt: DialogPrompt },
}

/// A side effect produced while resolving a node, in edge order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FactsChanged {
        target: FactTarget,
        deltas: Vec<FactDelta>,
    },
    Invoke {
        edge: EdgeId,
        event: EncounterEvent,
        halting: bool,
    },
    ArticleSection {
        edge: EdgeId,
        section: EncyclopediaEntry,
    },
    InitializeActor {
        edge: EdgeId,
        actor: ActorId,
        name: String,
        avatar: Option<String>,
    },
    FocusActor {
        edge: EdgeId,
        actor: ActorId,
        halting: bool,
    },
    Message {
        edge: EdgeId,
        entry: ConversationEntry,
    },
}

/// Outcome of resolving one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub step: Step,
    pub effects: Vec<Effect>,
}

/// Resolve a reference held by `node` (on `edge`, if any) under `policy`.
///
/// `Ok(None)` only happens on ending nodes, where a blank reference is moot.
pub fn follow(
    graph: &EncounterGraph<'_>,
    node: &Node,
    edge: Option<&EdgeId>,
    reference: Option<&NodeId>,
    policy: BlankPolicy,
) -> Result<Option<Next>> {
    if let Some(target) = non_blank(reference) {
        return Ok(Some(Next::new(target, edge)));
    }
    if node.ending {
        return Ok(None);
    }

    let blank = || -> EncounterError {
        GraphIntegrityError::BlankReference {
            node: node.id.clone(),
            edge: edge.cloned(),
        }
        .into()
    };
    match policy {
        BlankPolicy::Disallowed => Err(blank()),
        BlankPolicy::FallsThrough if edge.is_some() => fallback(graph, node),
        BlankPolicy::FallsThrough => graph
            .default_end()
            .map(|end| Some(Next::new(end, None)))
            .ok_or_else(blank),
        BlankPolicy::SpecifiedByModel => {
            let policy = match node.kind.model_blank_policy() {
                BlankPolicy::SpecifiedByModel => BlankPolicy::Disallowed,
                policy => policy,
            };
            follow(graph, node, edge, None, policy)
        }
    }
}

/// Resolve a node's own fallback.
pub fn fallback(graph: &EncounterGraph<'_>, node: &Node) -> Result<Option<Next>> {
    follow(
        graph,
        node,
        None,
        node.fallback.as_ref(),
        BlankPolicy::SpecifiedByModel,
    )
}

/// Resolves nodes against one run's context.
pub struct Resolver<'r, 'a> {
    graph: &'r EncounterGraph<'a>,
    context: &'r mut EncounterContext,
    rng: &'r mut dyn RngCore,
    marks: &'r ButtonMarks,
}

impl<'r, 'a> Resolver<'r, 'a> {
    pub fn new(
        graph: &'r EncounterGraph<'a>,
        context: &'r mut EncounterContext,
        rng: &'r mut dyn RngCore,
        marks: &'r ButtonMarks,
    ) -> Self {
        Self {
            graph,
            context,
            rng,
            marks,
        }
    }

    /// Run a node's side effects and decide what happens next.
    pub fn resolve(self, node: &Node) -> Result<Resolution> {
        let graph = self.graph;
        let mut effects = Vec::new();

        let step = match &node.kind {
            NodeKind::Empty => Step::Continue {
                next: fallback(graph, node)?,
            },

            NodeKind::KeyValue(key_value) => {
                let encounter_before = self.context.encounter_facts.duplicate();
                let global_before = self.context.global_facts.duplicate();
                for operation in ordered_operations(&key_value.operations) {
                    self.context.apply(operation);
                }

                for (target, before) in [
                    (FactTarget::Encounter, encounter_before),
                    (FactTarget::Global, global_before),
                ] {
                    let deltas = before.diff(self.context.store(target));
                    if !deltas.is_empty() {
                        effects.push(Effect::FactsChanged { target, deltas });
                    }
                }
                Step::Continue {
                    next: fallback(graph, node)?,
                }
            }

            NodeKind::Switch(switch) => {
                let next = match select_edge(switch, &*self.context, self.rng) {
                    Some(edge) => follow(
                        graph,
                        node,
                        Some(&edge.id),
                        edge.entry.target.as_ref(),
                        BlankPolicy::FallsThrough,
                    )?,
                    None => fallback(graph, node)?,
                };
                Step::Continue { next }
            }

            NodeKind::Button(buttons) => {
                let options = button_options(&node.id, buttons, self.marks, &*self.context);
                if options.is_empty() {
                    Step::Continue {
                        next: fallback(graph, node)?,
                    }
                } else {
                    Step::AwaitButton { options }
                }
            }

            NodeKind::Encyclopedia(encyclopedia) => {
                for edge in active(&encyclopedia.edges) {
                    effects.push(Effect::ArticleSection {
                        edge: edge.id.clone(),
                        section: edge.entry.clone(),
                    });
                }
                Step::Continue {
                    next: fallback(graph, node)?,
                }
            }

            NodeKind::Event(event) => {
                for edge in active(&event.edges) {
                    if !edge.entry.filter.evaluate(&*self.context) {
                        continue;
                    }
                    effects.push(Effect::Invoke {
                        edge: edge.id.clone(),
                        event: edge.entry.event.clone(),
                        halting: event.always_halting || edge.entry.halting,
                    });
                }
                let halting = event.always_halting
                    || effects
                        .iter()
                        .any(|effect| matches!(effect, Effect::Invoke { halting: true, .. }));
                let next = fallback(graph, node)?;
                if halting {
                    Step::Halt { next }
                } else {
                    Step::Continue { next }
                }
            }

            NodeKind::Dialog(dialog) => match active_dialog(dialog, &*self.context) {
                Some(edge) => Step::AwaitOutcome {
                    prompt: dialog_prompt(edge),
                },
                None => Step::Continue {
                    next: fallback(graph, node)?,
                },
            },

            NodeKind::Bust(bust) => {
                let mut halting = false;
                for edge in active(&bust.edges) {
                    effects.push(match &edge.entry {
                        BustEntry::Initialize {
                            actor,
                            name,
                            avatar,
                        } => Effect::InitializeActor {
                            edge: edge.id.clone(),
                            actor: actor.clone(),
                            name: name.clone(),
                            avatar: avatar.clone(),
                        },
                        BustEntry::Focus { actor, instant } => {
                            halting |= !instant;
                            Effect::FocusActor {
                                edge: edge.id.clone(),
                                actor: actor.clone(),
                                halting: !instant,
                            }
                        }
                    });
                }
                let next = fallback(graph, node)?;
                if halting {
                    Step::Halt { next }
                } else {
                    Step::Continue { next }
                }
            }

            NodeKind::Conversation(conversation) => {
                for edge in active(&conversation.edges) {
                    effects.push(Effect::Message {
                        edge: edge.id.clone(),
                        entry: edge.entry.clone(),
                    });
                }
                Step::Continue {
                    next: fallback(graph, node)?,
                }
            }
        };

        Ok(Resolution { step, effects })
    }
}
