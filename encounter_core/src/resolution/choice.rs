//! Player-driven nodes: buttons and dialogs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use encounter_rules::FactSource;

use super::{follow, Next};
use crate::error::{EncounterError, Result};
use crate::graph::{
    active, BlankPolicy, ButtonEdge, ButtonNode, DialogEdge, DialogNode, DialogOutcome, EdgeId,
    EncounterGraph, Node, NodeId,
};

/// Marks a run has put on a button edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonMark {
    pub used: bool,
    pub disabled: bool,
}

/// Per-run button marks, keyed by owning node and edge.
#[derive(Debug, Clone, Default)]
pub struct ButtonMarks {
    marks: HashMap<(NodeId, EdgeId), ButtonMark>,
}

impl ButtonMarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: &NodeId, edge: &EdgeId) -> ButtonMark {
        self.marks
            .get(&(node.clone(), edge.clone()))
            .copied()
            .unwrap_or_default()
    }

    fn entry(&mut self, node: &NodeId, edge: &EdgeId) -> &mut ButtonMark {
        self.marks.entry((node.clone(), edge.clone())).or_default()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }
}

/// What a button edge currently looks like to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    pub enabled: bool,
    pub interactable: bool,
    pub used: bool,
}

/// A button offered to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonOption {
    pub edge: EdgeId,
    pub message: String,
    pub interactable: bool,
    pub used: bool,
}

/// Filters combined with the run's marks: a disabled mark hides the button,
/// a used mark shows it as used.
pub fn button_state(
    node: &NodeId,
    edge: &ButtonEdge,
    marks: &ButtonMarks,
    facts: &(impl FactSource + ?Sized),
) -> ButtonState {
    let mark = marks.get(node, &edge.id);
    ButtonState {
        enabled: !mark.disabled && edge.entry.enabled.evaluate(facts),
        interactable: edge.entry.interactable.evaluate(facts),
        used: mark.used || edge.entry.used.evaluate(facts),
    }
}

/// Enabled buttons in edge index order.
pub fn button_options(
    node: &NodeId,
    buttons: &ButtonNode,
    marks: &ButtonMarks,
    facts: &(impl FactSource + ?Sized),
) -> Vec<ButtonOption> {
    active(&buttons.edges)
        .into_iter()
        .filter_map(|edge| {
            let state = button_state(node, edge, marks, facts);
            state.enabled.then(|| ButtonOption {
                edge: edge.id.clone(),
                message: edge.entry.message.clone(),
                interactable: state.interactable,
                used: state.used,
            })
        })
        .collect()
}

/// Activate a button: check it is clickable, apply its auto flags, and
/// resolve its target.
pub fn activate_button(
    graph: &EncounterGraph<'_>,
    node: &Node,
    buttons: &ButtonNode,
    edge_id: &EdgeId,
    marks: &mut ButtonMarks,
    facts: &(impl FactSource + ?Sized),
) -> Result<Option<Next>> {
    let edge = active(&buttons.edges)
        .into_iter()
        .find(|edge| &edge.id == edge_id)
        .ok_or_else(|| EncounterError::UnknownEdge {
            node: node.id.clone(),
            edge: edge_id.clone(),
        })?;

    let state = button_state(&node.id, edge, marks, facts);
    if !state.enabled || !state.interactable {
        return Err(EncounterError::EdgeUnavailable {
            node: node.id.clone(),
            edge: edge_id.clone(),
        });
    }

    let next = follow(
        graph,
        node,
        Some(&edge.id),
        edge.entry.target.as_ref(),
        BlankPolicy::FallsThrough,
    )?;

    let mark = marks.entry(&node.id, &edge.id);
    if edge.entry.auto_use {
        mark.used = true;
    }
    if edge.entry.auto_disable {
        mark.disabled = true;
    }
    Ok(next)
}

/// An outcome offered to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeOption {
    pub outcome: DialogOutcome,
    pub text: String,
}

/// The dialog a node shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogPrompt {
    pub edge: EdgeId,
    pub title: Option<String>,
    pub message: String,
    pub outcomes: Vec<OutcomeOption>,
}

/// The first dialog edge, in index order, whose filter passes.
pub fn active_dialog<'n>(
    dialog: &'n DialogNode,
    facts: &(impl FactSource + ?Sized),
) -> Option<&'n DialogEdge> {
    active(&dialog.edges)
        .into_iter()
        .find(|edge| edge.entry.filter.evaluate(facts))
}

/// A dialog without configured outcomes can still be confirmed.
pub fn dialog_prompt(edge: &DialogEdge) -> DialogPrompt {
    let mut outcomes: Vec<OutcomeOption> = edge
        .entry
        .outcomes()
        .into_iter()
        .map(|(outcome, option)| OutcomeOption {
            outcome,
            text: option.text.clone(),
        })
        .collect();
    if outcomes.is_empty() {
        outcomes.push(OutcomeOption {
            outcome: DialogOutcome::Confirm,
            text: String::new(),
        });
    }

    DialogPrompt {
        edge: edge.id.clone(),
        title: edge.entry.title.clone(),
        message: edge.entry.message.clone(),
        outcomes,
    }
}

/// Resolve the target of the outcome the player chose.
pub fn choose_outcome(
    graph: &EncounterGraph<'_>,
    node: &Node,
    dialog: &DialogNode,
    edge_id: &EdgeId,
    outcome: DialogOutcome,
) -> Result<Option<Next>> {
    let edge = active(&dialog.edges)
        .into_iter()
        .find(|edge| &edge.id == edge_id)
        .ok_or_else(|| EncounterError::UnknownEdge {
            node: node.id.clone(),
            edge: edge_id.clone(),
        })?;

    let unavailable = || EncounterError::OutcomeUnavailable {
        node: node.id.clone(),
        outcome,
    };
    let target = if edge.entry.outcomes().is_empty() {
        if outcome != DialogOutcome::Confirm {
            return Err(unavailable());
        }
        None
    } else {
        edge.entry.option(outcome).ok_or_else(unavailable)?.target.as_ref()
    };

    follow(graph, node, Some(&edge.id), target, BlankPolicy::FallsThrough)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        ButtonEntry, DialogEntry, DialogOption, Edge, Encounter, NodeKind, ValidationConfig,
    };
    use encounter_rules::{Filter, KeyValueStore, Predicate};

    fn buttons() -> ButtonNode {
        ButtonNode {
            edges: vec![
                Edge::new("hail", ButtonEntry::new("Hail", Some("talk".into()))).with_index(0),
                Edge::new("flee", ButtonEntry::new("Flee", None).auto_disable()).with_index(1),
                Edge::new(
                    "bribe",
                    ButtonEntry::new("Bribe", Some("talk".into())).enabled_when(
                        Filter::new().with_predicate(Predicate::boolean("rich", true)),
                    ),
                )
                .with_index(2),
            ],
        }
    }

    fn encounter() -> Encounter {
        Encounter::new("pirates")
            .with_node(
                Node::new("menu", NodeKind::Button(buttons()))
                    .beginning()
                    .with_fallback("away"),
            )
            .with_node(Node::new("talk", NodeKind::Empty).ending())
            .with_node(Node::new("away", NodeKind::Empty).ending())
    }

    #[test]
    fn test_options_follow_enabled_filter() {
        let node = buttons();
        let marks = ButtonMarks::new();
        let mut store = KeyValueStore::new();
        let menu = NodeId::new("menu");

        let ids: Vec<String> = button_options(&menu, &node, &marks, &store)
            .into_iter()
            .map(|o| o.edge.0)
            .collect();
        assert_eq!(ids, vec!["hail", "flee"]);

        store.set_boolean("rich", true);
        assert_eq!(button_options(&menu, &node, &marks, &store).len(), 3);
    }

    #[test]
    fn test_activation_applies_auto_disable_and_falls_through() {
        let encounter = encounter();
        let graph = EncounterGraph::new(&encounter, &ValidationConfig::default()).unwrap();
        let node = graph.get(&NodeId::new("menu")).unwrap();
        let NodeKind::Button(buttons) = &node.kind else {
            panic!("menu is a button node");
        };
        let mut marks = ButtonMarks::new();
        let store = KeyValueStore::new();
        let flee = EdgeId::new("flee");

        let next = activate_button(&graph, node, buttons, &flee, &mut marks, &store).unwrap();
        assert_eq!(next.unwrap().target, NodeId::new("away"));
        assert!(marks.get(&node.id, &flee).disabled);
        assert!(!button_state(&node.id, &buttons.edges[1], &marks, &store).enabled);

        let again = activate_button(&graph, node, buttons, &flee, &mut marks, &store);
        assert!(matches!(again, Err(EncounterError::EdgeUnavailable { .. })));
    }

    #[test]
    fn test_unknown_and_disabled_buttons_rejected() {
        let encounter = encounter();
        let graph = EncounterGraph::new(&encounter, &ValidationConfig::default()).unwrap();
        let node = graph.get(&NodeId::new("menu")).unwrap();
        let NodeKind::Button(buttons) = &node.kind else {
            panic!("menu is a button node");
        };
        let mut marks = ButtonMarks::new();
        let store = KeyValueStore::new();

        let unknown = activate_button(&graph, node, buttons, &"nope".into(), &mut marks, &store);
        assert!(matches!(unknown, Err(EncounterError::UnknownEdge { .. })));

        let bribe = activate_button(&graph, node, buttons, &"bribe".into(), &mut marks, &store);
        assert!(matches!(bribe, Err(EncounterError::EdgeUnavailable { .. })));
    }

    #[test]
    fn test_dialog_prompt_and_outcomes() {
        let entry = DialogEntry::new("Board them?")
            .with_outcome(DialogOutcome::Confirm, DialogOption::new("Board", Some("talk".into())))
            .with_outcome(DialogOutcome::Cancel, DialogOption::new("Wait", None));
        let dialog = DialogNode {
            edges: vec![Edge::new("ask", entry)],
        };
        let encounter = Encounter::new("x")
            .with_node(
                Node::new("ask", NodeKind::Dialog(dialog.clone()))
                    .beginning()
                    .with_fallback("away"),
            )
            .with_node(Node::new("talk", NodeKind::Empty).ending())
            .with_node(Node::new("away", NodeKind::Empty).ending());
        let graph = EncounterGraph::new(&encounter, &ValidationConfig::default()).unwrap();
        let node = graph.beginning();
        let store = KeyValueStore::new();

        let edge = active_dialog(&dialog, &store).unwrap();
        let prompt = dialog_prompt(edge);
        assert_eq!(prompt.outcomes.len(), 2);
        assert_eq!(prompt.outcomes[1].outcome, DialogOutcome::Cancel);

        let ask = EdgeId::new("ask");
        let confirm = choose_outcome(&graph, node, &dialog, &ask, DialogOutcome::Confirm).unwrap();
        assert_eq!(confirm.unwrap().target, NodeId::new("talk"));
        let cancel = choose_outcome(&graph, node, &dialog, &ask, DialogOutcome::Cancel).unwrap();
        assert_eq!(cancel.unwrap().target, NodeId::new("away"));
        assert!(matches!(
            choose_outcome(&graph, node, &dialog, &ask, DialogOutcome::Deny),
            Err(EncounterError::OutcomeUnavailable { .. })
        ));
    }
}
