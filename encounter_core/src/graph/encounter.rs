//! The encounter container and its playable, indexed form.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use encounter_rules::EncounterId;

use super::ids::{non_blank, NodeId};
use super::node::Node;
use super::validation::{self, ValidationConfig};
use crate::error::GraphIntegrityError;

/// Weights an external encounter selector uses to pick this encounter.
///
/// Not interpreted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionWeights {
    #[serde(default)]
    pub order: i32,
    #[serde(default = "default_chance")]
    pub chance: f32,
}

fn default_chance() -> f32 {
    1.0
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            order: 0,
            chance: default_chance(),
        }
    }
}

/// An authored encounter: a flat collection of nodes wired by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub selection: SelectionWeights,
    /// Where blank fallbacks lead.
    #[serde(default)]
    pub default_end: Option<NodeId>,
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Encounter {
    pub fn new(id: impl Into<EncounterId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            selection: SelectionWeights::default(),
            default_end: None,
            nodes: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_default_end(mut self, node: impl Into<NodeId>) -> Self {
        self.default_end = Some(node.into());
        self
    }

    /// Find a node by id (linear scan; use [`EncounterGraph`] for runs).
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| &node.id == id)
    }

    /// The default end, or `None` when blank.
    pub fn default_end(&self) -> Option<&NodeId> {
        non_blank(self.default_end.as_ref())
    }

    /// Check the graph is playable, stopping at the first violation.
    pub fn validate(&self, config: &ValidationConfig) -> Result<(), GraphIntegrityError> {
        match validation::check(self, config).into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Every violation, for authoring tools.
    pub fn integrity_report(&self, config: &ValidationConfig) -> Vec<GraphIntegrityError> {
        validation::check(self, config)
    }
}

/// A validated encounter indexed for lookups by id.
///
/// Borrows the encounter for the whole run; nodes are handed out with the
/// encounter's lifetime.
#[derive(Debug, Clone)]
pub struct EncounterGraph<'a> {
    encounter: &'a Encounter,
    index: HashMap<&'a NodeId, usize>,
    beginning: usize,
}

impl<'a> EncounterGraph<'a> {
    /// Validate and index an encounter.
    pub fn new(
        encounter: &'a Encounter,
        config: &ValidationConfig,
    ) -> Result<Self, GraphIntegrityError> {
        encounter.validate(config)?;

        let index: HashMap<&'a NodeId, usize> = encounter
            .nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (&node.id, position))
            .collect();
        let beginning = encounter
            .nodes
            .iter()
            .position(|node| node.beginning)
            .ok_or(GraphIntegrityError::MissingBeginning)?;

        Ok(Self {
            encounter,
            index,
            beginning,
        })
    }

    pub fn encounter(&self) -> &'a Encounter {
        self.encounter
    }

    pub fn id(&self) -> &'a EncounterId {
        &self.encounter.id
    }

    pub fn get(&self, id: &NodeId) -> Option<&'a Node> {
        let encounter: &'a Encounter = self.encounter;
        self.index
            .get(id)
            .map(|&position| &encounter.nodes[position])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    pub fn beginning(&self) -> &'a Node {
        let encounter: &'a Encounter = self.encounter;
        &encounter.nodes[self.beginning]
    }

    pub fn default_end(&self) -> Option<&'a NodeId> {
        let encounter: &'a Encounter = self.encounter;
        encounter.default_end()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
