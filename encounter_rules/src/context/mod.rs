//! Encounter context - the fact stores and history an encounter is evaluated against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::facts::{FactTarget, FactValue, KeyValueOperation, KeyValueStore};
use crate::ids::EncounterId;

/// Read-only view of facts used by filters and fact operations.
pub trait FactSource {
    /// The store holding facts of the given scope.
    fn store(&self, target: FactTarget) -> &KeyValueStore;

    /// Interaction history, when this source tracks one.
    fn interactions(&self) -> Option<&InteractionHistory> {
        None
    }

    /// The encounter currently being evaluated, if any.
    fn current_encounter(&self) -> Option<&EncounterId> {
        None
    }
}

/// A bare store answers for every scope.
impl FactSource for KeyValueStore {
    fn store(&self, _target: FactTarget) -> &KeyValueStore {
        self
    }
}

/// Kinds of recorded interaction with an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interaction {
    /// The encounter was started.
    Seen,
    /// The encounter ran to an ending node.
    Completed,
}

/// Interaction counters for a single encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub seen: u32,
    pub completed: u32,
}

impl InteractionRecord {
    pub fn count(&self, interaction: Interaction) -> u32 {
        match interaction {
            Interaction::Seen => self.seen,
            Interaction::Completed => self.completed,
        }
    }
}

/// Which encounters the player has already interacted with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionHistory {
    records: BTreeMap<EncounterId, InteractionRecord>,
}

impl InteractionHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction with an encounter.
    pub fn record(&mut self, encounter: &EncounterId, interaction: Interaction) {
        let record = self.records.entry(encounter.clone()).or_default();
        match interaction {
            Interaction::Seen => record.seen = record.seen.saturating_add(1),
            Interaction::Completed => record.completed = record.completed.saturating_add(1),
        }
    }

    /// Get the counters for an encounter (all zero when never seen).
    pub fn get(&self, encounter: &EncounterId) -> InteractionRecord {
        self.records.get(encounter).copied().unwrap_or_default()
    }

    /// Check whether an interaction happened at least once.
    pub fn has(&self, encounter: &EncounterId, interaction: Interaction) -> bool {
        self.get(encounter).count(interaction) > 0
    }

    /// Number of encounters with any record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Everything a single encounter run reads and writes.
///
/// The context is exclusively owned by one sequencer run; the owning game
/// flow gets it back once the run is over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterContext {
    /// The encounter currently being played.
    pub encounter: Option<EncounterId>,

    /// Facts scoped to the running encounter.
    pub encounter_facts: KeyValueStore,

    /// Facts shared with the rest of the game session.
    pub global_facts: KeyValueStore,

    /// Interactions with every encounter so far.
    pub interactions: InteractionHistory,
}

impl EncounterContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the encounter being played.
    pub fn for_encounter(mut self, encounter: EncounterId) -> Self {
        self.encounter = Some(encounter);
        self
    }

    /// Use an existing session-wide store as the global scope.
    pub fn with_global_facts(mut self, global: KeyValueStore) -> Self {
        self.global_facts = global;
        self
    }

    /// Use existing interaction history.
    pub fn with_interactions(mut self, interactions: InteractionHistory) -> Self {
        self.interactions = interactions;
        self
    }

    /// Get mutable access to one scope.
    pub fn store_mut(&mut self, target: FactTarget) -> &mut KeyValueStore {
        match target {
            FactTarget::Encounter => &mut self.encounter_facts,
            FactTarget::Global => &mut self.global_facts,
        }
    }

    /// Apply a fact operation, reading and writing the scopes it names.
    pub fn apply(&mut self, operation: &KeyValueOperation) -> FactValue {
        let value = operation.compute(&*self);
        tracing::trace!(
            key = %operation.key,
            target = ?operation.target,
            value = %value,
            "applying fact operation"
        );
        self.store_mut(operation.target).set(&operation.key, value)
    }

    /// Record an interaction with the current encounter, if one is set.
    pub fn record_interaction(&mut self, interaction: Interaction) {
        if let Some(encounter) = &self.encounter {
            self.interactions.record(encounter, interaction);
        }
    }
}

impl FactSource for EncounterContext {
    fn store(&self, target: FactTarget) -> &KeyValueStore {
        match target {
            FactTarget::Encounter => &self.encounter_facts,
            FactTarget::Global => &self.global_facts,
        }
    }

    fn interactions(&self) -> Option<&InteractionHistory> {
        Some(&self.interactions)
    }

    fn current_encounter(&self) -> Option<&EncounterId> {
        self.encounter.as_ref()
    }
}
