//! Predicates - the individual conditions a filter entry tests.

use serde::{Deserialize, Serialize};

use crate::context::{FactSource, Interaction};
use crate::facts::{floats_match, FactKey, FactTarget};
use crate::ids::EncounterId;

/// Ordering comparison for numeric predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Comparison {
    #[default]
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl Comparison {
    /// Compare two integers.
    pub fn integers(self, actual: i32, expected: i32) -> bool {
        match self {
            Comparison::Equal => actual == expected,
            Comparison::NotEqual => actual != expected,
            Comparison::Less => actual < expected,
            Comparison::LessOrEqual => actual <= expected,
            Comparison::Greater => actual > expected,
            Comparison::GreaterOrEqual => actual >= expected,
        }
    }

    /// Compare two floats; equality is approximate.
    pub fn floats(self, actual: f32, expected: f32) -> bool {
        let equal = floats_match(actual, expected);
        match self {
            Comparison::Equal => equal,
            Comparison::NotEqual => !equal,
            Comparison::Less => actual < expected && !equal,
            Comparison::LessOrEqual => actual < expected || equal,
            Comparison::Greater => actual > expected && !equal,
            Comparison::GreaterOrEqual => actual > expected || equal,
        }
    }
}

/// The kind tag of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateKind {
    Boolean,
    Integer,
    Float,
    String,
    Enumeration,
    EncounterInteracted,
}

/// A single raw condition, before negation.
///
/// Unset keys read as the zero value of the predicate's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Predicate {
    Boolean {
        #[serde(default)]
        target: FactTarget,
        key: FactKey,
        value: bool,
    },
    Integer {
        #[serde(default)]
        target: FactTarget,
        key: FactKey,
        #[serde(default)]
        comparison: Comparison,
        value: i32,
    },
    Float {
        #[serde(default)]
        target: FactTarget,
        key: FactKey,
        #[serde(default)]
        comparison: Comparison,
        value: f32,
    },
    String {
        #[serde(default)]
        target: FactTarget,
        key: FactKey,
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    Enumeration {
        #[serde(default)]
        target: FactTarget,
        key: FactKey,
        value: i32,
    },
    /// Passes when the encounter (the running one when blank) has the interaction on record.
    EncounterInteracted {
        #[serde(default)]
        encounter: Option<EncounterId>,
        interaction: Interaction,
    },
}

impl Predicate {
    /// Encounter-scoped boolean equality.
    pub fn boolean(key: impl Into<FactKey>, value: bool) -> Self {
        Predicate::Boolean {
            target: FactTarget::Encounter,
            key: key.into(),
            value,
        }
    }

    /// Encounter-scoped integer comparison.
    pub fn integer(key: impl Into<FactKey>, comparison: Comparison, value: i32) -> Self {
        Predicate::Integer {
            target: FactTarget::Encounter,
            key: key.into(),
            comparison,
            value,
        }
    }

    /// Encounter-scoped float comparison.
    pub fn float(key: impl Into<FactKey>, comparison: Comparison, value: f32) -> Self {
        Predicate::Float {
            target: FactTarget::Encounter,
            key: key.into(),
            comparison,
            value,
        }
    }

    /// Encounter-scoped, case-sensitive string equality.
    pub fn string(key: impl Into<FactKey>, value: impl Into<String>) -> Self {
        Predicate::String {
            target: FactTarget::Encounter,
            key: key.into(),
            value: value.into(),
            ignore_case: false,
        }
    }

    /// Encounter-scoped enumeration equality.
    pub fn enumeration(key: impl Into<FactKey>, value: i32) -> Self {
        Predicate::Enumeration {
            target: FactTarget::Encounter,
            key: key.into(),
            value,
        }
    }

    /// Interaction check against another encounter (or the running one for `None`).
    pub fn interacted(encounter: Option<EncounterId>, interaction: Interaction) -> Self {
        Predicate::EncounterInteracted {
            encounter,
            interaction,
        }
    }

    /// Get the kind tag.
    pub fn kind(&self) -> PredicateKind {
        match self {
            Predicate::Boolean { .. } => PredicateKind::Boolean,
            Predicate::Integer { .. } => PredicateKind::Integer,
            Predicate::Float { .. } => PredicateKind::Float,
            Predicate::String { .. } => PredicateKind::String,
            Predicate::Enumeration { .. } => PredicateKind::Enumeration,
            Predicate::EncounterInteracted { .. } => PredicateKind::EncounterInteracted,
        }
    }

    /// Test the raw condition against a fact source.
    pub fn test(&self, facts: &(impl FactSource + ?Sized)) -> bool {
        match self {
            Predicate::Boolean { target, key, value } => {
                facts.store(*target).get_boolean(key, false) == *value
            }
            Predicate::Integer {
                target,
                key,
                comparison,
                value,
            } => comparison.integers(facts.store(*target).get_integer(key, 0), *value),
            Predicate::Float {
                target,
                key,
                comparison,
                value,
            } => comparison.floats(facts.store(*target).get_float(key, 0.0), *value),
            Predicate::String {
                target,
                key,
                value,
                ignore_case,
            } => {
                let actual = facts.store(*target).get_string(key, "");
                if *ignore_case {
                    actual.to_lowercase() == value.to_lowercase()
                } else {
                    actual == *value
                }
            }
            Predicate::Enumeration { target, key, value } => {
                facts.store(*target).get_enumeration(key, 0) == *value
            }
            Predicate::EncounterInteracted {
                encounter,
                interaction,
            } => {
                let encounter = match encounter.as_ref().filter(|id| !id.is_blank()) {
                    Some(id) => Some(id),
                    None => facts.current_encounter(),
                };
                match (encounter, facts.interactions()) {
                    (Some(id), Some(history)) => history.has(id, *interaction),
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EncounterContext;
    use crate::facts::KeyValueStore;

    #[test]
    fn test_integer_comparisons() {
        assert!(Comparison::Less.integers(1, 2));
        assert!(!Comparison::Less.integers(2, 2));
        assert!(Comparison::LessOrEqual.integers(2, 2));
        assert!(Comparison::GreaterOrEqual.integers(3, 2));
        assert!(Comparison::NotEqual.integers(3, 2));
    }

    #[test]
    fn test_float_comparisons_are_tolerant() {
        assert!(Comparison::Equal.floats(0.3, 0.1 + 0.2));
        assert!(!Comparison::Greater.floats(0.1 + 0.2, 0.3));
        assert!(Comparison::GreaterOrEqual.floats(0.1 + 0.2, 0.3));
        assert!(Comparison::Less.floats(0.2, 0.3));
    }

    #[test]
    fn test_unset_keys_read_zero_values() {
        let store = KeyValueStore::new();
        assert!(Predicate::boolean("docked", false).test(&store));
        assert!(Predicate::integer("credits", Comparison::Equal, 0).test(&store));
        assert!(Predicate::string("name", "").test(&store));
        assert!(!Predicate::enumeration("alert", 1).test(&store));
    }

    #[test]
    fn test_string_case_handling() {
        let mut store = KeyValueStore::new();
        store.set_string("faction", "Guild");

        assert!(!Predicate::string("faction", "guild").test(&store));
        let relaxed = Predicate::String {
            target: FactTarget::Encounter,
            key: "faction".into(),
            value: "GUILD".into(),
            ignore_case: true,
        };
        assert!(relaxed.test(&store));
    }

    #[test]
    fn test_interaction_predicate() {
        let mut context = EncounterContext::new().for_encounter(EncounterId::new("relay"));
        let seen_here = Predicate::interacted(None, Interaction::Seen);
        let seen_other = Predicate::interacted(Some(EncounterId::new("wreck")), Interaction::Seen);

        assert!(!seen_here.test(&context));
        context.record_interaction(Interaction::Seen);
        assert!(seen_here.test(&context));
        assert!(!seen_other.test(&context));

        // A bare store has no history.
        assert!(!seen_here.test(&KeyValueStore::new()));
    }

    #[test]
    fn test_predicate_kind_tags() {
        assert_eq!(Predicate::boolean("a", true).kind(), PredicateKind::Boolean);
        assert_eq!(
            Predicate::interacted(None, Interaction::Completed).kind(),
            PredicateKind::EncounterInteracted
        );
    }
}
