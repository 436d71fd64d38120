//! Predicate filters - grouped, negatable conditions that gate branches.
//!
//! Entries sharing a group tag are ANDed; the groups are ORed. A filter with
//! no entries returns its configured default, which is `false` unless the
//! filter was built with [`Filter::passing`].

mod predicate;

pub use predicate::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::context::FactSource;

/// One condition of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub group: u32,
    #[serde(default)]
    pub negate: bool,
    pub predicate: Predicate,
}

impl FilterEntry {
    /// Create an entry in group 0.
    pub fn new(predicate: Predicate) -> Self {
        Self {
            index: 0,
            group: 0,
            negate: false,
            predicate,
        }
    }

    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    pub fn in_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }

    /// Invert the entry's result.
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// The entry's result: the raw predicate XOR the negate flag.
    pub fn passes(&self, facts: &(impl FactSource + ?Sized)) -> bool {
        self.predicate.test(facts) != self.negate
    }

    /// The kind tag of the underlying predicate.
    pub fn kind(&self) -> PredicateKind {
        self.predicate.kind()
    }
}

/// A set of grouped predicate entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Result when there are no entries.
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub entries: Vec<FilterEntry>,
}

impl Filter {
    /// An empty filter that fails closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty filter that passes.
    pub fn passing() -> Self {
        Self {
            default: true,
            entries: Vec::new(),
        }
    }

    /// Add an entry.
    pub fn with_entry(mut self, entry: FilterEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Add a group-0 entry for a predicate.
    pub fn with_predicate(self, predicate: Predicate) -> Self {
        self.with_entry(FilterEntry::new(predicate))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluate against a fact source. See [`evaluate`].
    pub fn evaluate(&self, facts: &(impl FactSource + ?Sized)) -> bool {
        evaluate(self, facts)
    }
}

/// Evaluate a filter: AND within each group, OR across groups.
///
/// Pure: never mutates the fact source.
pub fn evaluate(filter: &Filter, facts: &(impl FactSource + ?Sized)) -> bool {
    if filter.entries.is_empty() {
        return filter.default;
    }

    let mut ordered: Vec<&FilterEntry> = filter.entries.iter().collect();
    ordered.sort_by_key(|entry| entry.index);

    let mut groups: BTreeMap<u32, bool> = BTreeMap::new();
    for entry in ordered {
        let group = groups.entry(entry.group).or_insert(true);
        if *group {
            *group = entry.passes(facts);
        }
    }

    groups.values().any(|passed| *passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::KeyValueStore;

    fn store() -> KeyValueStore {
        let mut store = KeyValueStore::new();
        store.set_boolean("docked", true);
        store.set_integer("credits", 50);
        store.set_string("faction", "guild");
        store
    }

    #[test]
    fn test_empty_filter_defaults() {
        let store = store();
        assert!(!Filter::new().evaluate(&store));
        assert!(Filter::passing().evaluate(&store));
    }

    #[test]
    fn test_entries_in_a_group_are_anded() {
        let store = store();
        let filter = Filter::new()
            .with_predicate(Predicate::boolean("docked", true))
            .with_predicate(Predicate::integer("credits", Comparison::GreaterOrEqual, 100));
        assert!(!filter.evaluate(&store));

        let filter = Filter::new()
            .with_predicate(Predicate::boolean("docked", true))
            .with_predicate(Predicate::integer("credits", Comparison::GreaterOrEqual, 10));
        assert!(filter.evaluate(&store));
    }

    #[test]
    fn test_groups_are_ored() {
        let store = store();
        let filter = Filter::new()
            .with_entry(FilterEntry::new(Predicate::boolean("docked", false)).in_group(0))
            .with_entry(FilterEntry::new(Predicate::string("faction", "guild")).in_group(1));
        assert!(filter.evaluate(&store));

        let filter = Filter::new()
            .with_entry(FilterEntry::new(Predicate::boolean("docked", false)).in_group(0))
            .with_entry(FilterEntry::new(Predicate::string("faction", "pirates")).in_group(1));
        assert!(!filter.evaluate(&store));
    }

    #[test]
    fn test_negation_applies_per_entry() {
        let store = store();
        let filter = Filter::new()
            .with_entry(FilterEntry::new(Predicate::boolean("docked", false)).negated())
            .with_entry(FilterEntry::new(Predicate::string("faction", "pirates")).negated());
        assert!(filter.evaluate(&store));
    }

    #[test]
    fn test_default_ignored_when_entries_exist() {
        let store = store();
        let mut filter = Filter::passing();
        filter
            .entries
            .push(FilterEntry::new(Predicate::boolean("docked", false)));
        assert!(!filter.evaluate(&store));
    }

    #[test]
    fn test_filter_json_defaults() {
        let filter: Filter = serde_json::from_str(
            r#"{"entries":[{"predicate":{"type":"Boolean","key":"Docked","value":true}}]}"#,
        )
        .unwrap();
        assert!(!filter.default);
        assert_eq!(filter.entries[0].group, 0);
        assert_eq!(filter.entries[0].kind(), PredicateKind::Boolean);
        assert!(filter.evaluate(&store()));
    }
}
