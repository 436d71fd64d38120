//! Fact store - the typed key/value memory that encounters read and write.
//!
//! Facts are partitioned by kind. A key lives in at most one partition at a
//! time: writing a key under one kind evicts it from every other kind.

mod operation;

pub use operation::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::RulesError;

/// Absolute tolerance used when comparing float facts.
pub const FLOAT_EPSILON: f32 = 1e-5;

/// A normalized (trimmed, case-folded) fact key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FactKey(String);

impl FactKey {
    /// Normalize a raw key.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    /// Normalize a raw key, rejecting keys that are blank after trimming.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, RulesError> {
        let key = Self::new(raw);
        if key.0.is_empty() {
            return Err(RulesError::BlankKey);
        }
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FactKey {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for FactKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<FactKey> for String {
    fn from(key: FactKey) -> Self {
        key.0
    }
}

impl AsRef<str> for FactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind partitions of a store, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FactKind {
    Boolean,
    Integer,
    Float,
    String,
    /// Enum values stored by their integer discriminant.
    Enumeration,
}

impl FactKind {
    /// Every kind, in declaration order.
    pub const ALL: [FactKind; 5] = [
        FactKind::Boolean,
        FactKind::Integer,
        FactKind::Float,
        FactKind::String,
        FactKind::Enumeration,
    ];

    /// The value an unset key of this kind reads as.
    pub fn zero(self) -> FactValue {
        match self {
            FactKind::Boolean => FactValue::Boolean(false),
            FactKind::Integer => FactValue::Integer(0),
            FactKind::Float => FactValue::Float(0.0),
            FactKind::String => FactValue::String(String::new()),
            FactKind::Enumeration => FactValue::Enumeration(0),
        }
    }
}

/// A single typed fact value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FactValue {
    Boolean(bool),
    Integer(i32),
    Float(f32),
    String(String),
    Enumeration(i32),
}

impl FactValue {
    /// Get the kind partition this value belongs to.
    pub fn kind(&self) -> FactKind {
        match self {
            FactValue::Boolean(_) => FactKind::Boolean,
            FactValue::Integer(_) => FactKind::Integer,
            FactValue::Float(_) => FactKind::Float,
            FactValue::String(_) => FactKind::String,
            FactValue::Enumeration(_) => FactKind::Enumeration,
        }
    }

    /// Kind-aware equality: exact for discrete kinds, epsilon for floats.
    pub fn same_as(&self, other: &FactValue) -> bool {
        match (self, other) {
            (FactValue::Float(a), FactValue::Float(b)) => floats_match(*a, *b),
            _ => self == other,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FactValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            FactValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            FactValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            FactValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_enumeration(&self) -> Option<i32> {
        match self {
            FactValue::Enumeration(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactValue::Boolean(v) => write!(f, "{}", v),
            FactValue::Integer(v) => write!(f, "{}", v),
            FactValue::Float(v) => write!(f, "{}", v),
            FactValue::String(v) => write!(f, "\"{}\"", v),
            FactValue::Enumeration(v) => write!(f, "enum({})", v),
        }
    }
}

pub(crate) fn floats_match(a: f32, b: f32) -> bool {
    (a - b).abs() <= FLOAT_EPSILON
}

/// One changed entry between two stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactDelta {
    pub key: FactKey,
    pub kind: FactKind,
    /// Value in the store `diff` was called on; `None` when unset there.
    pub old: Option<FactValue>,
    /// Value in the store passed to `diff`; `None` when unset there.
    pub new: Option<FactValue>,
}

/// Typed mapping of normalized keys to fact values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValueStore {
    #[serde(default)]
    booleans: BTreeMap<FactKey, bool>,
    #[serde(default)]
    integers: BTreeMap<FactKey, i32>,
    #[serde(default)]
    floats: BTreeMap<FactKey, f32>,
    #[serde(default)]
    strings: BTreeMap<FactKey, String>,
    #[serde(default)]
    enumerations: BTreeMap<FactKey, i32>,
}

impl KeyValueStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a key in one kind partition.
    pub fn get(&self, key: impl AsRef<str>, kind: FactKind) -> Option<FactValue> {
        let key = FactKey::new(key);
        match kind {
            FactKind::Boolean => self.booleans.get(&key).map(|v| FactValue::Boolean(*v)),
            FactKind::Integer => self.integers.get(&key).map(|v| FactValue::Integer(*v)),
            FactKind::Float => self.floats.get(&key).map(|v| FactValue::Float(*v)),
            FactKind::String => self.strings.get(&key).map(|v| FactValue::String(v.clone())),
            FactKind::Enumeration => self
                .enumerations
                .get(&key)
                .map(|v| FactValue::Enumeration(*v)),
        }
    }

    /// Get a value, reading `fallback` when the key is unset in the fallback's kind.
    pub fn get_or(&self, key: impl AsRef<str>, fallback: FactValue) -> FactValue {
        self.get(key, fallback.kind()).unwrap_or(fallback)
    }

    pub fn get_boolean(&self, key: impl AsRef<str>, fallback: bool) -> bool {
        self.booleans
            .get(&FactKey::new(key))
            .copied()
            .unwrap_or(fallback)
    }

    pub fn get_integer(&self, key: impl AsRef<str>, fallback: i32) -> i32 {
        self.integers
            .get(&FactKey::new(key))
            .copied()
            .unwrap_or(fallback)
    }

    pub fn get_float(&self, key: impl AsRef<str>, fallback: f32) -> f32 {
        self.floats
            .get(&FactKey::new(key))
            .copied()
            .unwrap_or(fallback)
    }

    pub fn get_string(&self, key: impl AsRef<str>, fallback: &str) -> String {
        self.strings
            .get(&FactKey::new(key))
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn get_enumeration(&self, key: impl AsRef<str>, fallback: i32) -> i32 {
        self.enumerations
            .get(&FactKey::new(key))
            .copied()
            .unwrap_or(fallback)
    }

    /// Write a value, evicting the key from every other kind partition.
    ///
    /// Returns the value written.
    pub fn set(&mut self, key: impl AsRef<str>, value: FactValue) -> FactValue {
        let key = FactKey::new(key);
        self.evict_except(&key, Some(value.kind()));
        match &value {
            FactValue::Boolean(v) => {
                self.booleans.insert(key, *v);
            }
            FactValue::Integer(v) => {
                self.integers.insert(key, *v);
            }
            FactValue::Float(v) => {
                self.floats.insert(key, *v);
            }
            FactValue::String(v) => {
                self.strings.insert(key, v.clone());
            }
            FactValue::Enumeration(v) => {
                self.enumerations.insert(key, *v);
            }
        }
        value
    }

    pub fn set_boolean(&mut self, key: impl AsRef<str>, value: bool) -> bool {
        self.set(key, FactValue::Boolean(value));
        value
    }

    pub fn set_integer(&mut self, key: impl AsRef<str>, value: i32) -> i32 {
        self.set(key, FactValue::Integer(value));
        value
    }

    pub fn set_float(&mut self, key: impl AsRef<str>, value: f32) -> f32 {
        self.set(key, FactValue::Float(value));
        value
    }

    pub fn set_string(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> String {
        let value = value.into();
        self.set(key, FactValue::String(value.clone()));
        value
    }

    pub fn set_enumeration(&mut self, key: impl AsRef<str>, value: i32) -> i32 {
        self.set(key, FactValue::Enumeration(value));
        value
    }

    /// Remove a key from whichever partition holds it.
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<FactValue> {
        let key = FactKey::new(key);
        let kind = self.kind_of(&key)?;
        let removed = self.get(&key, kind);
        self.evict_except(&key, None);
        removed
    }

    /// The kind partition currently holding a key.
    pub fn kind_of(&self, key: impl AsRef<str>) -> Option<FactKind> {
        let key = FactKey::new(key);
        FactKind::ALL
            .into_iter()
            .find(|kind| self.partition_contains(*kind, &key))
    }

    /// Check if a key is set in any partition.
    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.kind_of(key).is_some()
    }

    /// Keys of one partition, in key order.
    pub fn keys(&self, kind: FactKind) -> Vec<&FactKey> {
        match kind {
            FactKind::Boolean => self.booleans.keys().collect(),
            FactKind::Integer => self.integers.keys().collect(),
            FactKind::Float => self.floats.keys().collect(),
            FactKind::String => self.strings.keys().collect(),
            FactKind::Enumeration => self.enumerations.keys().collect(),
        }
    }

    /// Total number of facts across all partitions.
    pub fn len(&self) -> usize {
        self.booleans.len()
            + self.integers.len()
            + self.floats.len()
            + self.strings.len()
            + self.enumerations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Independent deep copy, used to snapshot state before a node runs.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Remove every fact.
    pub fn clear(&mut self) {
        self.booleans.clear();
        self.integers.clear();
        self.floats.clear();
        self.strings.clear();
        self.enumerations.clear();
    }

    /// Compute the changes that turn `self` into `other`.
    ///
    /// Records are grouped by kind in declaration order and sorted by key
    /// within a kind. A key set on one side only is reported with `None` on
    /// the other side.
    pub fn diff(&self, other: &KeyValueStore) -> Vec<FactDelta> {
        let mut deltas = Vec::new();
        diff_partition(
            FactKind::Boolean,
            &self.booleans,
            &other.booleans,
            |v| FactValue::Boolean(*v),
            &mut deltas,
        );
        diff_partition(
            FactKind::Integer,
            &self.integers,
            &other.integers,
            |v| FactValue::Integer(*v),
            &mut deltas,
        );
        diff_partition(
            FactKind::Float,
            &self.floats,
            &other.floats,
            |v| FactValue::Float(*v),
            &mut deltas,
        );
        diff_partition(
            FactKind::String,
            &self.strings,
            &other.strings,
            |v| FactValue::String(v.clone()),
            &mut deltas,
        );
        diff_partition(
            FactKind::Enumeration,
            &self.enumerations,
            &other.enumerations,
            |v| FactValue::Enumeration(*v),
            &mut deltas,
        );
        deltas
    }

    /// Iterate over every fact, grouped by kind.
    pub fn iter(&self) -> impl Iterator<Item = (&FactKey, FactValue)> + '_ {
        self.booleans
            .iter()
            .map(|(k, v)| (k, FactValue::Boolean(*v)))
            .chain(self.integers.iter().map(|(k, v)| (k, FactValue::Integer(*v))))
            .chain(self.floats.iter().map(|(k, v)| (k, FactValue::Float(*v))))
            .chain(
                self.strings
                    .iter()
                    .map(|(k, v)| (k, FactValue::String(v.clone()))),
            )
            .chain(
                self.enumerations
                    .iter()
                    .map(|(k, v)| (k, FactValue::Enumeration(*v))),
            )
    }

    fn partition_contains(&self, kind: FactKind, key: &FactKey) -> bool {
        match kind {
            FactKind::Boolean => self.booleans.contains_key(key),
            FactKind::Integer => self.integers.contains_key(key),
            FactKind::Float => self.floats.contains_key(key),
            FactKind::String => self.strings.contains_key(key),
            FactKind::Enumeration => self.enumerations.contains_key(key),
        }
    }

    /// Remove `key` from every partition other than `keep` (all of them for `None`).
    fn evict_except(&mut self, key: &FactKey, keep: Option<FactKind>) {
        for kind in FactKind::ALL {
            if Some(kind) == keep {
                continue;
            }
            match kind {
                FactKind::Boolean => {
                    self.booleans.remove(key);
                }
                FactKind::Integer => {
                    self.integers.remove(key);
                }
                FactKind::Float => {
                    self.floats.remove(key);
                }
                FactKind::String => {
                    self.strings.remove(key);
                }
                FactKind::Enumeration => {
                    self.enumerations.remove(key);
                }
            }
        }
    }
}

fn diff_partition<V>(
    kind: FactKind,
    ours: &BTreeMap<FactKey, V>,
    theirs: &BTreeMap<FactKey, V>,
    wrap: impl Fn(&V) -> FactValue,
    deltas: &mut Vec<FactDelta>,
) {
    let keys: BTreeSet<&FactKey> = ours.keys().chain(theirs.keys()).collect();
    for key in keys {
        let old = ours.get(key).map(&wrap);
        let new = theirs.get(key).map(&wrap);
        let unchanged = match (&old, &new) {
            (Some(a), Some(b)) => a.same_as(b),
            (None, None) => true,
            _ => false,
        };
        if !unchanged {
            deltas.push(FactDelta {
                key: key.clone(),
                kind,
                old,
                new,
            });
        }
    }
}
