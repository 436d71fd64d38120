//! Fact mutations performed by key/value nodes.

use serde::{Deserialize, Serialize};

use super::{FactKey, FactKind, FactValue, KeyValueStore};
use crate::context::FactSource;

/// Which store a fact lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FactTarget {
    /// Scoped to the running encounter.
    #[default]
    Encounter,
    /// Shared with the rest of the game session.
    Global,
}

/// The mutation applied to a single fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FactOperation {
    SetBoolean { value: bool },
    ToggleBoolean,
    SetInteger { value: i32 },
    /// Saturating addition.
    AddInteger { value: i32 },
    /// Saturating multiplication.
    MultiplyInteger { value: i32 },
    SetFloat { value: f32 },
    AddFloat { value: f32 },
    MultiplyFloat { value: f32 },
    SetString { value: String },
    AppendString { value: String },
    SetEnumeration { value: i32 },
    /// Copy another fact of the given kind (its zero value when unset).
    Copy {
        #[serde(default)]
        source_target: FactTarget,
        source: FactKey,
        kind: FactKind,
    },
}

impl FactOperation {
    /// The kind of the fact this operation writes.
    pub fn kind(&self) -> FactKind {
        match self {
            FactOperation::SetBoolean { .. } | FactOperation::ToggleBoolean => FactKind::Boolean,
            FactOperation::SetInteger { .. }
            | FactOperation::AddInteger { .. }
            | FactOperation::MultiplyInteger { .. } => FactKind::Integer,
            FactOperation::SetFloat { .. }
            | FactOperation::AddFloat { .. }
            | FactOperation::MultiplyFloat { .. } => FactKind::Float,
            FactOperation::SetString { .. } | FactOperation::AppendString { .. } => {
                FactKind::String
            }
            FactOperation::SetEnumeration { .. } => FactKind::Enumeration,
            FactOperation::Copy { kind, .. } => *kind,
        }
    }
}

/// One entry of a key/value node's operation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueOperation {
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub target: FactTarget,
    pub key: FactKey,
    pub operation: FactOperation,
}

impl KeyValueOperation {
    /// Create an operation on an encounter-scoped fact.
    pub fn new(key: impl Into<FactKey>, operation: FactOperation) -> Self {
        Self {
            index: 0,
            target: FactTarget::Encounter,
            key: key.into(),
            operation,
        }
    }

    /// Set the ordering index.
    pub fn with_index(mut self, index: i32) -> Self {
        self.index = index;
        self
    }

    /// Set the store this operation writes to.
    pub fn with_target(mut self, target: FactTarget) -> Self {
        self.target = target;
        self
    }

    /// Compute the value this operation would write, without writing it.
    pub fn compute(&self, facts: &(impl FactSource + ?Sized)) -> FactValue {
        let store = facts.store(self.target);
        let key = &self.key;
        match &self.operation {
            FactOperation::SetBoolean { value } => FactValue::Boolean(*value),
            FactOperation::ToggleBoolean => FactValue::Boolean(!store.get_boolean(key, false)),
            FactOperation::SetInteger { value } => FactValue::Integer(*value),
            FactOperation::AddInteger { value } => {
                FactValue::Integer(store.get_integer(key, 0).saturating_add(*value))
            }
            FactOperation::MultiplyInteger { value } => {
                FactValue::Integer(store.get_integer(key, 0).saturating_mul(*value))
            }
            FactOperation::SetFloat { value } => FactValue::Float(*value),
            FactOperation::AddFloat { value } => {
                FactValue::Float(store.get_float(key, 0.0) + value)
            }
            FactOperation::MultiplyFloat { value } => {
                FactValue::Float(store.get_float(key, 0.0) * value)
            }
            FactOperation::SetString { value } => FactValue::String(value.clone()),
            FactOperation::AppendString { value } => {
                let mut current = store.get_string(key, "");
                current.push_str(value);
                FactValue::String(current)
            }
            FactOperation::SetEnumeration { value } => FactValue::Enumeration(*value),
            FactOperation::Copy {
                source_target,
                source,
                kind,
            } => facts
                .store(*source_target)
                .get_or(source, kind.zero()),
        }
    }

    /// Apply this operation to a single store, ignoring scopes.
    pub fn apply(&self, store: &mut KeyValueStore) -> FactValue {
        let value = self.compute(&*store);
        tracing::trace!(key = %self.key, value = %value, "applying fact operation");
        store.set(&self.key, value)
    }
}

/// Sort operations by index, keeping list order for equal indices.
pub fn ordered_operations(operations: &[KeyValueOperation]) -> Vec<&KeyValueOperation> {
    let mut ordered: Vec<_> = operations.iter().collect();
    ordered.sort_by_key(|op| op.index);
    ordered
}
