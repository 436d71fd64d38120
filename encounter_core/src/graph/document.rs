//! Persistence boundary: encounters as JSON documents.
//!
//! Every variant tag in a document is checked against the known set before
//! typed deserialization, so an unknown tag is reported with the id of the
//! node or edge that carries it instead of as a generic parse failure.

use serde_json::Value;
use std::path::Path;

use super::encounter::Encounter;
use super::node::NodeTag;
use crate::error::{EncounterError, Result};

const EVENT_TYPES: [&str; 6] = [
    "DebugLog",
    "Dialog",
    "Waypoint",
    "TraitMutation",
    "Delay",
    "Custom",
];

const BUST_TYPES: [&str; 2] = ["Initialize", "Focus"];

const OPERATION_TYPES: [&str; 12] = [
    "SetBoolean",
    "ToggleBoolean",
    "SetInteger",
    "AddInteger",
    "MultiplyInteger",
    "SetFloat",
    "AddFloat",
    "MultiplyFloat",
    "SetString",
    "AppendString",
    "SetEnumeration",
    "Copy",
];

const PREDICATE_TYPES: [&str; 6] = [
    "Boolean",
    "Integer",
    "Float",
    "String",
    "Enumeration",
    "EncounterInteracted",
];

const SWITCH_SELECTIONS: [&str; 3] = ["FirstFilter", "Random", "RandomWeighted"];
const CONVERSATION_STYLES: [&str; 2] = ["Message", "Prompt"];
const LOG_SEVERITIES: [&str; 5] = ["Trace", "Debug", "Info", "Warning", "Error"];
const WAYPOINT_ACTIONS: [&str; 2] = ["Set", "Clear"];
const TRAIT_OPERATIONS: [&str; 2] = ["Add", "Remove"];
const FACT_TARGETS: [&str; 2] = ["Encounter", "Global"];
const FACT_KINDS: [&str; 5] = ["Boolean", "Integer", "Float", "String", "Enumeration"];
const COMPARISONS: [&str; 6] = [
    "Equal",
    "NotEqual",
    "Less",
    "LessOrEqual",
    "Greater",
    "GreaterOrEqual",
];
const INTERACTIONS: [&str; 2] = ["Seen", "Completed"];

/// Filter-valued fields an edge entry may carry.
const FILTER_FIELDS: [&str; 4] = ["filter", "enabled", "interactable", "used"];

impl Encounter {
    /// Parse an encounter document.
    pub fn from_json(text: &str) -> Result<Self> {
        let document: Value =
            serde_json::from_str(text).map_err(|e| EncounterError::Document(e.to_string()))?;
        check_tags(&document)?;
        serde_json::from_value(document).map_err(|e| EncounterError::Document(e.to_string()))
    }

    /// Render the encounter as a pretty-printed document.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EncounterError::Document(e.to_string()))
    }

    /// Read an encounter document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EncounterError::Document(format!("{}: {e}", path.display())))?;
        let encounter = Self::from_json(&text)?;
        tracing::debug!(
            encounter = %encounter.id,
            nodes = encounter.nodes.len(),
            path = %path.display(),
            "loaded encounter document"
        );
        Ok(encounter)
    }

    /// Write the encounter document to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .map_err(|e| EncounterError::Document(format!("{}: {e}", path.display())))
    }
}

fn items<'v>(value: &'v Value, field: &str) -> &'v [Value] {
    value
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn text<'v>(value: &'v Value, field: &str) -> Option<&'v str> {
    value.get(field).and_then(Value::as_str)
}

/// Fail when a present string tag is outside the known set.
///
/// Missing or non-string tags are left to typed deserialization.
fn expect_tag(family: &'static str, tag: Option<&str>, known: &[&str], owner: &str) -> Result<()> {
    match tag {
        Some(tag) if !known.contains(&tag) => Err(EncounterError::UnrecognizedVariant {
            family,
            tag: tag.to_string(),
            id: owner.to_string(),
        }),
        _ => Ok(()),
    }
}

fn check_filter(filter: &Value, owner: &str) -> Result<()> {
    for entry in items(filter, "entries") {
        let Some(predicate) = entry.get("predicate") else {
            continue;
        };
        expect_tag("predicate", text(predicate, "type"), &PREDICATE_TYPES, owner)?;
        expect_tag("fact target", text(predicate, "target"), &FACT_TARGETS, owner)?;
        expect_tag("comparison", text(predicate, "comparison"), &COMPARISONS, owner)?;
        expect_tag("interaction", text(predicate, "interaction"), &INTERACTIONS, owner)?;
    }
    Ok(())
}

fn check_operation(operation: &Value, owner: &str) -> Result<()> {
    expect_tag("fact target", text(operation, "target"), &FACT_TARGETS, owner)?;
    let Some(mutation) = operation.get("operation") else {
        return Ok(());
    };
    expect_tag("fact operation", text(mutation, "type"), &OPERATION_TYPES, owner)?;
    expect_tag("fact target", text(mutation, "source_target"), &FACT_TARGETS, owner)?;
    expect_tag("fact kind", text(mutation, "kind"), &FACT_KINDS, owner)
}

fn check_event(event: &Value, owner: &str) -> Result<()> {
    let tag = text(event, "type");
    expect_tag("event invocation", tag, &EVENT_TYPES, owner)?;
    match tag {
        Some("DebugLog") => {
            expect_tag("log severity", text(event, "severity"), &LOG_SEVERITIES, owner)
        }
        Some("Waypoint") => {
            expect_tag("waypoint action", text(event, "action"), &WAYPOINT_ACTIONS, owner)
        }
        Some("TraitMutation") => {
            expect_tag("trait operation", text(event, "operation"), &TRAIT_OPERATIONS, owner)
        }
        _ => Ok(()),
    }
}

fn check_tags(document: &Value) -> Result<()> {
    let node_kinds = NodeTag::ALL.map(NodeTag::name);

    for node in items(document, "nodes") {
        let node_id = text(node, "id").unwrap_or("<unnamed node>");
        let Some(kind) = node.get("kind") else {
            continue;
        };
        expect_tag("node kind", text(kind, "type"), &node_kinds, node_id)?;
        let selection = text(kind, "selection");
        expect_tag("switch selection", selection, &SWITCH_SELECTIONS, node_id)?;

        for operation in items(kind, "operations") {
            check_operation(operation, node_id)?;
        }

        for edge in items(kind, "edges") {
            let owner = format!("{node_id}/{}", text(edge, "id").unwrap_or("<unnamed edge>"));
            let Some(entry) = edge.get("entry") else {
                continue;
            };

            match text(kind, "type") {
                Some("Event") => {
                    if let Some(event) = entry.get("event") {
                        check_event(event, &owner)?;
                    }
                }
                Some("Bust") => {
                    expect_tag("bust entry", text(entry, "type"), &BUST_TYPES, &owner)?;
                }
                Some("Conversation") => {
                    let style = text(entry, "style");
                    expect_tag("conversation style", style, &CONVERSATION_STYLES, &owner)?;
                }
                _ => {}
            }

            for field in FILTER_FIELDS {
                if let Some(filter) = entry.get(field) {
                    check_filter(filter, &owner)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::{
        DialogEntry, DialogOption, DialogOutcome, Edge, EncounterEvent, EventEntry,
    };
    use crate::graph::node::{DialogNode, EventNode, KeyValueNode, Node, NodeKind};
    use encounter_rules::{FactOperation, KeyValueOperation};

    const MINIMAL: &str = r#"{
        "id": "beacon",
        "default_end": "end",
        "nodes": [
            {"id": "start", "beginning": true, "fallback": "end",
             "kind": {"type": "KeyValue", "operations": [
                 {"key": "Seen", "operation": {"type": "SetBoolean", "value": true}}
             ]}},
            {"id": "end", "ending": true,
             "kind": {"type": "Event", "edges": [
                 {"id": "log", "entry": {"event": {"type": "DebugLog", "message": "done"}}}
             ]}}
        ]
    }"#;

    #[test]
    fn test_parse_minimal_document() {
        let encounter = Encounter::from_json(MINIMAL).unwrap();
        assert_eq!(encounter.id.as_str(), "beacon");
        assert_eq!(encounter.nodes.len(), 2);
        assert_eq!(encounter.nodes[0].tag(), NodeTag::KeyValue);
        assert_eq!(encounter.selection.chance, 1.0);
    }

    #[test]
    fn test_unknown_node_kind_names_node() {
        let text = MINIMAL.replace(r#""type": "KeyValue""#, r#""type": "Teleporter""#);
        let error = Encounter::from_json(&text).unwrap_err();
        assert_eq!(
            error,
            EncounterError::UnrecognizedVariant {
                family: "node kind",
                tag: "Teleporter".into(),
                id: "start".into(),
            }
        );
        assert!(error.is_fatal());
    }

    #[test]
    fn test_unknown_nested_tags_name_edge() {
        let text = MINIMAL.replace(r#""type": "DebugLog""#, r#""type": "Explode""#);
        assert!(matches!(
            Encounter::from_json(&text),
            Err(EncounterError::UnrecognizedVariant {
                family: "event invocation",
                ref id,
                ..
            }) if id == "end/log"
        ));

        let text = MINIMAL.replace(r#""type": "SetBoolean""#, r#""type": "Randomize""#);
        assert!(matches!(
            Encounter::from_json(&text),
            Err(EncounterError::UnrecognizedVariant { family: "fact operation", .. })
        ));
    }

    #[test]
    fn test_unknown_plain_enum_values_name_owner() {
        let unrecognized = |text: &str| match Encounter::from_json(text) {
            Err(EncounterError::UnrecognizedVariant { family, tag, id }) => (family, tag, id),
            other => panic!("expected an unrecognized variant, got {other:?}"),
        };

        let text = MINIMAL.replace(
            r#""message": "done""#,
            r#""message": "done", "severity": "Loud""#,
        );
        assert_eq!(
            unrecognized(&text),
            ("log severity", "Loud".to_string(), "end/log".to_string())
        );

        let text = MINIMAL.replace(
            r#"{"key": "Seen","#,
            r#"{"key": "Seen", "target": "Galaxy","#,
        );
        assert_eq!(unrecognized(&text).0, "fact target");

        let switch = r#"{
            "id": "fork",
            "nodes": [
                {"id": "start", "beginning": true, "fallback": "end",
                 "kind": {"type": "Switch", "selection": "Weighted", "edges": []}},
                {"id": "end", "ending": true, "kind": {"type": "Empty"}}
            ]
        }"#;
        assert_eq!(
            unrecognized(switch),
            ("switch selection", "Weighted".to_string(), "start".to_string())
        );

        let gated = switch.replace(
            r#""selection": "Weighted", "edges": []"#,
            r#""edges": [{"id": "rich", "entry": {"target": "end", "filter": {"entries": [
                {"predicate": {"type": "Integer", "key": "credits",
                               "comparison": "AtLeast", "value": 3}}
            ]}}}]"#,
        );
        assert_eq!(
            unrecognized(&gated),
            ("comparison", "AtLeast".to_string(), "start/rich".to_string())
        );

        let copy = MINIMAL.replace(
            r#"{"type": "SetBoolean", "value": true}"#,
            r#"{"type": "Copy", "source": "other", "kind": "Decimal"}"#,
        );
        assert_eq!(unrecognized(&copy).0, "fact kind");

        let chat = switch.replace(
            r#""kind": {"type": "Empty"}"#,
            r#""kind": {"type": "Conversation", "edges": [
                {"id": "line", "entry": {"message": "Hello", "style": "Whisper"}}
            ]}"#,
        );
        let chat = chat.replace(r#""selection": "Weighted", "#, "");
        assert_eq!(
            unrecognized(&chat),
            ("conversation style", "Whisper".to_string(), "end/line".to_string())
        );
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            Encounter::from_json("{\"id\": 4"),
            Err(EncounterError::Document(_))
        ));
        assert!(matches!(
            Encounter::from_json(r#"{"nodes": []}"#),
            Err(EncounterError::Document(_))
        ));
    }

    #[test]
    fn test_document_round_trip_preserves_graph() {
        let dialog = DialogEntry::new("Dock here?")
            .with_outcome(DialogOutcome::Confirm, DialogOption::new("Dock", Some("end".into())))
            .with_outcome(DialogOutcome::Deny, DialogOption::new("Leave", None));
        let encounter = Encounter::new("station")
            .with_default_end("end")
            .with_node(
                Node::new(
                    "start",
                    NodeKind::KeyValue(KeyValueNode {
                        operations: vec![KeyValueOperation::new(
                            "visits",
                            FactOperation::AddInteger { value: 1 },
                        )],
                    }),
                )
                .beginning()
                .with_fallback("ask"),
            )
            .with_node(Node::new(
                "ask",
                NodeKind::Dialog(DialogNode {
                    edges: vec![Edge::new("d", dialog)],
                }),
            ))
            .with_node(
                Node::new(
                    "end",
                    NodeKind::Event(EventNode {
                        always_halting: false,
                        edges: vec![Edge::new(
                            "custom",
                            EventEntry::new(EncounterEvent::Custom {
                                name: "fanfare".into(),
                                payload: serde_json::json!({"volume": 3}),
                            }),
                        )],
                    }),
                )
                .ending(),
            );

        let text = encounter.to_json().unwrap();
        assert_eq!(Encounter::from_json(&text).unwrap(), encounter);
    }
}
