//! # Encounter Scenarios
//!
//! Whole runs driven the way a game drives them: start, drain events, answer.

use encounter_core::{
    ButtonEntry, ButtonNode, Edge, Encounter, EncounterError, EncounterEvent, EventEntry,
    EventNode, GraphIntegrityError, KeyValueNode, Node, NodeId, NodeKind, NodeOptions, NodeTag,
    Sequencer, SequencerConfig, SequencerEvent, SequencerState, SwitchEntry, SwitchNode,
    SwitchSelection, ValidationConfig, WaypointAction,
};
use encounter_rules::{
    Comparison, EncounterContext, FactOperation, Filter, Interaction, KeyValueOperation,
    KeyValueStore, Predicate,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn empty(id: &str) -> Node {
    Node::new(id, NodeKind::Empty)
}

fn entered(events: &[SequencerEvent]) -> Vec<NodeId> {
    events
        .iter()
        .filter_map(|event| match event {
            SequencerEvent::NodeEntered { node, .. } => Some(node.clone()),
            _ => None,
        })
        .collect()
}

const BEACON: &str = r#"{
    "id": "beacon",
    "name": "Distress Beacon",
    "default_end": "end",
    "nodes": [
        {"id": "start", "beginning": true, "fallback": "end",
         "kind": {"type": "KeyValue", "operations": [
             {"key": "seen", "operation": {"type": "SetBoolean", "value": true}}
         ]}},
        {"id": "end", "ending": true,
         "kind": {"type": "Event", "edges": [
             {"id": "log", "entry": {"event": {"type": "DebugLog", "message": "beacon answered"}}}
         ]}}
    ]
}"#;

#[test]
fn test_key_value_into_ending_event() {
    init_tracing();
    let encounter = Encounter::from_json(BEACON).unwrap();
    let mut sequencer = Sequencer::new(&encounter, EncounterContext::new());

    sequencer.start().unwrap();
    let events = sequencer.drain_events();
    assert_eq!(entered(&events), vec![NodeId::new("start"), NodeId::new("end")]);
    assert!(events.iter().any(|event| matches!(
        event,
        SequencerEvent::EventInvoked { event: EncounterEvent::DebugLog { .. }, signal: None, .. }
    )));
    assert!(matches!(
        events.last(),
        Some(SequencerEvent::Completed { ending }) if ending.as_str() == "end"
    ));
    assert_eq!(
        sequencer.state(),
        &SequencerState::Complete {
            ending: NodeId::new("end")
        }
    );

    let context = sequencer.into_context();
    assert!(context.encounter_facts.get_boolean("seen", false));
    assert!(context
        .interactions
        .has(&encounter.id, Interaction::Completed));
}

#[test]
fn test_weighted_switch_follows_weights() {
    let switch = SwitchNode {
        selection: SwitchSelection::RandomWeighted,
        edges: vec![
            Edge::new("x", SwitchEntry::new(Filter::passing(), "x").with_weight(1.0)).with_index(0),
            Edge::new("y", SwitchEntry::new(Filter::passing(), "y").with_weight(3.0)).with_index(1),
        ],
    };
    let encounter = Encounter::new("fork")
        .with_node(
            Node::new("fork", NodeKind::Switch(switch))
                .beginning()
                .with_fallback("x"),
        )
        .with_node(empty("x").ending())
        .with_node(empty("y").ending());

    let runs = 10_000;
    let mut hits = 0;
    for seed in 0..runs {
        let config = SequencerConfig::default().with_seed(seed);
        let mut sequencer = Sequencer::with_config(&encounter, EncounterContext::new(), config);
        sequencer.start().unwrap();
        if let SequencerState::Complete { ending } = sequencer.state() {
            if ending.as_str() == "y" {
                hits += 1;
            }
        }
    }

    let share = hits as f64 / runs as f64;
    assert!((share - 0.75).abs() < 0.02, "y chosen {share}");
}

fn airlock() -> Encounter {
    let buttons = ButtonNode {
        edges: vec![
            Edge::new("leave", ButtonEntry::new("Leave", Some("end".into()))).with_index(1),
            Edge::new(
                "search",
                ButtonEntry::new("Search the locker", Some("loot".into())).auto_disable(),
            )
            .with_index(2),
            Edge::new(
                "vault",
                ButtonEntry::new("Open the vault", Some("end".into())).enabled_when(
                    Filter::new().with_predicate(Predicate::integer(
                        "credits",
                        Comparison::GreaterOrEqual,
                        10,
                    )),
                ),
            )
            .with_index(3),
        ],
    };
    let loot = add_integer("credits", 10);
    Encounter::new("airlock")
        .with_default_end("end")
        .with_node(
            Node::new("choose", NodeKind::Button(buttons))
                .beginning()
                .with_fallback("end"),
        )
        .with_node(Node::new("loot", loot).with_fallback("choose"))
        .with_node(empty("end").ending())
}

fn add_integer(key: &str, value: i32) -> NodeKind {
    NodeKind::KeyValue(KeyValueNode {
        operations: vec![KeyValueOperation::new(key, FactOperation::AddInteger { value })],
    })
}

fn offered(events: &[SequencerEvent]) -> Vec<Vec<String>> {
    events
        .iter()
        .filter_map(|event| match event {
            SequencerEvent::NodeEntered {
                options: NodeOptions::Buttons(options),
                ..
            } => Some(options.iter().map(|option| option.edge.to_string()).collect()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_auto_disable_button_hides_after_use() {
    init_tracing();
    let encounter = airlock();
    let mut sequencer = Sequencer::new(&encounter, EncounterContext::new());
    let choose = NodeId::new("choose");

    sequencer.start().unwrap();
    assert_eq!(offered(&sequencer.drain_events()), vec![vec!["leave", "search"]]);
    assert!(sequencer.button_state(&choose, &"search".into()).unwrap().enabled);

    sequencer.activate_edge(&"search".into()).unwrap();
    let events = sequencer.drain_events();
    assert_eq!(entered(&events), vec![NodeId::new("loot"), choose.clone()]);
    // The locker is gone and the earned credits unlock the vault.
    assert_eq!(offered(&events), vec![vec!["leave", "vault"]]);

    let search = sequencer.button_state(&choose, &"search".into()).unwrap();
    assert!(!search.enabled);
    assert!(matches!(
        sequencer.activate_edge(&"search".into()),
        Err(EncounterError::EdgeUnavailable { .. })
    ));
    assert!(matches!(
        sequencer.activate_edge(&"hatch".into()),
        Err(EncounterError::UnknownEdge { .. })
    ));

    sequencer.activate_edge(&"vault".into()).unwrap();
    assert!(matches!(sequencer.state(), SequencerState::Complete { .. }));
}

#[test]
fn test_global_facts_survive_run() {
    let mut global = KeyValueStore::new();
    global.set_integer("credits", 5);
    let encounter = airlock();
    let context = EncounterContext::new().with_global_facts(global);
    let mut sequencer = Sequencer::new(&encounter, context);

    sequencer.start().unwrap();
    sequencer.activate_edge(&"leave".into()).unwrap();
    let context = sequencer.into_context();
    assert_eq!(context.global_facts.get_integer("credits", 0), 5);
    assert!(context.interactions.has(&encounter.id, Interaction::Seen));
}

#[test]
fn test_always_halting_event_waits_for_game() {
    init_tracing();
    let event = EventNode {
        always_halting: true,
        edges: vec![
            Edge::new(
                "waypoint",
                EventEntry::new(EncounterEvent::Waypoint {
                    waypoint: "derelict".into(),
                    action: WaypointAction::Set,
                }),
            ),
            Edge::new(
                "never",
                EventEntry::new(EncounterEvent::Delay { seconds: 5.0 }).when(Filter::new()),
            ),
        ],
    };
    let encounter = Encounter::new("mark")
        .with_node(
            Node::new("mark", NodeKind::Event(event))
                .beginning()
                .with_fallback("end")
                .with_duration(3.0),
        )
        .with_node(empty("end").ending());
    let mut sequencer = Sequencer::new(&encounter, EncounterContext::new());

    sequencer.start().unwrap();
    let events = sequencer.drain_events();
    let invoked: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, SequencerEvent::EventInvoked { .. }))
        .collect();
    assert_eq!(invoked.len(), 1);
    let signal = invoked[0].signal().unwrap();

    // Halting nodes ignore their duration and game time alone does not finish them.
    sequencer.tick(10.0).unwrap();
    assert!(matches!(sequencer.state(), SequencerState::Halted(_)));
    assert!(matches!(
        sequencer.advance(),
        Err(EncounterError::NotWaiting { .. })
    ));

    sequencer.complete_signal(signal).unwrap();
    assert!(matches!(sequencer.state(), SequencerState::Complete { .. }));
    // Late reports for a finished run are ignored.
    sequencer.complete_signal(signal).unwrap();
}

#[test]
fn test_abort_stops_suspended_run() {
    let encounter = Encounter::new("wait")
        .with_node(empty("a").beginning().with_fallback("b").with_duration(60.0))
        .with_node(empty("b").ending());
    let mut sequencer = Sequencer::new(&encounter, EncounterContext::new());

    assert_eq!(sequencer.abort(), Err(EncounterError::NotStarted));
    sequencer.start().unwrap();
    sequencer.drain_events();
    sequencer.abort().unwrap();

    assert_eq!(
        sequencer.state(),
        &SequencerState::Aborted {
            node: Some(NodeId::new("a"))
        }
    );
    assert_eq!(
        sequencer.drain_events(),
        vec![SequencerEvent::Aborted {
            node: Some(NodeId::new("a"))
        }]
    );
    assert_eq!(sequencer.tick(60.0), Err(EncounterError::Finished));
    assert_eq!(sequencer.abort(), Err(EncounterError::Finished));
    let interactions = &sequencer.context().interactions;
    assert!(interactions.has(&encounter.id, Interaction::Seen));
    assert!(!interactions.has(&encounter.id, Interaction::Completed));
}

fn homecoming() -> Encounter {
    let switch = SwitchNode {
        selection: SwitchSelection::FirstFilter,
        edges: vec![Edge::new(
            "returning",
            SwitchEntry::new(
                Filter::new().with_predicate(Predicate::interacted(None, Interaction::Seen)),
                "repeat",
            ),
        )],
    };
    Encounter::new("homecoming")
        .with_node(
            Node::new("greet", NodeKind::Switch(switch))
                .beginning()
                .with_fallback("first"),
        )
        .with_node(empty("first").ending())
        .with_node(empty("repeat").ending())
}

#[test]
fn test_first_visit_branch_before_history_records_run() {
    let encounter = homecoming();

    let mut first = Sequencer::new(&encounter, EncounterContext::new());
    first.start().unwrap();
    assert_eq!(
        first.state(),
        &SequencerState::Complete {
            ending: NodeId::new("first")
        }
    );

    let mut second = Sequencer::new(&encounter, first.into_context());
    second.start().unwrap();
    assert_eq!(
        second.state(),
        &SequencerState::Complete {
            ending: NodeId::new("repeat")
        }
    );
    assert_eq!(
        second
            .context()
            .interactions
            .get(&encounter.id)
            .count(Interaction::Seen),
        2
    );
}

#[test]
fn test_invalid_graph_fails_at_start() {
    let encounter = Encounter::new("broken")
        .with_node(empty("a").beginning().with_fallback("ghost"))
        .with_node(empty("b").ending());
    let mut sequencer = Sequencer::new(&encounter, EncounterContext::new());

    let error = sequencer.start().unwrap_err();
    assert_eq!(
        error,
        EncounterError::GraphIntegrity(GraphIntegrityError::UnknownReference {
            node: NodeId::new("a"),
            edge: None,
            target: NodeId::new("ghost"),
        })
    );
    assert_eq!(sequencer.state(), &SequencerState::Failed(error.clone()));
    assert_eq!(
        sequencer.drain_events(),
        vec![SequencerEvent::Failed { error }]
    );
    assert!(sequencer.history().is_empty());
}

#[test]
fn test_closed_cycle_allowed_when_configured() {
    // b and c bounce forever; only the step limit ends the run.
    let encounter = Encounter::new("loop")
        .with_node(empty("a").beginning().with_fallback("b"))
        .with_node(empty("b").with_fallback("c"))
        .with_node(empty("c").with_fallback("b"))
        .with_node(empty("end").ending());

    let mut strict = Sequencer::new(&encounter, EncounterContext::new());
    assert!(matches!(
        strict.start(),
        Err(EncounterError::GraphIntegrity(GraphIntegrityError::UnreachableEnding { .. }))
    ));
    assert!(encounter
        .integrity_report(&ValidationConfig::default())
        .iter()
        .any(|error| matches!(
            error,
            GraphIntegrityError::ClosedCycle { nodes } if nodes.len() == 2
        )));

    let config = SequencerConfig {
        step_limit: 50,
        rng_seed: Some(0),
        validation: ValidationConfig::structural(),
    };
    let mut lenient = Sequencer::with_config(&encounter, EncounterContext::new(), config);
    assert!(matches!(
        lenient.start(),
        Err(EncounterError::StepLimitExceeded { limit: 50, .. })
    ));
    assert_eq!(lenient.history().len(), 50);
}

#[test]
fn test_node_entered_reports_kind_and_name() {
    let encounter = Encounter::from_json(BEACON).unwrap();
    let mut sequencer = Sequencer::new(&encounter, EncounterContext::new());
    sequencer.start().unwrap();

    let tags: Vec<NodeTag> = sequencer
        .drain_events()
        .iter()
        .filter_map(|event| match event {
            SequencerEvent::NodeEntered { tag, .. } => Some(*tag),
            _ => None,
        })
        .collect();
    assert_eq!(tags, vec![NodeTag::KeyValue, NodeTag::Event]);
}
