//! # Sequencer
//!
//! Plays one encounter: walks the graph node by node, applying side effects,
//! and suspends whenever it needs the game (elapsed time, a button click, a
//! dialog outcome, completion of halting work).
//!
//! The sequencer never calls out. It queues [`SequencerEvent`]s which the game
//! drains, and it resumes only through its input methods. A suspension is a
//! plain value ([`Suspension`]) naming the node and what it waits for.
//!
//! ## Lifecycle
//!
//! `Idle -> Running -> Halted -> Running -> ... -> Complete`, with `Aborted`
//! reachable from `Running` or `Halted` and `Failed` on any fatal error.

mod state;

pub use state::*;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, error, info, trace, warn};

use encounter_rules::{EncounterContext, Interaction};

use crate::config::SequencerConfig;
use crate::error::{EncounterError, GraphIntegrityError, Result};
use crate::events::{NodeOptions, SequencerEvent};
use crate::graph::{
    DialogOutcome, EdgeId, Encounter, EncounterEvent, EncounterGraph, LogSeverity, Node, NodeId,
    NodeKind,
};
use crate::resolution::{
    self, activate_button, button_state, ButtonMarks, ButtonState, Effect, Next, Resolver, Step,
};

/// Where the walk goes after a node.
enum Flow {
    Enter(NodeId),
    Stop,
}

/// Signals issued while publishing one node's effects.
#[derive(Default)]
struct Pending {
    outstanding: BTreeSet<SignalId>,
    delays: BTreeMap<SignalId, f32>,
}

/// Runs one encounter against an exclusively owned context.
pub struct Sequencer<'a> {
    encounter: &'a Encounter,
    graph: Option<EncounterGraph<'a>>,
    context: EncounterContext,
    config: SequencerConfig,
    rng: Box<dyn RngCore>,
    state: SequencerState,
    marks: ButtonMarks,
    events: VecDeque<SequencerEvent>,
    history: Vec<NodeId>,
    next_signal: u64,
}

impl<'a> Sequencer<'a> {
    pub fn new(encounter: &'a Encounter, context: EncounterContext) -> Self {
        Self::with_config(encounter, context, SequencerConfig::default())
    }

    pub fn with_config(
        encounter: &'a Encounter,
        context: EncounterContext,
        config: SequencerConfig,
    ) -> Self {
        let rng: Box<dyn RngCore> = match config.rng_seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };
        Self {
            encounter,
            graph: None,
            context,
            config,
            rng,
            state: SequencerState::Idle,
            marks: ButtonMarks::new(),
            events: VecDeque::new(),
            history: Vec::new(),
            next_signal: 0,
        }
    }

    /// Replace the random number generator used by random switches.
    pub fn with_rng(mut self, rng: impl RngCore + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn encounter(&self) -> &'a Encounter {
        self.encounter
    }

    pub fn context(&self) -> &EncounterContext {
        &self.context
    }

    /// Hand the context back to the owning game flow.
    pub fn into_context(self) -> EncounterContext {
        self.context
    }

    /// Nodes entered so far, in order.
    pub fn history(&self) -> &[NodeId] {
        &self.history
    }

    /// Take every queued event.
    pub fn drain_events(&mut self) -> Vec<SequencerEvent> {
        self.events.drain(..).collect()
    }

    /// Signals the current suspension still waits on.
    pub fn outstanding_signals(&self) -> Vec<SignalId> {
        match self.state.suspension().map(|suspension| &suspension.wait) {
            Some(Wait::Signals { outstanding, .. }) => outstanding.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Current look of a button edge, including this run's marks.
    pub fn button_state(&self, node: &NodeId, edge: &EdgeId) -> Option<ButtonState> {
        let node = self.encounter.node(node)?;
        let NodeKind::Button(buttons) = &node.kind else {
            return None;
        };
        let edge = buttons.edges.iter().find(|candidate| &candidate.id == edge)?;
        Some(button_state(&node.id, edge, &self.marks, &self.context))
    }

    /// Validate the encounter and walk from its beginning.
    pub fn start(&mut self) -> Result<()> {
        match &self.state {
            SequencerState::Idle => {}
            SequencerState::Failed(error) => return Err(error.clone()),
            _ => return Err(self.reject(EncounterError::AlreadyStarted)),
        }

        let graph = match EncounterGraph::new(self.encounter, &self.config.validation) {
            Ok(graph) => graph,
            Err(integrity) => return Err(self.fail(integrity.into())),
        };
        let beginning = graph.beginning().id.clone();
        info!(
            encounter = %self.encounter.id,
            nodes = graph.len(),
            beginning = %beginning,
            "encounter started"
        );

        self.graph = Some(graph);
        self.context.encounter = Some(self.encounter.id.clone());
        self.drive(|_| Ok(Flow::Enter(beginning)))
    }

    /// Advance game time. Expires node timers and halting delays.
    pub fn tick(&mut self, dt: f32) -> Result<()> {
        self.check_live()?;
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        let SequencerState::Halted(suspension) = &mut self.state else {
            return Ok(());
        };
        match &mut suspension.wait {
            Wait::Timer { remaining, .. } => {
                *remaining -= dt;
                if *remaining > 0.0 {
                    return Ok(());
                }
            }
            Wait::Signals {
                outstanding,
                delays,
                ..
            } => {
                let mut expired = Vec::new();
                for (signal, left) in delays.iter_mut() {
                    *left -= dt;
                    if *left <= 0.0 {
                        expired.push(*signal);
                    }
                }
                for signal in expired {
                    delays.remove(&signal);
                    outstanding.remove(&signal);
                }
                if !outstanding.is_empty() {
                    return Ok(());
                }
            }
            Wait::Choice { .. } | Wait::Outcome { .. } => return Ok(()),
        }
        self.resume()
    }

    /// Skip the current node's remaining duration.
    pub fn advance(&mut self) -> Result<()> {
        self.check_live()?;
        let timed = matches!(
            self.state.suspension(),
            Some(Suspension {
                wait: Wait::Timer { .. },
                ..
            })
        );
        if !timed {
            return Err(self.reject(EncounterError::NotWaiting { expected: "a timer" }));
        }
        self.resume()
    }

    /// Report that the player clicked a button.
    pub fn activate_edge(&mut self, edge: &EdgeId) -> Result<()> {
        self.check_live()?;
        let node = match &self.state {
            SequencerState::Halted(Suspension {
                node,
                wait: Wait::Choice { .. },
            }) => node.clone(),
            _ => {
                return Err(self.reject(EncounterError::NotWaiting {
                    expected: "a button activation",
                }))
            }
        };
        let node = self.node(&node)?;
        let NodeKind::Button(buttons) = &node.kind else {
            return Err(self.reject(EncounterError::NotWaiting {
                expected: "a button activation",
            }));
        };

        let graph = self.graph.as_ref().ok_or(EncounterError::NotStarted)?;
        let next = match activate_button(graph, node, buttons, edge, &mut self.marks, &self.context)
        {
            Ok(next) => next,
            Err(e) if e.is_fatal() => return Err(self.fail(e)),
            Err(e) => return Err(self.reject(e)),
        };
        debug!(encounter = %self.encounter.id, node = %node.id, edge = %edge, "button activated");

        self.drive(|sequencer| {
            sequencer.state = SequencerState::Running {
                node: node.id.clone(),
            };
            sequencer.finish(node, next)
        })
    }

    /// Report which outcome closed the current dialog.
    pub fn choose_outcome(&mut self, outcome: DialogOutcome) -> Result<()> {
        self.check_live()?;
        let (node, edge) = match &self.state {
            SequencerState::Halted(Suspension {
                node,
                wait: Wait::Outcome { edge, .. },
            }) => (node.clone(), edge.clone()),
            _ => {
                return Err(self.reject(EncounterError::NotWaiting {
                    expected: "a dialog outcome",
                }))
            }
        };
        let node = self.node(&node)?;
        let NodeKind::Dialog(dialog) = &node.kind else {
            return Err(self.reject(EncounterError::NotWaiting {
                expected: "a dialog outcome",
            }));
        };

        let graph = self.graph.as_ref().ok_or(EncounterError::NotStarted)?;
        let next = match resolution::choose_outcome(graph, node, dialog, &edge, outcome) {
            Ok(next) => next,
            Err(e) if e.is_fatal() => return Err(self.fail(e)),
            Err(e) => return Err(self.reject(e)),
        };
        debug!(encounter = %self.encounter.id, node = %node.id, %outcome, "dialog closed");

        self.drive(|sequencer| {
            sequencer.state = SequencerState::Running {
                node: node.id.clone(),
            };
            sequencer.finish(node, next)
        })
    }

    /// Report that halting work behind a signal finished.
    ///
    /// Signals that were issued but are no longer awaited are ignored.
    pub fn complete_signal(&mut self, signal: SignalId) -> Result<()> {
        match &self.state {
            SequencerState::Idle => return Err(self.reject(EncounterError::NotStarted)),
            SequencerState::Failed(error) => return Err(error.clone()),
            _ => {}
        }
        if signal.0 >= self.next_signal {
            return Err(self.reject(EncounterError::SignalRejected { signal }));
        }

        let drained = match &mut self.state {
            SequencerState::Halted(Suspension {
                wait:
                    Wait::Signals {
                        outstanding,
                        delays,
                        ..
                    },
                ..
            }) => {
                if outstanding.remove(&signal) {
                    delays.remove(&signal);
                    Some(outstanding.is_empty())
                } else {
                    None
                }
            }
            _ => None,
        };

        match drained {
            Some(true) => self.resume(),
            Some(false) => Ok(()),
            None => {
                debug!(encounter = %self.encounter.id, %signal, "ignoring stale signal");
                Ok(())
            }
        }
    }

    /// Stop the run where it is. Pending timers and signals are dropped.
    pub fn abort(&mut self) -> Result<()> {
        match &self.state {
            SequencerState::Idle => return Err(self.reject(EncounterError::NotStarted)),
            SequencerState::Complete { .. } | SequencerState::Aborted { .. } => {
                return Err(self.reject(EncounterError::Finished))
            }
            SequencerState::Failed(error) => return Err(error.clone()),
            SequencerState::Running { .. } | SequencerState::Halted(_) => {}
        }

        let node = self.state.current_node().cloned();
        info!(
            encounter = %self.encounter.id,
            node = ?node,
            "encounter aborted"
        );
        self.state = SequencerState::Aborted { node: node.clone() };
        self.close_run(false);
        self.events.push_back(SequencerEvent::Aborted { node });
        Ok(())
    }

    fn check_live(&self) -> Result<()> {
        match &self.state {
            SequencerState::Idle => Err(self.reject(EncounterError::NotStarted)),
            SequencerState::Complete { .. } | SequencerState::Aborted { .. } => {
                Err(self.reject(EncounterError::Finished))
            }
            SequencerState::Failed(error) => Err(error.clone()),
            SequencerState::Running { .. } | SequencerState::Halted(_) => Ok(()),
        }
    }

    fn reject(&self, rejection: EncounterError) -> EncounterError {
        warn!(
            encounter = %self.encounter.id,
            node = ?self.state.current_node(),
            error = %rejection,
            "input rejected"
        );
        rejection
    }

    fn fail(&mut self, error: EncounterError) -> EncounterError {
        error!(
            encounter = %self.encounter.id,
            node = ?self.state.current_node(),
            error = %error,
            "encounter failed"
        );
        self.state = SequencerState::Failed(error.clone());
        if self.graph.is_some() {
            self.close_run(false);
        }
        self.events.push_back(SequencerEvent::Failed {
            error: error.clone(),
        });
        error
    }

    /// Record a finished run. Interaction predicates evaluated during a run
    /// read only earlier playthroughs.
    fn close_run(&mut self, completed: bool) {
        self.context.record_interaction(Interaction::Seen);
        if completed {
            self.context.record_interaction(Interaction::Completed);
        }
    }

    fn node(&self, id: &NodeId) -> Result<&'a Node> {
        self.graph
            .as_ref()
            .ok_or(EncounterError::NotStarted)?
            .get(id)
            .ok_or_else(|| EncounterError::DanglingReference {
                node: id.clone(),
                edge: None,
                target: id.clone(),
            })
    }

    /// Run an input's first move, then walk until the run suspends or ends.
    /// Fatal errors on the way fail the run.
    fn drive(&mut self, first: impl FnOnce(&mut Self) -> Result<Flow>) -> Result<()> {
        match first(self).and_then(|flow| self.walk(flow)) {
            Err(e) if e.is_fatal() => Err(self.fail(e)),
            result => result,
        }
    }

    fn walk(&mut self, mut flow: Flow) -> Result<()> {
        let mut visited = 0;
        while let Flow::Enter(id) = flow {
            visited += 1;
            if visited > self.config.step_limit {
                return Err(EncounterError::StepLimitExceeded {
                    node: id,
                    limit: self.config.step_limit,
                });
            }
            flow = self.enter(&id)?;
        }
        Ok(())
    }

    fn enter(&mut self, id: &NodeId) -> Result<Flow> {
        let node = self.node(id)?;
        self.state = SequencerState::Running { node: id.clone() };
        self.history.push(id.clone());
        debug!(
            encounter = %self.encounter.id,
            node = %id,
            kind = %node.tag(),
            "entering node"
        );

        let graph = self.graph.as_ref().ok_or(EncounterError::NotStarted)?;
        let resolution =
            Resolver::new(graph, &mut self.context, &mut *self.rng, &self.marks).resolve(node)?;

        let options = match &resolution.step {
            Step::AwaitButton { options } => NodeOptions::Buttons(options.clone()),
            Step::AwaitOutcome { prompt } => NodeOptions::Dialog(prompt.clone()),
            Step::Continue { .. } | Step::Halt { .. } => NodeOptions::None,
        };
        self.events.push_back(SequencerEvent::NodeEntered {
            node: id.clone(),
            tag: node.tag(),
            name: node.name.clone(),
            options,
        });
        let pending = self.publish(node, resolution.effects);

        match resolution.step {
            Step::Continue { next } => self.settle(node, next),
            Step::Halt { next } if pending.outstanding.is_empty() => self.finish(node, next),
            Step::Halt { next } => {
                self.suspend(
                    node,
                    Wait::Signals {
                        outstanding: pending.outstanding,
                        delays: pending.delays,
                        next,
                    },
                );
                Ok(Flow::Stop)
            }
            Step::AwaitButton { options } => {
                self.suspend(node, Wait::Choice { options });
                Ok(Flow::Stop)
            }
            Step::AwaitOutcome { prompt } => {
                let outcomes = prompt.outcomes.iter().map(|option| option.outcome).collect();
                self.suspend(
                    node,
                    Wait::Outcome {
                        edge: prompt.edge,
                        outcomes,
                    },
                );
                Ok(Flow::Stop)
            }
        }
    }

    /// Queue events for a node's effects and issue signals for halting ones.
    fn publish(&mut self, node: &Node, effects: Vec<Effect>) -> Pending {
        let mut pending = Pending::default();
        for effect in effects {
            let event = match effect {
                Effect::FactsChanged { target, deltas } => SequencerEvent::FactsChanged {
                    node: node.id.clone(),
                    target,
                    deltas,
                },
                Effect::Invoke {
                    edge,
                    event,
                    halting,
                } => {
                    self.forward_log(&node.id, &edge, &event);
                    let delay = match &event {
                        EncounterEvent::Delay { seconds } => Some(*seconds),
                        _ => None,
                    };
                    // An elapsed delay has nothing left to wait for.
                    let halting = halting && delay.map_or(true, |seconds| seconds > 0.0);
                    let signal = halting.then(|| self.issue_signal());
                    if let Some(signal) = signal {
                        pending.outstanding.insert(signal);
                        if let Some(seconds) = delay {
                            pending.delays.insert(signal, seconds);
                        }
                    }
                    SequencerEvent::EventInvoked {
                        node: node.id.clone(),
                        edge,
                        event,
                        signal,
                    }
                }
                Effect::ArticleSection { edge, section } => SequencerEvent::ArticleSectionAdded {
                    node: node.id.clone(),
                    edge,
                    section,
                },
                Effect::InitializeActor {
                    edge,
                    actor,
                    name,
                    avatar,
                } => SequencerEvent::ActorInitialized {
                    node: node.id.clone(),
                    edge,
                    actor,
                    name,
                    avatar,
                },
                Effect::FocusActor {
                    edge,
                    actor,
                    halting,
                } => {
                    let signal = halting.then(|| self.issue_signal());
                    if let Some(signal) = signal {
                        pending.outstanding.insert(signal);
                    }
                    SequencerEvent::ActorFocused {
                        node: node.id.clone(),
                        edge,
                        actor,
                        signal,
                    }
                }
                Effect::Message { edge, entry } => SequencerEvent::MessageDisplayed {
                    node: node.id.clone(),
                    edge,
                    entry,
                },
            };
            self.events.push_back(event);
        }
        pending
    }

    fn forward_log(&self, node: &NodeId, edge: &EdgeId, event: &EncounterEvent) {
        let EncounterEvent::DebugLog { message, severity } = event else {
            return;
        };
        let encounter = &self.encounter.id;
        match severity {
            LogSeverity::Trace => trace!(%encounter, %node, %edge, "{message}"),
            LogSeverity::Debug => debug!(%encounter, %node, %edge, "{message}"),
            LogSeverity::Info => info!(%encounter, %node, %edge, "{message}"),
            LogSeverity::Warning => warn!(%encounter, %node, %edge, "{message}"),
            LogSeverity::Error => error!(%encounter, %node, %edge, "{message}"),
        }
    }

    fn issue_signal(&mut self) -> SignalId {
        let signal = SignalId(self.next_signal);
        self.next_signal += 1;
        signal
    }

    fn suspend(&mut self, node: &Node, wait: Wait) {
        debug!(encounter = %self.encounter.id, node = %node.id, wait = ?wait, "halted");
        self.state = SequencerState::Halted(Suspension {
            node: node.id.clone(),
            wait,
        });
    }

    /// A node whose own work is done lingers for its duration, if it has one.
    fn settle(&mut self, node: &Node, next: Option<Next>) -> Result<Flow> {
        match node.duration {
            Some(seconds) if seconds > 0.0 => {
                self.suspend(
                    node,
                    Wait::Timer {
                        remaining: seconds,
                        next,
                    },
                );
                Ok(Flow::Stop)
            }
            _ => self.finish(node, next),
        }
    }

    /// Leave a node: complete the run on an ending, otherwise check the target.
    fn finish(&mut self, node: &Node, next: Option<Next>) -> Result<Flow> {
        self.events.push_back(SequencerEvent::NodeCompleted {
            node: node.id.clone(),
        });

        if node.ending {
            info!(encounter = %self.encounter.id, ending = %node.id, "encounter complete");
            self.state = SequencerState::Complete {
                ending: node.id.clone(),
            };
            self.close_run(true);
            self.events.push_back(SequencerEvent::Completed {
                ending: node.id.clone(),
            });
            return Ok(Flow::Stop);
        }

        let next = next.ok_or_else(|| GraphIntegrityError::BlankReference {
            node: node.id.clone(),
            edge: None,
        })?;
        let known = self
            .graph
            .as_ref()
            .is_some_and(|graph| graph.contains(&next.target));
        if !known {
            return Err(EncounterError::DanglingReference {
                node: node.id.clone(),
                edge: next.edge,
                target: next.target,
            });
        }
        Ok(Flow::Enter(next.target))
    }

    /// Leave the suspended node once its wait is over.
    fn resume(&mut self) -> Result<()> {
        let suspension = match std::mem::take(&mut self.state) {
            SequencerState::Halted(suspension) => suspension,
            other => {
                self.state = other;
                return Ok(());
            }
        };
        let Suspension { node, wait } = suspension;
        let next = match wait {
            Wait::Timer { next, .. } | Wait::Signals { next, .. } => next,
            Wait::Choice { .. } | Wait::Outcome { .. } => None,
        };
        self.state = SequencerState::Running { node: node.clone() };

        self.drive(|sequencer| {
            let node = sequencer.node(&node)?;
            sequencer.finish(node, next)
        })
    }
}
