//! Graph validation.
//!
//! Structural invariants come first: one beginning, at least one ending,
//! unique node ids, unique edge ids per node, and every forward reference
//! resolving (or blank where its policy allows). Only a structurally sound
//! graph is then checked for closed cycles and a reachable ending.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use super::encounter::Encounter;
use super::ids::{non_blank, NodeId};
use super::node::{BlankPolicy, Node, Reference};
use crate::error::GraphIntegrityError;

/// Toggles for the graph-shape rules beyond the structural invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject a reachable cycle with no ending and no way out.
    pub reject_closed_cycles: bool,
    /// Reject a graph whose endings are all unreachable from the beginning.
    pub require_reachable_ending: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            reject_closed_cycles: true,
            require_reachable_ending: true,
        }
    }
}

impl ValidationConfig {
    /// Only the structural invariants.
    pub fn structural() -> Self {
        Self {
            reject_closed_cycles: false,
            require_reachable_ending: false,
        }
    }
}

/// Collect every violation, in invariant order.
pub(crate) fn check(encounter: &Encounter, config: &ValidationConfig) -> Vec<GraphIntegrityError> {
    let mut errors = Vec::new();
    let nodes = &encounter.nodes;

    let mut ids = HashSet::new();
    for node in nodes {
        if !ids.insert(&node.id) {
            errors.push(GraphIntegrityError::DuplicateNodeId {
                node: node.id.clone(),
            });
        }
    }

    let beginnings: Vec<NodeId> = nodes
        .iter()
        .filter(|node| node.beginning)
        .map(|node| node.id.clone())
        .collect();
    match beginnings.len() {
        0 => errors.push(GraphIntegrityError::MissingBeginning),
        1 => {}
        _ => errors.push(GraphIntegrityError::MultipleBeginnings { nodes: beginnings }),
    }

    if !nodes.iter().any(|node| node.ending) {
        errors.push(GraphIntegrityError::MissingEnding);
    }

    for node in nodes {
        let mut edges = HashSet::new();
        for header in node.kind.edge_headers() {
            if !edges.insert(header.id) {
                errors.push(GraphIntegrityError::DuplicateEdgeId {
                    node: node.id.clone(),
                    edge: header.id.clone(),
                });
            }
        }
    }

    if let Some(end) = encounter.default_end() {
        if !encounter.node(end).is_some_and(|node| node.ending) {
            errors.push(GraphIntegrityError::DefaultEndNotEnding { node: end.clone() });
        }
    }

    for node in nodes {
        for reference in node.references() {
            match non_blank(reference.target) {
                Some(target) if !ids.contains(target) => {
                    errors.push(GraphIntegrityError::UnknownReference {
                        node: node.id.clone(),
                        edge: reference.edge.cloned(),
                        target: target.clone(),
                    });
                }
                Some(_) => {}
                None if node.ending || blank_resolves(encounter, node, &reference) => {}
                None => errors.push(GraphIntegrityError::BlankReference {
                    node: node.id.clone(),
                    edge: reference.edge.cloned(),
                }),
            }
        }
    }

    if errors.is_empty() {
        errors.extend(check_shape(encounter, config));
    }
    errors
}

/// Whether a blank reference has somewhere to go under its policy.
fn blank_resolves(encounter: &Encounter, node: &Node, reference: &Reference<'_>) -> bool {
    let policy = match reference.policy {
        BlankPolicy::SpecifiedByModel => node.kind.model_blank_policy(),
        policy => policy,
    };
    match policy {
        BlankPolicy::FallsThrough if reference.edge.is_some() => fallback_resolves(encounter, node),
        BlankPolicy::FallsThrough => encounter.default_end().is_some(),
        BlankPolicy::Disallowed | BlankPolicy::SpecifiedByModel => false,
    }
}

fn fallback_resolves(encounter: &Encounter, node: &Node) -> bool {
    node.fallback().is_some()
        || (node.kind.model_blank_policy() == BlankPolicy::FallsThrough
            && encounter.default_end().is_some())
}

/// Where a reference leads once blanks are resolved, if anywhere.
fn resolved_target<'e>(
    encounter: &'e Encounter,
    node: &'e Node,
    reference: &Reference<'e>,
) -> Option<&'e NodeId> {
    if let Some(target) = non_blank(reference.target) {
        return Some(target);
    }
    let through_fallback = reference.edge.is_some() && node.fallback().is_some();
    if through_fallback {
        return node.fallback();
    }
    match node.kind.model_blank_policy() {
        BlankPolicy::FallsThrough => encounter.default_end(),
        _ => None,
    }
}

/// Successor lists over node positions. Endings have none: a run stops there.
fn successors(encounter: &Encounter) -> Vec<Vec<usize>> {
    let positions: HashMap<&NodeId, usize> = encounter
        .nodes
        .iter()
        .enumerate()
        .map(|(position, node)| (&node.id, position))
        .collect();

    encounter
        .nodes
        .iter()
        .map(|node| {
            if node.ending {
                return Vec::new();
            }
            let mut next: Vec<usize> = node
                .references()
                .iter()
                .filter_map(|reference| resolved_target(encounter, node, reference))
                .filter_map(|target| positions.get(target).copied())
                .collect();
            next.sort_unstable();
            next.dedup();
            next
        })
        .collect()
}

fn check_shape(encounter: &Encounter, config: &ValidationConfig) -> Vec<GraphIntegrityError> {
    let mut errors = Vec::new();
    let Some(beginning) = encounter.nodes.iter().position(|node| node.beginning) else {
        return errors;
    };
    let successors = successors(encounter);

    if config.require_reachable_ending {
        let reachable = reachable_from(&successors, beginning);
        if !reachable.iter().any(|&position| encounter.nodes[position].ending) {
            errors.push(GraphIntegrityError::UnreachableEnding {
                beginning: encounter.nodes[beginning].id.clone(),
            });
        }
    }

    if config.reject_closed_cycles {
        for component in Tarjan::components(&successors, beginning) {
            let contains_ending = component
                .iter()
                .any(|&position| encounter.nodes[position].ending);
            let is_cycle = component.len() > 1 || successors[component[0]].contains(&component[0]);
            let members: HashSet<usize> = component.iter().copied().collect();
            let has_exit = component.iter().any(|&position| {
                successors[position]
                    .iter()
                    .any(|next| !members.contains(next))
            });
            if is_cycle && !contains_ending && !has_exit {
                errors.push(GraphIntegrityError::ClosedCycle {
                    nodes: component
                        .iter()
                        .map(|&position| encounter.nodes[position].id.clone())
                        .collect(),
                });
            }
        }
    }

    errors
}

fn reachable_from(successors: &[Vec<usize>], start: usize) -> Vec<usize> {
    let mut seen = vec![false; successors.len()];
    let mut queue = VecDeque::from([start]);
    let mut reached = Vec::new();
    seen[start] = true;

    while let Some(current) = queue.pop_front() {
        reached.push(current);
        for &next in &successors[current] {
            if !seen[next] {
                seen[next] = true;
                queue.push_back(next);
            }
        }
    }
    reached
}

/// Tarjan's strongly connected components, restricted to what a root reaches.
struct Tarjan<'s> {
    successors: &'s [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl<'s> Tarjan<'s> {
    /// Components in ascending order of their first node position.
    fn components(successors: &'s [Vec<usize>], root: usize) -> Vec<Vec<usize>> {
        let count = successors.len();
        let mut tarjan = Tarjan {
            successors,
            index: vec![None; count],
            lowlink: vec![0; count],
            on_stack: vec![false; count],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };
        tarjan.visit(root);

        let mut components = tarjan.components;
        for component in &mut components {
            component.sort_unstable();
        }
        components.sort_by_key(|component| component[0]);
        components
    }

    /// Depth-first walk with an explicit frame stack of
    /// `(node, next successor to look at)`, so path length is not bounded by
    /// the thread stack.
    fn visit(&mut self, root: usize) {
        let successors = self.successors;
        self.open(root);
        let mut frames = vec![(root, 0)];

        while let Some(frame) = frames.last_mut() {
            let (node, cursor) = *frame;
            if let Some(&next) = successors[node].get(cursor) {
                frame.1 += 1;
                match self.index[next] {
                    None => {
                        self.open(next);
                        frames.push((next, 0));
                    }
                    Some(index) if self.on_stack[next] => {
                        self.lowlink[node] = self.lowlink[node].min(index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
            }
            if self.index[node] == Some(self.lowlink[node]) {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack[member] = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }

    fn open(&mut self, node: usize) {
        self.index[node] = Some(self.next_index);
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }
}
