//! Switch branch selection.

use rand::{Rng, RngCore};

use encounter_rules::FactSource;

use crate::graph::{active, SwitchEdge, SwitchNode, SwitchSelection};

/// Pick the branch a switch takes, or `None` to use its fallback.
///
/// Ignored edges never take part. Random selections do not look at filters.
pub fn select_edge<'n>(
    switch: &'n SwitchNode,
    facts: &(impl FactSource + ?Sized),
    rng: &mut dyn RngCore,
) -> Option<&'n SwitchEdge> {
    let edges = active(&switch.edges);
    match switch.selection {
        SwitchSelection::FirstFilter => edges
            .into_iter()
            .find(|edge| edge.entry.filter.evaluate(facts)),
        SwitchSelection::Random => {
            if edges.is_empty() {
                None
            } else {
                Some(edges[rng.gen_range(0..edges.len())])
            }
        }
        SwitchSelection::RandomWeighted => weighted(&edges, rng),
    }
}

fn weight_of(edge: &SwitchEdge) -> f32 {
    let weight = edge.entry.weight;
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

/// Roulette-wheel pick over positive weights.
fn weighted<'n>(edges: &[&'n SwitchEdge], rng: &mut dyn RngCore) -> Option<&'n SwitchEdge> {
    let total: f32 = edges.iter().map(|edge| weight_of(edge)).sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let roll = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last = None;
    for &edge in edges {
        let weight = weight_of(edge);
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last = Some(edge);
        if roll < cumulative {
            return Some(edge);
        }
    }
    // Rounding can leave the roll just past the final boundary.
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, SwitchEntry};
    use encounter_rules::{Filter, KeyValueStore};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn switch(selection: SwitchSelection, edges: Vec<SwitchEdge>) -> SwitchNode {
        SwitchNode { selection, edges }
    }

    fn edge(id: &str, filter: Filter, weight: f32) -> SwitchEdge {
        Edge::new(id, SwitchEntry::new(filter, id).with_weight(weight))
    }

    #[test]
    fn test_first_filter_takes_lowest_index() {
        let node = switch(
            SwitchSelection::FirstFilter,
            vec![
                edge("e0", Filter::new(), 1.0).with_index(0),
                edge("e2", Filter::passing(), 1.0).with_index(2),
                edge("e1", Filter::passing(), 1.0).with_index(1),
            ],
        );
        let mut rng = StdRng::seed_from_u64(1);
        let picked = select_edge(&node, &KeyValueStore::new(), &mut rng).unwrap();
        assert_eq!(picked.id.as_str(), "e1");
    }

    #[test]
    fn test_random_ignores_filters_but_not_ignore_flag() {
        let node = switch(
            SwitchSelection::Random,
            vec![
                edge("closed", Filter::new(), 1.0),
                edge("skipped", Filter::passing(), 1.0).ignored(),
            ],
        );
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let picked = select_edge(&node, &KeyValueStore::new(), &mut rng).unwrap();
            assert_eq!(picked.id.as_str(), "closed");
        }
    }

    #[test]
    fn test_empty_switch_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(3);
        let store = KeyValueStore::new();
        for selection in [
            SwitchSelection::FirstFilter,
            SwitchSelection::Random,
            SwitchSelection::RandomWeighted,
        ] {
            assert!(select_edge(&switch(selection, Vec::new()), &store, &mut rng).is_none());
        }
    }

    #[test]
    fn test_weighted_skips_non_positive_weights() {
        let mut rng = StdRng::seed_from_u64(11);
        let store = KeyValueStore::new();

        let zero = switch(
            SwitchSelection::RandomWeighted,
            vec![edge("a", Filter::passing(), 0.0), edge("b", Filter::passing(), -2.0)],
        );
        assert!(select_edge(&zero, &store, &mut rng).is_none());

        let one_live = switch(
            SwitchSelection::RandomWeighted,
            vec![edge("dead", Filter::passing(), 0.0), edge("live", Filter::new(), 0.5)],
        );
        for _ in 0..20 {
            assert_eq!(
                select_edge(&one_live, &store, &mut rng).unwrap().id.as_str(),
                "live"
            );
        }
    }
}
