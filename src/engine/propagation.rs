//! Propagation engine.
//!
//! Value flow is bounded-round relaxation over the edge list:
//!
//! 1. every derived (non-sector) node starts at zero;
//! 2. each round, every edge whose endpoints are both enabled adds
//!    `source.value * weight` into a per-target accumulator;
//! 3. at the end of the round each derived node is **overwritten** with its
//!    accumulator. Nodes that received nothing fall to zero.
//!
//! Sector values are never written. Overwriting rather than accumulating
//! across rounds models current throughput, so feedback loops settle instead
//! of growing without bound.
//!
//! Contributions are folded in a canonical edge order (by source, target,
//! then edge id) computed per call, so the result does not depend on how the
//! graph happens to store its edges.

use tracing::debug;

use crate::graph::CausalGraph;

/// Default number of propagation rounds for the shipped topology.
pub const DEFAULT_ROUNDS: usize = 6;

/// Propagate with [`DEFAULT_ROUNDS`].
pub fn propagate(graph: &CausalGraph) -> CausalGraph {
    propagate_rounds(graph, DEFAULT_ROUNDS)
}

/// Propagate values through `graph` for a fixed number of rounds.
///
/// Pure: the input is untouched and the returned graph differs from it only
/// in the `value` of derived nodes.
pub fn propagate_rounds(graph: &CausalGraph, rounds: usize) -> CausalGraph {
    let mut next = graph.clone();
    let derived: Vec<bool> = next.nodes().iter().map(|n| n.kind.is_derived()).collect();
    let enabled: Vec<bool> = next.nodes().iter().map(|n| n.enabled).collect();

    // Resolve edges to arena positions once; edges touching unknown or
    // disabled nodes never carry flow and are dropped here.
    let mut links: Vec<Link> = next
        .edges()
        .iter()
        .filter_map(|edge| {
            let source = next.position(&edge.source)?;
            let target = next.position(&edge.target)?;
            (enabled[source] && enabled[target]).then(|| Link {
                source,
                target,
                weight: edge.weight,
                key: (edge.source.clone(), edge.target.clone(), edge.id.clone()),
            })
        })
        .collect();
    links.sort_by(|a, b| a.key.cmp(&b.key));

    let mut values: Vec<f64> = next
        .nodes()
        .iter()
        .zip(&derived)
        .map(|(node, &is_derived)| if is_derived { 0.0 } else { node.value })
        .collect();

    let mut accumulator = vec![0.0_f64; values.len()];
    for _ in 0..rounds {
        accumulator.iter_mut().for_each(|slot| *slot = 0.0);

        for link in &links {
            accumulator[link.target] += values[link.source] * link.weight;
        }

        for (pos, value) in values.iter_mut().enumerate() {
            if derived[pos] {
                *value = accumulator[pos];
            }
        }
    }

    for (node, value) in next.nodes_mut().iter_mut().zip(values) {
        node.value = value;
    }

    debug!(
        rounds,
        active_edges = links.len(),
        nodes = derived.len(),
        "Propagation complete"
    );
    next
}

struct Link {
    source: usize,
    target: usize,
    weight: f64,
    key: (String, String, String),
}
