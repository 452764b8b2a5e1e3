//! The compiled-in urban emissions topology.
//!
//! Four sectors (industries, transport, energy, infrastructure) feed a set of
//! causal paths that aggregate into CO₂, which in turn drives the AQI chain.
//! Several paths loop back into sectors (`moves-goods → transport`,
//! `powers-industry → energy`, the infrastructure inflows), so the graph is
//! cyclic by construction.

use super::{CausalGraph, Edge, Node};

/// Id of the tracked CO₂ output node.
pub const CO2_NODE: &str = "co2";
/// Id of the tracked AQI output node.
pub const AQI_NODE: &str = "aqi";

/// Build the baseline graph with zeroed derived values.
pub fn baseline_graph() -> CausalGraph {
    CausalGraph::new(baseline_nodes(), baseline_edges())
}

fn baseline_nodes() -> Vec<Node> {
    vec![
        // Sectors
        Node::sector("industries", "Industries", 100.0),
        Node::sector("transport", "Transport", 35.0),
        Node::sector("energy", "Energy", 0.0),
        Node::sector("infrastructure", "Infrastructure", 0.0),
        // Industry paths
        Node::intermediate("moves-goods", "Moves goods → ↑ CO₂ & particulates"),
        Node::intermediate("uses-power", "Uses power → ↑ CO₂ & pollutants"),
        Node::intermediate("powers-industry", "Powers industry → ↑ CO₂"),
        Node::intermediate("industrial-pollutants", "Industrial pollutants (PM, NOx, SO₂)"),
        // Transport paths
        Node::intermediate("fuels-transport", "Fuels transport → ↑ CO₂"),
        Node::intermediate("fuel-refining", "Fuel refining → ↑ CO₂"),
        Node::intermediate("vehicle-emissions", "Vehicle emissions (PM, NOx)"),
        Node::intermediate("urban-sprawl", "Urban sprawl → ↑ CO₂ & emissions"),
        // Infrastructure paths
        Node::intermediate("drives-construction", "Drives construction → ↑ CO₂"),
        Node::intermediate("enables-industry", "Enables industry → ↑ CO₂"),
        Node::intermediate("needs-roads", "Needs roads/airports → ↑ CO₂"),
        Node::intermediate("embodied-use", "Embodied + use"),
        // Energy paths
        Node::intermediate("energy-demand", "Energy demand → ↑ CO₂"),
        Node::intermediate("generation", "Generation"),
        Node::intermediate("power-generation", "Power generation (SO₂, NOx)"),
        // Aggregation and outputs
        Node::intermediate("direct-indirect", "Direct + indirect"),
        Node::intermediate("fuel-travel", "Fuel & travel"),
        Node::output(CO2_NODE, "CO₂ Emissions"),
        Node::intermediate("contributes", "Contributes to"),
        Node::output(AQI_NODE, "Air Quality Index (AQI)"),
        Node::intermediate("poor-aqi", "Poor AQI → Urban health/stability"),
    ]
}

fn baseline_edges() -> Vec<Edge> {
    const EDGES: &[(&str, &str, &str, f64)] = &[
        // Industries → transport / energy
        ("i-mg", "industries", "moves-goods", 0.6),
        ("mg-t", "moves-goods", "transport", 0.6),
        ("i-up", "industries", "uses-power", 0.5),
        ("i-pi", "industries", "powers-industry", 0.4),
        ("pi-e", "powers-industry", "energy", 0.6),
        // Transport effects
        ("t-ft", "transport", "fuels-transport", 0.5),
        ("t-fr", "transport", "fuel-refining", 0.5),
        ("ft-e", "fuels-transport", "energy", 0.6),
        ("fr-e", "fuel-refining", "energy", 0.6),
        ("t-us", "transport", "urban-sprawl", 0.4),
        ("t-ve", "transport", "vehicle-emissions", 0.7),
        // Infrastructure
        ("t-dc", "transport", "drives-construction", 0.4),
        ("t-ei", "transport", "enables-industry", 0.4),
        ("t-nr", "transport", "needs-roads", 0.4),
        ("dc-inf", "drives-construction", "infrastructure", 0.6),
        ("ei-inf", "enables-industry", "infrastructure", 0.6),
        ("nr-inf", "needs-roads", "infrastructure", 0.6),
        ("us-inf", "urban-sprawl", "infrastructure", 0.6),
        ("inf-eu", "infrastructure", "embodied-use", 0.5),
        // Energy
        ("us-ed", "urban-sprawl", "energy-demand", 0.5),
        ("ed-g", "energy-demand", "generation", 0.6),
        ("e-g", "energy", "generation", 0.7),
        ("g-pg", "generation", "power-generation", 0.6),
        // Emissions aggregation
        ("eu-co2", "embodied-use", CO2_NODE, 0.6),
        ("pg-co2", "power-generation", CO2_NODE, 0.7),
        ("ve-co2", "vehicle-emissions", CO2_NODE, 0.7),
        ("ip-co2", "industrial-pollutants", CO2_NODE, 0.8),
        ("di-co2", "direct-indirect", CO2_NODE, 0.8),
        ("ft-co2", "fuel-travel", CO2_NODE, 0.7),
        // AQI chain
        ("co2-c", CO2_NODE, "contributes", 0.8),
        ("c-aqi", "contributes", AQI_NODE, 0.8),
        ("aqi-pa", AQI_NODE, "poor-aqi", 0.8),
    ];

    EDGES
        .iter()
        .map(|&(id, source, target, weight)| Edge::new(id, source, target, weight))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    #[test]
    fn test_baseline_shape() {
        let graph = baseline_graph();
        assert_eq!(graph.nodes().len(), 25);
        assert_eq!(graph.edges().len(), 32);

        let sectors: Vec<_> = graph
            .nodes()
            .iter()
            .filter(|n| n.kind == NodeKind::Sector)
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(sectors, vec!["industries", "transport", "energy", "infrastructure"]);
        assert_eq!(graph.node(CO2_NODE).unwrap().kind, NodeKind::Output);
        assert_eq!(graph.node(AQI_NODE).unwrap().kind, NodeKind::Output);
    }

    #[test]
    fn test_baseline_edges_resolve() {
        let diag = baseline_graph().diagnostics();
        assert!(diag.dangling_edges.is_empty());
        assert!(diag.duplicate_node_ids.is_empty());
        assert!(diag.isolated_nodes.is_empty());
        assert!(diag.is_clean());
    }
}
