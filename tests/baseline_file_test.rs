//! Loading baseline graphs from flow-document JSON files

use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

use causal_policy_sim::config::SimulationConfig;
use causal_policy_sim::engine::propagate;
use causal_policy_sim::error::GraphError;
use causal_policy_sim::graph::baseline::baseline_graph;
use causal_policy_sim::graph::wire::{load_graph_file, FlowGraph};
use causal_policy_sim::graph::NodeKind;
use causal_policy_sim::session::Session;

fn write_json(value: &serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", value).unwrap();
    file
}

#[test]
fn test_load_minimal_flow_document() {
    let file = write_json(&json!({
        "nodes": [
            {"id": "a", "data": {"label": "A", "value": 100, "type": "sector"}},
            {"id": "b", "data": {"label": "B"}},
            {"id": "out", "data": {"label": "Out", "type": "output", "enabled": true}}
        ],
        "edges": [
            {"source": "a", "target": "b", "data": {}},
            {"id": "b-out", "source": "b", "target": "out", "data": {"weight": 1.5}}
        ]
    }));

    let graph = load_graph_file(file.path()).unwrap();

    assert_eq!(graph.node("b").unwrap().kind, NodeKind::Intermediate);
    assert!(graph.node("b").unwrap().enabled);
    assert_eq!(graph.edge("a", "b").unwrap().weight, 0.5);
    assert_eq!(graph.edge("a", "b").unwrap().id, "a->b");
    assert_eq!(graph.edge("b", "out").unwrap().weight, 1.0);

    let propagated = propagate(&graph);
    assert_eq!(propagated.value_of("b"), 50.0);
    assert_eq!(propagated.value_of("out"), 50.0);
}

#[test]
fn test_baseline_round_trips_through_file() {
    let flow = FlowGraph::from(&baseline_graph());
    let file = write_json(&serde_json::to_value(&flow).unwrap());

    let loaded = load_graph_file(file.path()).unwrap();
    assert_eq!(loaded, baseline_graph());
}

#[test]
fn test_dangling_edges_are_tolerated() {
    let file = write_json(&json!({
        "nodes": [{"id": "a", "data": {"label": "A", "value": 10, "type": "sector"}}],
        "edges": [{"source": "a", "target": "missing", "data": {"weight": 0.2}}]
    }));

    let graph = load_graph_file(file.path()).unwrap();
    let diagnostics = graph.diagnostics();
    assert_eq!(diagnostics.dangling_edges.len(), 1);
    assert_eq!(propagate(&graph).value_of("a"), 10.0);
}

#[test]
fn test_invalid_json_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = load_graph_file(file.path()).unwrap_err();
    assert!(matches!(err, GraphError::Json(_)));
}

#[test]
fn test_missing_file_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_graph_file(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, GraphError::Load { .. }));
}

#[test]
fn test_session_uses_configured_baseline() {
    let file = write_json(&json!({
        "nodes": [
            {"id": "a", "data": {"label": "A", "value": 80, "type": "sector"}},
            {"id": "co2", "data": {"label": "CO2", "type": "output"}}
        ],
        "edges": [{"id": "e", "source": "a", "target": "co2", "data": {"weight": 0.25}}]
    }));

    let config = SimulationConfig {
        baseline_path: Some(file.path().to_path_buf()),
        ..SimulationConfig::default()
    };
    let session = Session::from_config(&config).unwrap();

    assert_eq!(session.graph().nodes().len(), 2);
    assert_eq!(session.graph().value_of("co2"), 20.0);
}
