//! Command-line interface.
//!
//! `serve` (the default) runs the stdio server; the other commands run a
//! single operation against the configured baseline and print the result.

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::Config;
use crate::policy::build_backends;
use crate::scenario::{ScenarioOrchestrator, ScenarioPresetRegistry};
use crate::session::Session;

/// Causal CO₂/AQI policy simulator.
#[derive(Parser, Debug)]
#[command(name = "causal-policy-sim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the JSON-RPC server on stdin/stdout
    Serve,

    /// Propagate the baseline and print node values as JSON
    Simulate {
        /// Disable a node before propagating (repeatable)
        #[arg(long)]
        disable: Vec<String>,
    },

    /// Check the baseline graph for dangling edges and isolated nodes
    Validate {
        /// Print the full diagnostics report
        #[arg(long)]
        verbose: bool,
    },

    /// List scenario presets
    Presets {
        /// Only presets carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },

    /// Compare scenario presets against the baseline
    Compare {
        /// Preset id to include (repeatable)
        #[arg(long = "preset", required = true)]
        presets: Vec<String>,
    },
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a one-shot CLI command. `Serve` is handled by the binary.
pub async fn execute_command(command: Commands, config: &Config) -> CliResult {
    let session = match Session::from_config(&config.simulation) {
        Ok(s) => s,
        Err(e) => return CliResult::error(format!("Failed to load baseline: {}", e)),
    };

    match command {
        Commands::Serve => CliResult::error("serve is not a one-shot command"),
        Commands::Simulate { disable } => execute_simulate(session, &disable),
        Commands::Validate { verbose } => execute_validate(&session, verbose),
        Commands::Presets { tag } => execute_presets(tag.as_deref()),
        Commands::Compare { presets } => execute_compare(&session, config, &presets).await,
    }
}

#[derive(Serialize)]
struct NodeValue<'a> {
    id: &'a str,
    enabled: bool,
    value: f64,
}

fn execute_simulate(mut session: Session, disable: &[String]) -> CliResult {
    for node_id in disable {
        let enabled = session.graph().node(node_id).map(|n| n.enabled);
        match enabled {
            Some(true) => {
                if let Err(e) = session.toggle_node(node_id) {
                    return CliResult::error(e.to_string());
                }
            }
            Some(false) => {}
            None => return CliResult::error(format!("Node not found: {}", node_id)),
        }
    }

    let values: Vec<NodeValue> = session
        .graph()
        .nodes()
        .iter()
        .map(|n| NodeValue {
            id: &n.id,
            enabled: n.enabled,
            value: n.value,
        })
        .collect();
    json_result(&values)
}

fn execute_validate(session: &Session, verbose: bool) -> CliResult {
    let diagnostics = session.graph().diagnostics();
    let summary = format!(
        "{} nodes, {} edges, {} dangling edges, {} isolated nodes, {} duplicate ids",
        diagnostics.node_count,
        diagnostics.edge_count,
        diagnostics.dangling_edges.len(),
        diagnostics.isolated_nodes.len(),
        diagnostics.duplicate_node_ids.len()
    );

    let message = if verbose {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => format!("{}\n{}", summary, json),
            Err(e) => return CliResult::error(e.to_string()),
        }
    } else {
        summary
    };

    if diagnostics.dangling_edges.is_empty() {
        CliResult::success(message)
    } else {
        CliResult::error(message)
    }
}

fn execute_presets(tag: Option<&str>) -> CliResult {
    let registry = ScenarioPresetRegistry::new();
    let mut output = String::new();
    for preset in registry.list(tag) {
        output.push_str(&format!(
            "{:<24} {} [{}]\n    {}\n",
            preset.id,
            preset.display_name,
            preset.tags.join(", "),
            preset.description
        ));
    }
    CliResult::success(output)
}

async fn execute_compare(session: &Session, config: &Config, preset_ids: &[String]) -> CliResult {
    let registry = ScenarioPresetRegistry::new();
    let mut scenarios = Vec::with_capacity(preset_ids.len());
    for id in preset_ids {
        match registry.get(id) {
            Some(preset) => scenarios.push(preset.to_request()),
            None => return CliResult::error(format!("Unknown preset: {}", id)),
        }
    }

    let (generator, applier) = match build_backends(config) {
        Ok(backends) => backends,
        Err(e) => return CliResult::error(e.to_string()),
    };
    let comparison = ScenarioOrchestrator::new(generator, applier)
        .compare(&scenarios, session.graph())
        .await;
    json_result(&comparison)
}

fn json_result<T: Serialize>(value: &T) -> CliResult {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliResult::success(json),
        Err(e) => CliResult::error(format!("Failed to serialize output: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["causal-policy-sim"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::try_parse_from([
            "causal-policy-sim",
            "compare",
            "--preset",
            "coal-phase-down",
            "--preset",
            "transport-restriction",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Compare {
                presets: vec![
                    "coal-phase-down".to_string(),
                    "transport-restriction".to_string()
                ]
            })
        );
    }

    #[test]
    fn test_compare_requires_preset() {
        assert!(Cli::try_parse_from(["causal-policy-sim", "compare"]).is_err());
    }

    #[tokio::test]
    async fn test_simulate_with_disabled_transport() {
        let result = execute_command(
            Commands::Simulate {
                disable: vec!["transport".to_string()],
            },
            &Config::default(),
        )
        .await;
        assert_eq!(result.exit_code, 0);

        let values: serde_json::Value = serde_json::from_str(&result.message).unwrap();
        let co2 = values
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["id"] == "co2")
            .unwrap();
        assert_eq!(co2["value"], 0.0);
    }

    #[tokio::test]
    async fn test_simulate_unknown_node() {
        let result = execute_command(
            Commands::Simulate {
                disable: vec!["ghost".to_string()],
            },
            &Config::default(),
        )
        .await;
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn test_validate_baseline() {
        let result = execute_command(Commands::Validate { verbose: false }, &Config::default()).await;
        assert_eq!(result.exit_code, 0);
        assert!(result.message.starts_with("25 nodes, 32 edges"));
    }

    #[tokio::test]
    async fn test_compare_unknown_preset() {
        let result = execute_command(
            Commands::Compare {
                presets: vec!["nope".to_string()],
            },
            &Config::default(),
        )
        .await;
        assert_eq!(result.exit_code, 1);
        assert!(result.message.contains("nope"));
    }
}
