//! # Causal Policy Simulator
//!
//! Simulates how policy-driven changes to an urban emissions / air-quality
//! causal graph propagate into CO₂ and AQI outcomes, and reports the
//! resulting impact and cascade effects.
//!
//! ## Features
//!
//! - **Propagation**: bounded-round accumulate-then-overwrite value flow over a
//!   cyclic weighted graph
//! - **Policy mutations**: best-effort, copy-on-write application of edge
//!   reweights and node toggles, with an audit trail
//! - **Impact analysis**: CO₂/AQI deltas and a ranked cascade of affected nodes
//! - **Scenario comparison**: named scenarios run through a policy generator
//!   and applier, then ranked
//! - **Sessions**: an owned current graph with undo and a serialized
//!   generate/apply/commit cycle
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → stdio JSON-RPC → Session ─┬→ PolicyGenerator (keyword | HTTP service)
//!                                        └→ PolicyApplier   (embedded engine | HTTP service)
//!                                                 ↓
//!                                 apply → propagate → analyze
//! ```
//!
//! ## Example
//!
//! ```
//! use causal_policy_sim::engine::{Mutation, Policy, Simulator};
//! use causal_policy_sim::graph::baseline::baseline_graph;
//!
//! let policy = Policy::new("ev", "Electric buses").with_mutation(Mutation::ReduceEdgeWeight {
//!     source: "transport".to_string(),
//!     target: "vehicle-emissions".to_string(),
//!     new_weight: 0.35,
//!     reason: "Fleet electrification".to_string(),
//! });
//!
//! let evaluation = Simulator::default().evaluate(&baseline_graph(), &policy);
//! assert!(evaluation.impact.co2.change_pct < 0.0);
//! ```

/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Propagation, mutation and impact analysis.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// Graph model, shipped baseline and wire format.
pub mod graph;
/// Policy generation and application collaborators.
pub mod policy;
/// Scenario orchestration and presets.
pub mod scenario;
/// MCP server implementation and request handling.
pub mod server;
/// Interactive simulation session.
pub mod session;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
