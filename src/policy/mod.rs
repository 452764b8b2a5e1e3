//! Policy generation and application collaborators.
//!
//! The engine never invents policies itself. It asks a [`PolicyGenerator`]
//! for one and hands it to a [`PolicyApplier`], which either runs the
//! embedded engine ([`LocalApplier`]) or calls the external service
//! ([`PolicyServiceClient`]).

mod client;
mod keyword;
mod local;
mod types;

pub use client::PolicyServiceClient;
pub use keyword::KeywordPolicyGenerator;
pub use local::LocalApplier;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{ApplierBackend, Config, GeneratorBackend};
use crate::engine::{Policy, Simulator};
use crate::error::{AppResult, PolicyServiceResult};
use crate::graph::CausalGraph;

/// Produces a policy for a research query.
#[async_trait]
pub trait PolicyGenerator: Send + Sync {
    /// Generate one policy for `research_query` against the given graph.
    async fn generate(
        &self,
        research_query: &str,
        context: &GraphContext,
    ) -> PolicyServiceResult<Policy>;
}

/// Applies a policy to a baseline graph and reports the impact.
#[async_trait]
pub trait PolicyApplier: Send + Sync {
    /// Apply `policy` to `baseline`. The baseline itself is never modified.
    async fn apply(
        &self,
        policy: &Policy,
        baseline: &CausalGraph,
    ) -> PolicyServiceResult<AppliedPolicy>;
}

/// Build the generator/applier pair selected by configuration.
pub fn build_backends(
    config: &Config,
) -> AppResult<(Arc<dyn PolicyGenerator>, Arc<dyn PolicyApplier>)> {
    let simulator = Simulator::new(&config.simulation);

    let client = match config.policy_service.base_url {
        Some(_) => Some(Arc::new(PolicyServiceClient::new(
            &config.policy_service,
            config.request.clone(),
        )?)),
        None => None,
    };

    let generator: Arc<dyn PolicyGenerator> = match (config.backends.generator, &client) {
        (GeneratorBackend::Remote, Some(client)) => client.clone(),
        _ => Arc::new(KeywordPolicyGenerator::new()),
    };

    let applier: Arc<dyn PolicyApplier> = match (config.backends.applier, &client) {
        (ApplierBackend::Remote, Some(client)) => client.clone(),
        _ => Arc::new(LocalApplier::new(simulator)),
    };

    Ok((generator, applier))
}
