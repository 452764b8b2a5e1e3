//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state: one session plus the policy collaborators

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::AppResult;
use crate::policy::{build_backends, PolicyApplier, PolicyGenerator};
use crate::scenario::{ScenarioOrchestrator, ScenarioPresetRegistry};
use crate::session::Session;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// The process-wide simulation session. Toggles and apply cycles take
    /// this lock for their whole duration.
    pub session: Mutex<Session>,
    /// Policy generation collaborator.
    pub generator: Arc<dyn PolicyGenerator>,
    /// Policy application collaborator.
    pub applier: Arc<dyn PolicyApplier>,
    /// Scenario comparison runner.
    pub orchestrator: ScenarioOrchestrator,
    /// Scenario preset registry.
    pub preset_registry: Arc<ScenarioPresetRegistry>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        session: Session,
        generator: Arc<dyn PolicyGenerator>,
        applier: Arc<dyn PolicyApplier>,
    ) -> Self {
        tracing::info!(
            session_id = %session.id(),
            generator = ?config.backends.generator,
            applier = ?config.backends.applier,
            "AppState initializing"
        );

        let orchestrator = ScenarioOrchestrator::new(Arc::clone(&generator), Arc::clone(&applier));

        Self {
            config,
            session: Mutex::new(session),
            generator,
            applier,
            orchestrator,
            preset_registry: Arc::new(ScenarioPresetRegistry::new()),
        }
    }

    /// Build the full state from configuration.
    pub fn from_config(config: Config) -> AppResult<Self> {
        let session = Session::from_config(&config.simulation)?;
        let (generator, applier) = build_backends(&config)?;
        Ok(Self::new(config, session, generator, applier))
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_from_default_config() {
        let state = AppState::from_config(Config::default()).unwrap();

        let session = state.session.lock().await;
        assert_eq!(session.graph().nodes().len(), 25);
        assert_eq!(state.preset_registry.count(), 3);
    }

    #[tokio::test]
    async fn test_shared_state_type() {
        let state = AppState::from_config(Config::default()).unwrap();
        let shared: SharedState = Arc::new(state);

        let shared2 = Arc::clone(&shared);
        assert_eq!(Arc::strong_count(&shared), 2);
        drop(shared2);
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    #[test]
    fn test_missing_baseline_file_fails() {
        let mut config = Config::default();
        config.simulation.baseline_path = Some("/nonexistent/baseline.json".into());
        assert!(AppState::from_config(config).is_err());
    }
}
