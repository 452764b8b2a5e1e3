//! Named scenario presets.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::error;

use super::ScenarioRequest;

/// A reusable scenario definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPreset {
    /// Unique identifier (e.g., "transport-first").
    pub id: String,
    /// Human-readable name, also used as the scenario name in comparisons.
    pub display_name: String,
    pub description: String,
    /// Research queries sent to the policy generator.
    pub policy_queries: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ScenarioPreset {
    /// Turn the preset into a scenario request.
    pub fn to_request(&self) -> ScenarioRequest {
        ScenarioRequest::new(self.display_name.clone(), self.policy_queries.clone())
    }
}

/// Thread-safe registry of scenario presets, seeded with builtins.
pub struct ScenarioPresetRegistry {
    presets: RwLock<HashMap<String, ScenarioPreset>>,
}

impl ScenarioPresetRegistry {
    /// Create a registry with the built-in presets.
    pub fn new() -> Self {
        let registry = Self {
            presets: RwLock::new(HashMap::new()),
        };
        registry.register_builtins();
        registry
    }

    /// Register a preset.
    ///
    /// # Errors
    /// Returns error if the preset is incomplete or its id is taken.
    pub fn register(&self, preset: ScenarioPreset) -> Result<(), String> {
        if preset.id.is_empty() {
            return Err("Preset ID is required".to_string());
        }
        if preset.display_name.is_empty() {
            return Err("Preset display name is required".to_string());
        }
        if preset.policy_queries.is_empty() {
            return Err("Preset must have at least one policy query".to_string());
        }

        let mut presets = self.presets.write().unwrap_or_else(|e| e.into_inner());
        if presets.contains_key(&preset.id) {
            return Err(format!("Preset '{}' already exists", preset.id));
        }

        presets.insert(preset.id.clone(), preset);
        Ok(())
    }

    /// Get a preset by ID.
    pub fn get(&self, id: &str) -> Option<ScenarioPreset> {
        self.presets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// List presets sorted by id, optionally filtered by tag.
    pub fn list(&self, tag: Option<&str>) -> Vec<ScenarioPreset> {
        let mut presets: Vec<_> = self
            .presets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|p| tag.map_or(true, |t| p.tags.iter().any(|pt| pt == t)))
            .cloned()
            .collect();
        presets.sort_by(|a, b| a.id.cmp(&b.id));
        presets
    }

    /// Get the number of registered presets.
    pub fn count(&self) -> usize {
        self.presets.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn register_builtins(&self) {
        for preset in builtin_presets() {
            let id = preset.id.clone();
            if let Err(e) = self.register(preset) {
                error!(preset = %id, error = %e, "Failed to register builtin preset");
            }
        }
    }
}

impl Default for ScenarioPresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn preset(id: &str, display_name: &str, description: &str, queries: &[&str], tags: &[&str]) -> ScenarioPreset {
    ScenarioPreset {
        id: id.to_string(),
        display_name: display_name.to_string(),
        description: description.to_string(),
        policy_queries: queries.iter().map(|q| q.to_string()).collect(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Built-in presets.
pub fn builtin_presets() -> Vec<ScenarioPreset> {
    vec![
        preset(
            "transport-restriction",
            "Transport restriction",
            "Vehicle emission standards and traffic restriction, as in Beijing's odd-even scheme.",
            &["How did vehicle restrictions reduce urban transport emissions?"],
            &["transport", "aqi"],
        ),
        preset(
            "coal-phase-down",
            "Coal phase-down",
            "Cut coal share in power generation.",
            &["What AQI gains followed coal power generation phase-down?"],
            &["energy", "co2"],
        ),
        preset(
            "combined-transition",
            "Combined transition",
            "Transport and power measures evaluated together; the first generated policy is applied.",
            &[
                "Combined effect of transport electrification and coal reduction",
                "Power generation decarbonisation outcomes",
            ],
            &["transport", "energy", "co2"],
        ),
    ]
}
