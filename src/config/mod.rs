use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub policy_service: PolicyServiceConfig,
    pub backends: BackendConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// External policy service configuration
#[derive(Debug, Clone, Default)]
pub struct PolicyServiceConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Which implementation backs policy generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorBackend {
    /// Call the external generation endpoint.
    Remote,
    /// Map query keywords to mutations in-process.
    Keyword,
}

/// Which implementation backs policy application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplierBackend {
    /// Run the embedded engine.
    Local,
    /// Call the external application endpoint.
    Remote,
}

/// Backend selection
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub generator: GeneratorBackend,
    pub applier: ApplierBackend,
}

/// Propagation and impact analysis parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of accumulate-then-overwrite rounds per propagation.
    pub rounds: usize,
    pub co2_node: String,
    pub aqi_node: String,
    /// Length of the ranked cascade list.
    pub cascade_top_n: usize,
    /// Optional baseline graph file replacing the compiled-in topology.
    pub baseline_path: Option<PathBuf>,
    /// Maximum number of undo snapshots kept per session.
    pub history_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let policy_service = PolicyServiceConfig {
            base_url: non_empty_var("POLICY_SERVICE_URL"),
            api_key: non_empty_var("POLICY_SERVICE_API_KEY"),
        };

        let generator = match non_empty_var("POLICY_GENERATOR")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("remote") => GeneratorBackend::Remote,
            Some("keyword") => GeneratorBackend::Keyword,
            None if policy_service.base_url.is_some() => GeneratorBackend::Remote,
            None => GeneratorBackend::Keyword,
            Some(other) => {
                return Err(AppError::Config {
                    message: format!("Unknown POLICY_GENERATOR: {}", other),
                })
            }
        };

        let applier = match non_empty_var("POLICY_APPLIER")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            None | Some("local") => ApplierBackend::Local,
            Some("remote") => ApplierBackend::Remote,
            Some(other) => {
                return Err(AppError::Config {
                    message: format!("Unknown POLICY_APPLIER: {}", other),
                })
            }
        };

        let backends = BackendConfig { generator, applier };
        backends.validate(&policy_service)?;

        let simulation = SimulationConfig {
            rounds: parse_var("SIMULATION_ROUNDS", 6),
            co2_node: env::var("CO2_NODE_ID").unwrap_or_else(|_| "co2".to_string()),
            aqi_node: env::var("AQI_NODE_ID").unwrap_or_else(|_| "aqi".to_string()),
            cascade_top_n: parse_var("CASCADE_TOP_N", 10),
            baseline_path: non_empty_var("GRAPH_BASELINE_PATH").map(PathBuf::from),
            history_limit: parse_var("HISTORY_LIMIT", 32),
        };

        if simulation.rounds == 0 {
            return Err(AppError::Config {
                message: "SIMULATION_ROUNDS must be at least 1".to_string(),
            });
        }

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS", 30000),
            max_retries: parse_var("MAX_RETRIES", 3),
            retry_delay_ms: parse_var("RETRY_DELAY_MS", 1000),
        };

        Ok(Config {
            policy_service,
            backends,
            simulation,
            logging,
            request,
        })
    }
}

impl BackendConfig {
    fn validate(&self, service: &PolicyServiceConfig) -> Result<(), AppError> {
        let needs_url =
            self.generator == GeneratorBackend::Remote || self.applier == ApplierBackend::Remote;
        if needs_url && service.base_url.is_none() {
            return Err(AppError::Config {
                message: "POLICY_SERVICE_URL is required for remote backends".to_string(),
            });
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rounds: 6,
            co2_node: "co2".to_string(),
            aqi_node: "aqi".to_string(),
            cascade_top_n: 10,
            baseline_path: None,
            history_limit: 32,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorBackend::Keyword,
            applier: ApplierBackend::Local,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_service: PolicyServiceConfig::default(),
            backends: BackendConfig::default(),
            simulation: SimulationConfig::default(),
            logging: LoggingConfig::default(),
            request: RequestConfig::default(),
        }
    }
}
