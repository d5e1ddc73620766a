//! TripPlanner configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hard ceiling on reasoning-loop iterations regardless of configuration
pub const MAX_AGENT_ITERATIONS: u32 = 15;

/// Upper bound on knowledge search retries
pub const MAX_KNOWLEDGE_RETRIES: u32 = 5;

/// Main TripPlanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Reasoning-acting loop limits
    pub agent: AgentConfig,

    /// Planning workflow options
    pub planning: PlanningConfig,

    /// Knowledge retrieval options
    pub knowledge: KnowledgeConfig,

    /// Geocoding and places providers
    pub geo: GeoConfig,

    /// Session memory options
    pub session: SessionConfig,

    /// Where finalized plans are written
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the LLM API key environment variable is set.
    pub fn validate(&self) -> Result<()> {
        debug!(api_key_env = %self.llm.api_key_env, "Config::validate: called");
        if self.llm.api_key().is_none() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tripplanner.yml
        let local_config = PathBuf::from(".tripplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tripplanner/tripplanner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripplanner").join("tripplanner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".tripplanner.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("tripplanner").join("tripplanner.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "openai-compatible")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        debug!(api_key_env = %self.api_key_env, "LlmConfig::api_key: called");
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 60_000,
            temperature: Some(0.7),
        }
    }
}

/// Reasoning-acting loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum think/act/observe iterations (capped at 15)
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Steps shown to the model in each prompt
    #[serde(rename = "history-window")]
    pub history_window: usize,

    /// Identical consecutive actions that count as a loop
    #[serde(rename = "loop-detection-threshold")]
    pub loop_detection_threshold: usize,

    /// Wall-clock budget per reasoning call
    #[serde(rename = "llm-timeout-ms")]
    pub llm_timeout_ms: u64,

    /// Wall-clock budget per capability invocation
    #[serde(rename = "capability-timeout-ms")]
    pub capability_timeout_ms: u64,

    /// Thoughts longer than this are truncated in prompts
    #[serde(rename = "thought-preview-chars")]
    pub thought_preview_chars: usize,
}

impl AgentConfig {
    /// Iteration bound actually enforced
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations.clamp(1, MAX_AGENT_ITERATIONS)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }

    pub fn capability_timeout(&self) -> Duration {
        Duration::from_millis(self.capability_timeout_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            history_window: 3,
            loop_detection_threshold: 3,
            llm_timeout_ms: 20_000,
            capability_timeout_ms: 30_000,
            thought_preview_chars: 100,
        }
    }
}

/// Planning workflow options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Reflection passes before finalizing regardless of approval
    #[serde(rename = "max-reflections")]
    pub max_reflections: u32,

    /// Ask the model for a natural-language critique during reflection
    #[serde(rename = "holistic-review")]
    pub holistic_review: bool,

    /// Insert the route optimization node before reflection
    #[serde(rename = "route-optimization")]
    pub route_optimization: bool,

    /// Attractions requested per trip day from knowledge search
    #[serde(rename = "attractions-per-day")]
    pub attractions_per_day: u32,

    /// Safety bound on executed graph nodes
    #[serde(rename = "max-graph-steps")]
    pub max_graph_steps: u32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_reflections: 3,
            holistic_review: true,
            route_optimization: false,
            attractions_per_day: 4,
            max_graph_steps: 50,
        }
    }
}

/// Knowledge retrieval options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Results must score strictly above this
    #[serde(rename = "min-score")]
    pub min_score: f64,

    /// Upper bound on results per search
    #[serde(rename = "max-results")]
    pub max_results: usize,

    /// Retries after the first failed attempt
    pub retries: u32,

    /// Wall-clock budget per attempt
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// YAML or JSON attraction catalog backing the knowledge search
    #[serde(rename = "catalog-path")]
    pub catalog_path: Option<PathBuf>,
}

impl KnowledgeConfig {
    /// Retry count actually used
    pub fn effective_retries(&self) -> u32 {
        self.retries.min(MAX_KNOWLEDGE_RETRIES)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            min_score: 0.7,
            max_results: 20,
            retries: 2,
            timeout_ms: 10_000,
            catalog_path: None,
        }
    }
}

/// Geocoding and places providers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    /// Nominatim-compatible search endpoint; empty disables geocoding
    #[serde(rename = "geocoder-url")]
    pub geocoder_url: String,

    /// Geoapify-compatible places endpoint
    #[serde(rename = "places-url")]
    pub places_url: String,

    /// Environment variable containing the places API key
    #[serde(rename = "places-api-key-env")]
    pub places_api_key_env: String,

    /// Default nearby search radius
    #[serde(rename = "nearby-radius-km")]
    pub nearby_radius_km: f64,

    /// Maximum nearby results
    #[serde(rename = "nearby-limit")]
    pub nearby_limit: usize,

    /// User-Agent sent to public geocoders
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// HTTP timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl GeoConfig {
    pub fn places_api_key(&self) -> Option<String> {
        std::env::var(&self.places_api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            geocoder_url: "https://nominatim.openstreetmap.org/search".to_string(),
            places_url: "https://api.geoapify.com/v2/places".to_string(),
            places_api_key_env: "GEOAPIFY_API_KEY".to_string(),
            nearby_radius_km: 1.0,
            nearby_limit: 10,
            user_agent: concat!("tripplanner/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Session memory options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is evicted
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,

    /// Messages kept per session
    #[serde(rename = "max-messages")]
    pub max_messages: usize,

    /// How often the sweeper runs
    #[serde(rename = "sweep-interval-secs")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_messages: 20,
            sweep_interval_secs: 300,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for finalized plans (default: data dir)
    #[serde(rename = "plans-dir")]
    pub plans_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved plans directory
    pub fn plans_dir(&self) -> PathBuf {
        self.plans_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tripplanner")
                .join("plans")
        })
    }
}
