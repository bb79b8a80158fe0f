//! Configuration management for sensad.
//!
//! Loads settings from /etc/sensa/config.toml (or an explicit path) and
//! applies `SENSA_*` environment overrides on top. Secrets such as the API
//! key and signer seeds are normally supplied through the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/sensa/config.toml";

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "SENSA_CONFIG";

/// Prefix of per-account signer seed variables (`SENSA_ACCOUNT_PRIMARY=<hex>`)
pub const ACCOUNT_ENV_PREFIX: &str = "SENSA_ACCOUNT_";

/// Inbound HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret expected in the X-API-Key header. Empty rejects everything.
    #[serde(default)]
    pub api_key: String,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            api_key: String::new(),
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Context window passed to the model as num_ctx
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    /// How long the model stays loaded after a request
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_num_ctx() -> u32 {
    25 * 1024
}

fn default_keep_alive() -> String {
    "24h".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            keep_alive: default_keep_alive(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Payment-gated sensor resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Base URL of the sensor API, without trailing slash
    #[serde(default = "default_resource_url")]
    pub base_url: String,

    #[serde(default = "default_latest_path")]
    pub latest_path: String,

    #[serde(default = "default_window_path")]
    pub window_path: String,

    #[serde(default = "default_resource_timeout")]
    pub timeout_secs: u64,
}

fn default_resource_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_latest_path() -> String {
    "/api/sensors/latest".to_string()
}

fn default_window_path() -> String {
    "/api/sensors/latestTop".to_string()
}

fn default_resource_timeout() -> u64 {
    30
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_resource_url(),
            latest_path: default_latest_path(),
            window_path: default_window_path(),
            timeout_secs: default_resource_timeout(),
        }
    }
}

impl ResourceConfig {
    pub fn latest_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.latest_path)
    }

    pub fn window_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.window_path)
    }
}

/// Payer accounts and their assignment to capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Account name -> hex-encoded 32 byte signing seed
    #[serde(default)]
    pub accounts: HashMap<String, String>,

    /// Capability name -> account name
    #[serde(default = "default_capability_accounts")]
    pub capability_accounts: HashMap<String, String>,

    /// Account used by capabilities without an explicit assignment
    #[serde(default = "default_account")]
    pub default_account: String,
}

fn default_account() -> String {
    "primary".to_string()
}

fn default_capability_accounts() -> HashMap<String, String> {
    HashMap::from([
        ("fetchIoTSensorData".to_string(), "primary".to_string()),
        ("fetchIoTSensorTop10Analysis".to_string(), "secondary".to_string()),
    ])
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            capability_accounts: default_capability_accounts(),
            default_account: default_account(),
        }
    }
}

/// Liveness probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,

    /// Public URL of this daemon's health route
    #[serde(default = "default_health_url")]
    pub url: String,

    #[serde(default = "default_health_interval")]
    pub interval_secs: u64,
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_url() -> String {
    "http://127.0.0.1:8000/".to_string()
}

fn default_health_interval() -> u64 {
    30 * 60
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            url: default_health_url(),
            interval_secs: default_health_interval(),
        }
    }
}

/// Conversation store limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
}

fn default_max_threads() -> usize {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_threads: default_max_threads(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub resource: ResourceConfig,

    #[serde(default)]
    pub payment: PaymentConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Load config from an explicit path, `SENSA_CONFIG`, or the system path,
    /// then apply environment overrides. A missing file falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(Into::into))
            .unwrap_or_else(|| CONFIG_PATH.into());

        let mut config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            warn!("Config not found at {}, using defaults", path.display());
            Config::default()
        };

        config.apply_env_overrides(std::env::vars());
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `SENSA_*` overrides from the given variables
    pub fn apply_env_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "SENSA_API_KEY" => self.server.api_key = value,
                "SENSA_PORT" => match value.parse() {
                    Ok(port) => self.server.port = port,
                    Err(_) => warn!("Ignoring invalid SENSA_PORT: {}", value),
                },
                "SENSA_RESOURCE_URL" => self.resource.base_url = value,
                "SENSA_LLM_ENDPOINT" => self.llm.endpoint = value,
                "SENSA_LLM_MODEL" => self.llm.model = value,
                "SENSA_HEALTH_URL" => self.health.url = value,
                _ => {
                    if let Some(account) = key.strip_prefix(ACCOUNT_ENV_PREFIX) {
                        if !account.is_empty() {
                            self.payment.accounts.insert(account.to_lowercase(), value);
                        }
                    }
                }
            }
        }
    }
}
