use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Bound on the remote completion call — one slow query must not starve
/// other schedules' timer tasks.
pub const RESEARCH_TIMEOUT_SECS: u64 = 8;
/// Bound on the fire-and-forget webhook delivery.
pub const WEBHOOK_TIMEOUT_SECS: u64 = 3;
/// Reconciliation poll cadence against the store.
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Top-level config (periscope.toml + PERISCOPE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriscopeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for PeriscopeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            research: ResearchConfig::default(),
            webhook: WebhookConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Remote completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// API key. Falls back to the PERPLEXITY_API_KEY env var when empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_research_base_url")]
    pub base_url: String,
    #[serde(default = "default_research_timeout")]
    pub timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_research_base_url(),
            timeout_secs: default_research_timeout(),
        }
    }
}

/// Outbound webhook settings. Deliveries are skipped entirely when `url`
/// is unset.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.periscope/periscope.db")
}
fn default_research_base_url() -> String {
    "https://api.perplexity.ai".to_string()
}
fn default_research_timeout() -> u64 {
    RESEARCH_TIMEOUT_SECS
}
fn default_webhook_timeout() -> u64 {
    WEBHOOK_TIMEOUT_SECS
}
fn default_poll_interval() -> u64 {
    POLL_INTERVAL_SECS
}

impl PeriscopeConfig {
    /// Load config from a TOML file with PERISCOPE_* env var overrides.
    ///
    /// Checks in order: explicit path argument, then
    /// `~/.periscope/periscope.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: PeriscopeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PERISCOPE_").split("_"))
            .extract()
            .map_err(|e| crate::error::PeriscopeError::Config(e.to_string()))?;

        if config.research.api_key.is_empty() {
            if let Ok(key) = std::env::var("PERPLEXITY_API_KEY") {
                config.research.api_key = key;
            }
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.periscope/periscope.toml")
}
