use dropflow_core::{Capability, VendorProfile};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub quotes: QuoteSettings,
    #[serde(default)]
    pub vendors: Vec<VendorSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// When unset the engine runs on in-memory stores.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrchestratorSettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_watchdog_interval_seconds")]
    pub watchdog_interval_seconds: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            submit_timeout_ms: default_submit_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            watchdog_interval_seconds: default_watchdog_interval_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    #[serde(default = "default_sync_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_seconds: default_sync_interval_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuoteSettings {
    #[serde(default = "default_quote_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QuoteSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_quote_timeout_ms(),
        }
    }
}

/// One external vendor, injected into its adapter at startup. Credentials and
/// base URLs live here, never in the orchestrator.
#[derive(Debug, Deserialize, Clone)]
pub struct VendorSettings {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_vendor_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    pub capabilities: Vec<Capability>,
}

impl VendorSettings {
    pub fn profile(&self) -> VendorProfile {
        VendorProfile {
            vendor_id: self.id.clone(),
            display_name: self.display_name.clone(),
            enabled: self.enabled,
            capabilities: self.capabilities.clone(),
            timeout_ms: self.timeout_ms,
            rate_limit_per_minute: self.rate_limit_per_minute,
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_submit_timeout_ms() -> u64 {
    10_000
}
fn default_backoff_base_ms() -> u64 {
    200
}
fn default_backoff_cap_ms() -> u64 {
    5_000
}
fn default_watchdog_interval_seconds() -> u64 {
    30
}
fn default_sync_interval_seconds() -> u64 {
    900
}
fn default_quote_timeout_ms() -> u64 {
    2_000
}
fn default_enabled() -> bool {
    true
}
fn default_vendor_timeout_ms() -> u64 {
    5_000
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // E.g. `DROPFLOW__SERVER__PORT=8080`
            .add_source(config::Environment::with_prefix("DROPFLOW").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
