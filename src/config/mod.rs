use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub scraper: ScraperConfig,
    pub benchmark: BenchmarkConfig,
    pub storage: StorageConfig,
}

/// Listing-page scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Listing pagination depth: pages 2..=N are `<base_url>/N`.
    #[serde(default = "default_pages")]
    pub pages: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Crude-oil benchmark feed configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_oil_price_url")]
    pub oil_price_url: String,

    #[serde(default = "default_exchange_rate_url")]
    pub exchange_rate_url: String,

    /// Currency code looked up in the exchange-rate response.
    #[serde(default = "default_target_currency")]
    pub target_currency: String,

    /// Bearer token for the oil-price feed.
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://bensinpriser.nu/stationer/95/vastra-gotalands-lan/goteborg".to_string()
}
fn default_pages() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    800
}
fn default_jitter_ms() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    2
}
fn default_user_agent() -> String {
    "fuelwatch/0.1 (fuel price dashboard)".to_string()
}
fn default_oil_price_url() -> String {
    "https://api.oilpriceapi.com/v1/prices/latest".to_string()
}
fn default_exchange_rate_url() -> String {
    "https://api.exchangerate-api.com/v4/latest/USD".to_string()
}
fn default_target_currency() -> String {
    "SEK".to_string()
}
fn default_api_key() -> Option<String> {
    std::env::var("OILPRICE_API_KEY").ok()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/prices.duckdb")
}
fn default_true() -> bool {
    true
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("FUEL").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig {
                base_url: default_base_url(),
                pages: default_pages(),
                timeout_secs: default_timeout_secs(),
                request_delay_ms: default_request_delay_ms(),
                jitter_ms: default_jitter_ms(),
                max_retries: default_max_retries(),
                user_agent: default_user_agent(),
            },
            benchmark: BenchmarkConfig {
                oil_price_url: default_oil_price_url(),
                exchange_rate_url: default_exchange_rate_url(),
                target_currency: default_target_currency(),
                api_key: default_api_key(),
            },
            storage: StorageConfig {
                db_path: default_db_path(),
                run_migrations: true,
            },
        }
    }
}
