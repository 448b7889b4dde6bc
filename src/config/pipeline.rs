// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ai::AiConfig;
use crate::ingest::fetch::RetryPolicy;

const ENV_PATH: &str = "PIPELINE_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/pipeline.toml";

/// Symbols always queried for prices, independent of news content.
pub const DEFAULT_WATCHLIST: [&str; 15] = [
    "BTC", "ETH", "CMC20", "USDT", "BNB", "XRP", "USDC", "ADA", "SOL", "DOGE", "TRON", "SOLANA",
    "LINK", "DOT", "AVAX",
];

/// 1 MiB transport limit minus headroom for the REST batch framing.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024 - 2048;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Adds `public=true` to the query.
    pub public_only: bool,
    #[serde(skip)]
    pub auth_token: String,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cryptopanic.com/api/developer/v2/posts/".into(),
            timeout_secs: 10,
            public_only: false,
            auth_token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub watchlist: Vec<String>,
    pub convert: String,
    pub skip_invalid: bool,
    #[serde(skip)]
    pub api_key: String,
}

impl Default for PriceApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest".into(),
            timeout_secs: 10,
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            convert: "USD".into(),
            skip_invalid: true,
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 5,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            backoff: Duration::from_secs(self.backoff_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub news_hub: String,
    pub price_hub: String,
    pub max_batch_bytes: usize,
    pub sas_ttl_secs: u64,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub connection_string: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            news_hub: String::new(),
            price_hub: String::new(),
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            sas_ttl_secs: 3600,
            timeout_secs: 30,
            connection_string: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Loop with this period instead of running once.
    pub interval_secs: Option<u64>,
    /// Exit with status 2 when any stage degraded.
    pub strict_exit: bool,
    /// JSON-lines file every envelope is appended to before publishing.
    pub archive_path: Option<PathBuf>,
    /// Prometheus textfile written after each run.
    pub metrics_textfile: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub news: NewsApiConfig,
    pub price: PriceApiConfig,
    pub retry: RetryConfig,
    pub ai: AiConfig,
    pub hub: HubConfig,
    pub run: RunConfig,
}

impl PipelineConfig {
    /// Load tunables using env var + fallbacks, then overlay secrets from the environment:
    /// 1) $PIPELINE_CONFIG_PATH
    /// 2) config/pipeline.toml
    /// 3) built-in defaults
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    return Err(anyhow!("{ENV_PATH} points to non-existent path"));
                }
                Self::load_from(&pb)?
            }
            Err(_) => {
                let p = PathBuf::from(DEFAULT_PATH);
                if p.exists() {
                    Self::load_from(&p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing pipeline config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: PipelineConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    /// Overlay secrets and hub names. Missing secrets are logged, not fatal:
    /// the affected stage degrades at run time.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        match get("CRYPTOPANIC_TOKEN") {
            Some(v) => self.news.auth_token = v,
            None => tracing::warn!("CRYPTOPANIC_TOKEN not set; news fetch will fail"),
        }
        match get("COINMARKETCAP_API_KEY") {
            Some(v) => self.price.api_key = v,
            None => tracing::warn!("COINMARKETCAP_API_KEY not set; price fetch will fail"),
        }
        match get("GEMINI_API_KEY") {
            Some(v) => self.ai.api_key = v,
            None if self.ai.enabled => {
                tracing::warn!("GEMINI_API_KEY not set; enrichment will degrade to empty")
            }
            None => {}
        }
        if let Some(v) = get("EVENTHUB_CONNECTION_STRING") {
            self.hub.connection_string = v;
        }
        if let Some(v) = get("NEWS_EVENTHUB_NAME") {
            self.hub.news_hub = v;
        }
        if let Some(v) = get("PRICE_EVENTHUB_NAME") {
            self.hub.price_hub = v;
        }
        if let Some(v) = get("METRICS_TEXTFILE_PATH") {
            self.run.metrics_textfile = Some(PathBuf::from(v));
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.run
            .interval_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }
}
