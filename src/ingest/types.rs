// src/ingest/types.rs
use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::FetchError;

/// News post as returned by the news provider. Everything is optional; the
/// normalizer decides what is required.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawNewsPost {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub source: Option<RawNewsSource>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawNewsSource {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsResponse {
    #[serde(default)]
    pub results: Vec<RawNewsPost>,
}

/// Price provider response, keyed by symbol.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceResponse {
    #[serde(default)]
    pub data: BTreeMap<String, RawPriceQuote>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RawPriceQuote {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cmc_rank: Option<u32>,
    #[serde(default)]
    pub quote: HashMap<String, QuoteBlock>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct QuoteBlock {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub volume_24h: Option<f64>,
    #[serde(default)]
    pub percent_change_1h: Option<f64>,
    #[serde(default)]
    pub percent_change_24h: Option<f64>,
    #[serde(default)]
    pub percent_change_7d: Option<f64>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<RawNewsPost>, FetchError>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    /// `symbols` is the full comma-separated query term.
    async fn fetch_quotes(&self, symbols: &str) -> Result<PriceResponse, FetchError>;
    fn name(&self) -> &'static str;
}
