// src/records.rs
//! Normalized record shapes handed to the hub publisher.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Format of `ingested_at` (ISO-8601, UTC, second precision).
pub const INGESTED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    News,
    Price,
}

/// Market trend inferred for a news item. Price records are always `Neutral`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Prediction {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Prediction {
    pub const ALL: [&'static str; 3] = ["Positive", "Negative", "Neutral"];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsRecord {
    pub record_id: Uuid,
    pub data_type: DataType,
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    pub title: Option<String>,
    pub description: String,
    pub trend: Prediction,
    pub published_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRecord {
    pub record_id: Uuid,
    pub data_type: DataType,
    pub symbol: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub trend: Prediction,
    pub published_at: Option<String>,
    pub ingested_at: String,
    pub volume_24h: Option<f64>,
    pub percent_change_1h: Option<f64>,
    pub percent_change_24h: Option<f64>,
    pub percent_change_7d: Option<f64>,
    pub cmc_rank: Option<u32>,
}

/// One event as it travels to the hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EventEnvelope {
    News(NewsRecord),
    Price(PriceRecord),
}

impl EventEnvelope {
    pub fn record_id(&self) -> Uuid {
        match self {
            Self::News(r) => r.record_id,
            Self::Price(r) => r.record_id,
        }
    }

    /// Wire form: compact JSON bytes.
    pub fn to_wire(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl From<NewsRecord> for EventEnvelope {
    fn from(r: NewsRecord) -> Self {
        Self::News(r)
    }
}

impl From<PriceRecord> for EventEnvelope {
    fn from(r: PriceRecord) -> Self {
        Self::Price(r)
    }
}
