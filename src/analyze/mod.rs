// src/analyze/mod.rs
//! AI enrichment: structured sentiment/entity extraction from news text.

pub mod ai_adapter;
pub mod schema;

use serde::{Deserialize, Serialize};

use crate::records::Prediction;

pub use ai_adapter::{build_model, AnalysisModel, DynModel, EnrichmentGateway, EnrichmentRequest};

/// One coin mentioned by one news input, as returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedNewsItem {
    #[serde(default)]
    pub reasoning: Option<String>,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    pub prediction: Prediction,
    /// Copied from the input tuple, never generated.
    pub published_at: String,
}
