// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod archive;
pub mod config;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod records;
pub mod scheduler;
pub mod symbols;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{EnrichedNewsItem, EnrichmentGateway};
pub use crate::config::PipelineConfig;
pub use crate::hub::{publish, PublishReport};
pub use crate::pipeline::{Pipeline, PipelineSettings, RunSummary, Stage};
pub use crate::records::{EventEnvelope, NewsRecord, PriceRecord, Prediction};
pub use crate::symbols::resolve_extra_symbols;
