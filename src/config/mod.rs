pub mod ai;
pub mod pipeline;

pub use ai::{AiConfig, EnrichmentMode};
pub use pipeline::{HubConfig, NewsApiConfig, PipelineConfig, PriceApiConfig, RunConfig};
