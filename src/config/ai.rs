// src/config/ai.rs
use serde::{Deserialize, Serialize};

pub const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const DEFAULT_AI_MODEL: &str = "gemini-2.5-flash";

fn default_enabled() -> bool {
    true
}
fn default_base_url() -> String {
    DEFAULT_AI_BASE_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_AI_MODEL.to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

/// Which tuple shape is sent to the model and which fields it must echo back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMode {
    /// `[description, timestamp]`; the model echoes the timestamp.
    DescriptionOnly,
    /// `[title, description, timestamp]`; the model echoes title and timestamp.
    #[default]
    TitleEcho,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// OpenAI-compatible base URL (Gemini's compatibility endpoint by default).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub mode: EnrichmentMode,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Filled from GEMINI_API_KEY.
    #[serde(skip)]
    pub api_key: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_base_url(),
            model: default_model(),
            mode: EnrichmentMode::default(),
            timeout_secs: default_timeout_secs(),
            api_key: String::new(),
        }
    }
}

impl AiConfig {
    /// Chat completions URL derived from `base_url`, tolerant of a missing trailing slash.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
