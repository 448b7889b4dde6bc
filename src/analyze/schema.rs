// src/analyze/schema.rs
//! Output contract for the `crypto_analysis` structured response.
//!
//! The JSON schema is handed to the model as `response_format`; the same
//! contract is enforced again on our side when the content is parsed.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::analyze::EnrichedNewsItem;
use crate::config::EnrichmentMode;
use crate::error::EnrichmentError;
use crate::records::Prediction;

pub const SCHEMA_NAME: &str = "crypto_analysis";

#[derive(Debug, Deserialize)]
struct AnalysisResult {
    news_analysis: Vec<EnrichedNewsItem>,
}

/// JSON schema of `{"news_analysis": [EnrichedNewsItem]}` for the given mode.
pub fn analysis_schema(mode: EnrichmentMode) -> Value {
    let mut properties = json!({
        "reasoning": {
            "type": "string",
            "description": "Briefly explain why you chose the prediction trend."
        },
        "symbol": {
            "type": "string",
            "description": "The ticker symbol (e.g., BTC). Use 'N/A' if not found."
        },
        "name": {
            "type": "string",
            "description": "The full name of the cryptocurrency."
        },
        "description": {
            "type": "string",
            "description": "A brief summary of the specific news event."
        },
        "prediction": {
            "type": "string",
            "enum": Prediction::ALL,
            "description": "The inferred market trend."
        },
        "published_at": {
            "type": "string",
            "description": "The exact timestamp string provided in the input."
        }
    });
    let mut required = vec![
        "reasoning",
        "symbol",
        "name",
        "description",
        "prediction",
        "published_at",
    ];

    if mode == EnrichmentMode::TitleEcho {
        properties["title"] = json!({
            "type": "string",
            "description": "The EXACT news headline from the input. Do not alter."
        });
        required.insert(3, "title");
    }

    json!({
        "type": "object",
        "properties": {
            "news_analysis": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false
                }
            }
        },
        "required": ["news_analysis"],
        "additionalProperties": false
    })
}

pub fn system_prompt(mode: EnrichmentMode) -> String {
    let (shape, copy_rule) = match mode {
        EnrichmentMode::DescriptionOnly => (
            "`[Description, Timestamp]`",
            "You must COPY the 'Timestamp' EXACTLY as it appears in the input into 'published_at'.",
        ),
        EnrichmentMode::TitleEcho => (
            "`[Title, Description, Timestamp]`",
            "You must COPY the 'Title' and 'Timestamp' EXACTLY as they appear in the input into 'title' and 'published_at'.",
        ),
    };
    format!(
        "You are a crypto market analyst.\n\
         The user will provide a JSON list of news items: {shape}.\n\
         \n\
         Your Task:\n\
         1. Reasoning: First, fill the 'reasoning' field with your analysis of the sentiment.\n\
         2. Extraction: Extract Name, Symbol, and Trend (Positive, Negative, Neutral). Use 'N/A' as the symbol if none applies.\n\
         3. Copying: {copy_rule} Never alter copied fields.\n\
         4. Splitting: If one item mentions several coins, output one entry per coin, all sharing that item's timestamp.\n\
         5. Ignore non-crypto news."
    )
}

/// Parse model content into items. Tolerates a surrounding markdown code fence.
pub fn parse_analysis(content: &str) -> Result<Vec<EnrichedNewsItem>, EnrichmentError> {
    let clean = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if clean.is_empty() {
        return Err(EnrichmentError::EmptyResponse);
    }
    let parsed: AnalysisResult = serde_json::from_str(clean)
        .map_err(|e| EnrichmentError::InvalidOutput(e.to_string()))?;
    Ok(parsed.news_analysis)
}
