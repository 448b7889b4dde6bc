//! AI adapter: model abstraction + enrichment gateway.
//!
//! The gateway turns ordered news inputs into `EnrichedNewsItem`s through a
//! structured-output model. It never retries: a failed call is one
//! `EnrichmentError`, which the orchestrator degrades to an empty list.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyze::schema::{analysis_schema, parse_analysis, system_prompt, SCHEMA_NAME};
use crate::analyze::EnrichedNewsItem;
use crate::config::{AiConfig, EnrichmentMode};
use crate::error::EnrichmentError;
use crate::normalize::NewsInput;
use crate::records::Prediction;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Everything a model needs for one structured call.
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    pub system: String,
    /// JSON array of input tuples.
    pub user: String,
    pub schema: Value,
}

/// Low-level model: does the remote call and returns the raw message content.
pub trait AnalysisModel: Send + Sync {
    fn complete<'a>(
        &'a self,
        req: &'a EnrichmentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynModel = Arc<dyn AnalysisModel>;

/// Factory: build a model according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns the deterministic echo model.
/// * Else if `config.enabled==false`, returns a disabled model.
/// * Else the OpenAI-compatible HTTP model.
pub fn build_model(config: &AiConfig) -> DynModel {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(EchoModel);
    }
    if !config.enabled {
        return Arc::new(DisabledModel);
    }
    Arc::new(OpenAiCompatModel::new(config))
}

// ------------------------------------------------------------
// Gateway
// ------------------------------------------------------------

pub struct EnrichmentGateway {
    model: DynModel,
    mode: EnrichmentMode,
}

impl EnrichmentGateway {
    pub fn new(model: DynModel, mode: EnrichmentMode) -> Self {
        Self { model, mode }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(build_model(config), config.mode)
    }

    pub fn provider_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn build_request(&self, inputs: &[NewsInput]) -> Result<EnrichmentRequest, EnrichmentError> {
        let tuples: Vec<Vec<&str>> = inputs.iter().map(|i| i.to_tuple(self.mode)).collect();
        let user = serde_json::to_string(&tuples)
            .map_err(|e| EnrichmentError::Transport(format!("encoding inputs: {e}")))?;
        Ok(EnrichmentRequest {
            system: system_prompt(self.mode),
            user,
            schema: analysis_schema(self.mode),
        })
    }

    /// One model call. Items that did not copy their timestamp (and, in
    /// title-echo mode, their title) verbatim from an input are discarded.
    pub async fn try_enrich(
        &self,
        inputs: &[NewsInput],
    ) -> Result<Vec<EnrichedNewsItem>, EnrichmentError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let req = self.build_request(inputs)?;
        tracing::info!(
            provider = self.model.name(),
            inputs = inputs.len(),
            "requesting enrichment"
        );

        let content = self.model.complete(&req).await?;
        let items = parse_analysis(&content)?;
        let returned = items.len();
        let kept = retain_verbatim(items, inputs, self.mode);
        if kept.len() < returned {
            tracing::warn!(
                dropped = returned - kept.len(),
                "discarded enrichment items with altered copied fields"
            );
        }
        counter!("pipeline_enriched_items_total").increment(kept.len() as u64);
        Ok(kept)
    }
}

fn retain_verbatim(
    items: Vec<EnrichedNewsItem>,
    inputs: &[NewsInput],
    mode: EnrichmentMode,
) -> Vec<EnrichedNewsItem> {
    match mode {
        EnrichmentMode::DescriptionOnly => {
            let stamps: HashSet<&str> = inputs.iter().map(|i| i.published_at.as_str()).collect();
            items
                .into_iter()
                .filter(|it| stamps.contains(it.published_at.as_str()))
                .collect()
        }
        EnrichmentMode::TitleEcho => {
            let pairs: HashSet<(&str, &str)> = inputs
                .iter()
                .map(|i| {
                    (
                        i.title.as_deref().unwrap_or_default(),
                        i.published_at.as_str(),
                    )
                })
                .collect();
            items
                .into_iter()
                .filter(|it| {
                    let title = it.title.as_deref().unwrap_or_default();
                    pairs.contains(&(title, it.published_at.as_str()))
                })
                .collect()
        }
    }
}

// ------------------------------------------------------------
// Concrete models
// ------------------------------------------------------------

/// Chat Completions API with `response_format: json_schema`. Works with
/// OpenAI and Gemini's OpenAI-compatible endpoint.
pub struct OpenAiCompatModel {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatModel {
    pub fn new(config: &AiConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-pulse/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a Value,
    strict: bool,
}
#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    json_schema: JsonSchemaFormat<'a>,
}
#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    response_format: ResponseFormat<'a>,
}
#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<Choice>,
}
#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}
#[derive(Deserialize)]
struct ChoiceMsg {
    content: Option<String>,
}

impl AnalysisModel for OpenAiCompatModel {
    fn complete<'a>(
        &'a self,
        req: &'a EnrichmentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(EnrichmentError::Transport("missing API key".into()));
            }

            let body = ChatReq {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: &req.system,
                    },
                    Msg {
                        role: "user",
                        content: &req.user,
                    },
                ],
                response_format: ResponseFormat {
                    kind: "json_schema",
                    json_schema: JsonSchemaFormat {
                        name: SCHEMA_NAME,
                        schema: &req.schema,
                        strict: true,
                    },
                },
            };

            let resp = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| EnrichmentError::Transport(e.to_string()))?;

            if !resp.status().is_success() {
                return Err(EnrichmentError::Status(resp.status().as_u16()));
            }
            let parsed: ChatResp = resp
                .json()
                .await
                .map_err(|e| EnrichmentError::Transport(format!("decoding response: {e}")))?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|c| !c.trim().is_empty())
                .ok_or(EnrichmentError::EmptyResponse)
        })
    }

    fn name(&self) -> &'static str {
        "openai-compat"
    }
}

/// Always fails with `Disabled`; used when AI is switched off.
pub struct DisabledModel;

impl AnalysisModel for DisabledModel {
    fn complete<'a>(
        &'a self,
        _req: &'a EnrichmentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>> {
        Box::pin(async { Err(EnrichmentError::Disabled) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Local stand-in for dry runs: one Neutral `N/A` item per input tuple,
/// with title and timestamp echoed.
pub struct EchoModel;

impl AnalysisModel for EchoModel {
    fn complete<'a>(
        &'a self,
        req: &'a EnrichmentRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>> {
        Box::pin(async move {
            let tuples: Vec<Vec<String>> = serde_json::from_str(&req.user)
                .map_err(|e| EnrichmentError::InvalidOutput(e.to_string()))?;
            let items: Vec<EnrichedNewsItem> = tuples
                .into_iter()
                .filter_map(|mut t| {
                    let published_at = t.pop()?;
                    let description = t.pop()?;
                    Some(EnrichedNewsItem {
                        reasoning: Some("mock".into()),
                        symbol: "N/A".into(),
                        name: "Unknown".into(),
                        title: t.pop(),
                        description,
                        prediction: Prediction::Neutral,
                        published_at,
                    })
                })
                .collect();
            serde_json::to_string(&serde_json::json!({ "news_analysis": items }))
                .map_err(|e| EnrichmentError::InvalidOutput(e.to_string()))
        })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns canned content and remembers the last request.
    struct CannedModel {
        content: Result<String, EnrichmentError>,
        seen: Mutex<Option<EnrichmentRequest>>,
    }

    impl CannedModel {
        fn ok(s: &str) -> Self {
            Self {
                content: Ok(s.to_string()),
                seen: Mutex::new(None),
            }
        }
    }

    impl AnalysisModel for CannedModel {
        fn complete<'a>(
            &'a self,
            req: &'a EnrichmentRequest,
        ) -> Pin<Box<dyn Future<Output = Result<String, EnrichmentError>> + Send + 'a>> {
            *self.seen.lock().unwrap() = Some(req.clone());
            let out = match &self.content {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(EnrichmentError::Status(500)),
            };
            Box::pin(async move { out })
        }
        fn name(&self) -> &'static str {
            "canned"
        }
    }

    fn input(title: &str, desc: &str, ts: &str) -> NewsInput {
        NewsInput {
            title: Some(title.into()),
            description: desc.into(),
            published_at: ts.into(),
        }
    }

    #[tokio::test]
    async fn multi_coin_item_fans_out_with_shared_timestamp() {
        let model = Arc::new(CannedModel::ok(
            r#"{"news_analysis": [
                {"reasoning": "r", "symbol": "BTC", "name": "Bitcoin", "description": "up",
                 "prediction": "Positive", "published_at": "T1"},
                {"reasoning": "r", "symbol": "ETH", "name": "Ethereum", "description": "up",
                 "prediction": "Positive", "published_at": "T1"}
            ]}"#,
        ));
        let gw = EnrichmentGateway::new(model.clone(), EnrichmentMode::DescriptionOnly);
        let items = gw
            .try_enrich(&[input("ignored", "BTC and ETH rally", "T1")])
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.published_at == "T1"));

        let seen = model.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.user, r#"[["BTC and ETH rally","T1"]]"#);
    }

    #[tokio::test]
    async fn synthesized_timestamps_are_discarded() {
        let model = Arc::new(CannedModel::ok(
            r#"{"news_analysis": [
                {"symbol": "BTC", "name": "Bitcoin", "description": "d",
                 "prediction": "Neutral", "published_at": "2024-01-01T00:00:00Z"},
                {"symbol": "SOL", "name": "Solana", "description": "d",
                 "prediction": "Neutral", "published_at": "2024-01-01 00:00"}
            ]}"#,
        ));
        let gw = EnrichmentGateway::new(model, EnrichmentMode::DescriptionOnly);
        let items = gw
            .try_enrich(&[input("t", "d", "2024-01-01T00:00:00Z")])
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].symbol, "BTC");
    }

    #[tokio::test]
    async fn title_mode_requires_exact_title_echo() {
        let model = Arc::new(CannedModel::ok(
            r#"{"news_analysis": [
                {"symbol": "BTC", "name": "Bitcoin", "title": "Bitcoin surges", "description": "d",
                 "prediction": "Positive", "published_at": "T"},
                {"symbol": "BTC", "name": "Bitcoin", "title": "Bitcoin Surges!", "description": "d",
                 "prediction": "Positive", "published_at": "T"}
            ]}"#,
        ));
        let gw = EnrichmentGateway::new(model.clone(), EnrichmentMode::TitleEcho);
        let items = gw
            .try_enrich(&[input("Bitcoin surges", "BTC hits new high", "T")])
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Bitcoin surges"));

        let seen = model.seen.lock().unwrap().clone().unwrap();
        assert!(seen.user.starts_with(r#"[["Bitcoin surges","BTC hits new high","T"]"#));
    }

    #[tokio::test]
    async fn failures_surface_as_typed_errors() {
        let model = Arc::new(CannedModel {
            content: Err(EnrichmentError::Status(500)),
            seen: Mutex::new(None),
        });
        let gw = EnrichmentGateway::new(model, EnrichmentMode::TitleEcho);
        assert!(matches!(
            gw.try_enrich(&[input("a", "b", "c")]).await,
            Err(EnrichmentError::Status(500))
        ));

        let gw = EnrichmentGateway::new(
            Arc::new(CannedModel::ok("not json")),
            EnrichmentMode::TitleEcho,
        );
        assert!(matches!(
            gw.try_enrich(&[input("a", "b", "c")]).await,
            Err(EnrichmentError::InvalidOutput(_))
        ));

        let gw = EnrichmentGateway::new(Arc::new(DisabledModel), EnrichmentMode::TitleEcho);
        assert!(matches!(
            gw.try_enrich(&[input("a", "b", "c")]).await,
            Err(EnrichmentError::Disabled)
        ));
    }

    #[tokio::test]
    async fn empty_input_skips_the_model() {
        let model = Arc::new(CannedModel::ok("never read"));
        let gw = EnrichmentGateway::new(model.clone(), EnrichmentMode::TitleEcho);
        assert!(gw.try_enrich(&[]).await.unwrap().is_empty());
        assert!(model.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn echo_model_round_trips_through_gateway() {
        let gw = EnrichmentGateway::new(Arc::new(EchoModel), EnrichmentMode::TitleEcho);
        let items = gw
            .try_enrich(&[input("Headline", "Body", "2024-05-05T05:05:05Z")])
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].symbol, "N/A");
        assert_eq!(items[0].title.as_deref(), Some("Headline"));
        assert_eq!(items[0].published_at, "2024-05-05T05:05:05Z");
    }
}
