// src/ingest/providers/coinmarketcap.rs
use async_trait::async_trait;
use metrics::histogram;

use crate::config::PriceApiConfig;
use crate::error::FetchError;
use crate::ingest::fetch::{FetchClient, RetryPolicy};
use crate::ingest::types::{PriceResponse, PriceSource};

/// CoinMarketCap `quotes/latest`, queried by comma-separated symbols.
pub struct CoinMarketCapProvider {
    client: FetchClient,
    url: String,
    api_key: String,
    convert: String,
    skip_invalid: bool,
}

impl CoinMarketCapProvider {
    pub fn new(cfg: &PriceApiConfig, policy: RetryPolicy) -> Result<Self, FetchError> {
        let timeout = std::time::Duration::from_secs(cfg.timeout_secs.max(1));
        Ok(Self {
            client: FetchClient::new("coinmarketcap", timeout, policy)?,
            url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            convert: cfg.convert.clone(),
            skip_invalid: cfg.skip_invalid,
        })
    }
}

#[async_trait]
impl PriceSource for CoinMarketCapProvider {
    async fn fetch_quotes(&self, symbols: &str) -> Result<PriceResponse, FetchError> {
        let t0 = std::time::Instant::now();
        let skip_invalid = if self.skip_invalid { "true" } else { "false" };
        let resp: PriceResponse = self
            .client
            .get_json(|http| {
                http.get(&self.url)
                    .header("Accept", "application/json")
                    .header("X-CMC_PRO_API_KEY", &self.api_key)
                    .query(&[
                        ("symbol", symbols),
                        ("convert", self.convert.as_str()),
                        ("skip_invalid", skip_invalid),
                    ])
            })
            .await?;

        histogram!("pipeline_fetch_ms", "source" => "coinmarketcap")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::info!(
            provider = self.name(),
            quotes = resp.data.len(),
            "fetched price quotes"
        );
        Ok(resp)
    }

    fn name(&self) -> &'static str {
        "coinmarketcap"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_key_header_and_symbol_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-CMC_PRO_API_KEY", "k"))
            .and(query_param("symbol", "BTC,ETH,PEPE"))
            .and(query_param("convert", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "BTC": {"symbol": "BTC", "name": "Bitcoin", "cmc_rank": 1,
                            "quote": {"USD": {"price": 42000.5, "last_updated": "2024-01-01T00:00:00.000Z"}}}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = PriceApiConfig {
            base_url: server.uri(),
            api_key: "k".into(),
            ..PriceApiConfig::default()
        };
        let policy = RetryPolicy {
            max_attempts: 1,
            backoff: Duration::from_millis(1),
        };
        let p = CoinMarketCapProvider::new(&cfg, policy).unwrap();
        let resp = p.fetch_quotes("BTC,ETH,PEPE").await.unwrap();
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data["BTC"].quote["USD"].price, Some(42000.5));
    }
}
