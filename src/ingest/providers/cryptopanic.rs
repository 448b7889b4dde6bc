// src/ingest/providers/cryptopanic.rs
use async_trait::async_trait;
use metrics::histogram;

use crate::config::NewsApiConfig;
use crate::error::FetchError;
use crate::ingest::fetch::{FetchClient, RetryPolicy};
use crate::ingest::types::{NewsResponse, NewsSource, RawNewsPost};

/// CryptoPanic posts endpoint (`GET ?auth_token=...`, body `{"results": [...]}`).
pub struct CryptoPanicProvider {
    client: FetchClient,
    url: String,
    auth_token: String,
    public_only: bool,
}

impl CryptoPanicProvider {
    pub fn new(cfg: &NewsApiConfig, policy: RetryPolicy) -> Result<Self, FetchError> {
        let timeout = std::time::Duration::from_secs(cfg.timeout_secs.max(1));
        Ok(Self {
            client: FetchClient::new("cryptopanic", timeout, policy)?,
            url: cfg.base_url.clone(),
            auth_token: cfg.auth_token.clone(),
            public_only: cfg.public_only,
        })
    }
}

#[async_trait]
impl NewsSource for CryptoPanicProvider {
    async fn fetch_latest(&self) -> Result<Vec<RawNewsPost>, FetchError> {
        let t0 = std::time::Instant::now();
        let resp: NewsResponse = self
            .client
            .get_json(|http| {
                let rb = http
                    .get(&self.url)
                    .query(&[("auth_token", self.auth_token.as_str())]);
                if self.public_only {
                    rb.query(&[("public", "true")])
                } else {
                    rb
                }
            })
            .await?;

        histogram!("pipeline_fetch_ms", "source" => "cryptopanic")
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        if resp.results.is_empty() {
            tracing::info!(provider = self.name(), "no news returned");
        }
        Ok(resp.results)
    }

    fn name(&self) -> &'static str {
        "cryptopanic"
    }
}
