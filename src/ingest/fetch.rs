// src/ingest/fetch.rs
//! HTTP GET with a bounded attempt budget and a fixed backoff on 429/503.

use std::time::Duration;

use metrics::counter;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::FetchError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Slept before the next attempt after a 429/503. No growth, no jitter.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

pub struct FetchClient {
    http: reqwest::Client,
    policy: RetryPolicy,
    source: &'static str,
}

impl FetchClient {
    pub fn new(
        source: &'static str,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-pulse/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            http,
            policy,
            source,
        })
    }

    /// Runs `build` once per attempt and decodes a 2xx body as `T`.
    ///
    /// Every failure consumes one attempt. Rate-limited and unavailable
    /// responses additionally sleep `policy.backoff` before the next one.
    pub async fn get_json<T, F>(&self, build: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let max = self.policy.max_attempts.max(1);
        let mut last = FetchError::Network("no attempt made".to_string());

        for attempt in 1..=max {
            info!(
                source = self.source,
                attempt,
                max_attempts = max,
                "fetch attempt {attempt}/{max}"
            );
            counter!("pipeline_fetch_attempts_total", "source" => self.source).increment(1);

            match self.attempt_once(&build).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    counter!("pipeline_fetch_failures_total", "source" => self.source)
                        .increment(1);
                    warn!(source = self.source, attempt, error = %e, "fetch attempt failed");
                    let transient = e.is_transient();
                    last = e;
                    if transient && attempt < max {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            attempts: max,
            last: Box::new(last),
        })
    }

    async fn attempt_once<T, F>(&self, build: &F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let resp = build(&self.http).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
