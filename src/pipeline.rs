// src/pipeline.rs
//! End-to-end run: news -> enrich -> symbols -> prices -> publish news -> publish prices.
//!
//! Every stage degrades to an empty output on failure; the failure is logged
//! here, once, and recorded in the run summary. Both publish calls are always
//! attempted.

use std::fmt;

use anyhow::{Context, Result};
use metrics::gauge;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::analyze::EnrichmentGateway;
use crate::archive::{ArchiveSink, JsonlArchive};
use crate::config::{EnrichmentMode, PipelineConfig};
use crate::hub::{publish, HubConnector, PublishReport, RestHubConnector};
use crate::ingest::ensure_metrics_described;
use crate::ingest::providers::{
    coinmarketcap::CoinMarketCapProvider, cryptopanic::CryptoPanicProvider,
};
use crate::ingest::types::{NewsSource, PriceResponse, PriceSource};
use crate::normalize::{news_records, normalize_news, normalize_prices};
use crate::records::EventEnvelope;
use crate::symbols::{price_query, resolve_extra_symbols};

/// Exit status of a degraded run when `strict_exit` is on.
pub const DEGRADED_EXIT_STATUS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NewsFetch,
    Enrichment,
    PriceFetch,
    Archive,
    NewsPublish,
    PricePublish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::NewsFetch => "news_fetch",
            Stage::Enrichment => "enrichment",
            Stage::PriceFetch => "price_fetch",
            Stage::Archive => "archive",
            Stage::NewsPublish => "news_publish",
            Stage::PricePublish => "price_publish",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub news_fetched: usize,
    pub news_dropped: usize,
    pub enriched: usize,
    pub extra_symbols: String,
    pub prices: usize,
    pub news_publish: Option<PublishReport>,
    pub price_publish: Option<PublishReport>,
    pub degraded: Vec<Stage>,
}

impl RunSummary {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// 0 unless `strict` is set and some stage degraded.
    pub fn exit_status(&self, strict: bool) -> u8 {
        if strict && self.is_degraded() {
            DEGRADED_EXIT_STATUS
        } else {
            0
        }
    }

    fn degrade(&mut self, stage: Stage) {
        if !self.degraded.contains(&stage) {
            self.degraded.push(stage);
        }
    }
}

/// Plain values the orchestrator needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub mode: EnrichmentMode,
    pub watchlist: Vec<String>,
    pub convert: String,
    pub news_hub: String,
    pub price_hub: String,
}

impl PipelineSettings {
    pub fn from_config(cfg: &PipelineConfig) -> Self {
        Self {
            mode: cfg.ai.mode,
            watchlist: cfg.price.watchlist.clone(),
            convert: cfg.price.convert.clone(),
            news_hub: cfg.hub.news_hub.clone(),
            price_hub: cfg.hub.price_hub.clone(),
        }
    }
}

pub struct Pipeline<C: HubConnector> {
    news: Box<dyn NewsSource>,
    prices: Box<dyn PriceSource>,
    gateway: EnrichmentGateway,
    hub: C,
    archive: Option<Box<dyn ArchiveSink>>,
    settings: PipelineSettings,
}

impl Pipeline<RestHubConnector> {
    /// Production wiring: CryptoPanic, CoinMarketCap, the configured model, Event Hubs REST.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let policy = cfg.retry.policy();
        let news = CryptoPanicProvider::new(&cfg.news, policy).context("building news client")?;
        let prices =
            CoinMarketCapProvider::new(&cfg.price, policy).context("building price client")?;
        let hub = RestHubConnector::new(&cfg.hub).context("building hub connector")?;
        let gateway = EnrichmentGateway::from_config(&cfg.ai);

        let mut pipeline = Pipeline::new(
            Box::new(news),
            Box::new(prices),
            gateway,
            hub,
            PipelineSettings::from_config(cfg),
        );
        if let Some(path) = &cfg.run.archive_path {
            pipeline = pipeline.with_archive(Box::new(JsonlArchive::new(path)));
        }
        Ok(pipeline)
    }
}

impl<C: HubConnector> Pipeline<C> {
    pub fn new(
        news: Box<dyn NewsSource>,
        prices: Box<dyn PriceSource>,
        gateway: EnrichmentGateway,
        hub: C,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            news,
            prices,
            gateway,
            hub,
            archive: None,
            settings,
        }
    }

    pub fn with_archive(mut self, archive: Box<dyn ArchiveSink>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub async fn run_once(&self) -> RunSummary {
        ensure_metrics_described();
        let mut summary = RunSummary::default();

        // 1) News
        let raw_news = match self.news.fetch_latest().await {
            Ok(v) => v,
            Err(e) => {
                error!(provider = self.news.name(), error = %e, "news fetch failed");
                summary.degrade(Stage::NewsFetch);
                Vec::new()
            }
        };
        summary.news_fetched = raw_news.len();
        let (inputs, dropped) = normalize_news(raw_news, self.settings.mode);
        summary.news_dropped = dropped;
        info!(
            fetched = summary.news_fetched,
            kept = inputs.len(),
            dropped,
            "news normalized"
        );

        // 2) Enrichment
        let enriched = match self.gateway.try_enrich(&inputs).await {
            Ok(items) => items,
            Err(e) => {
                metrics::counter!("pipeline_enrichment_errors_total").increment(1);
                warn!(
                    provider = self.gateway.provider_name(),
                    error = %e,
                    "enrichment failed; continuing price-only"
                );
                summary.degrade(Stage::Enrichment);
                Vec::new()
            }
        };
        summary.enriched = enriched.len();

        // 3) Symbols, which must be known before the price fetch.
        summary.extra_symbols = resolve_extra_symbols(&enriched, &self.settings.watchlist);
        let query = price_query(&self.settings.watchlist, &summary.extra_symbols);

        // 4) Prices
        let quotes = match self.prices.fetch_quotes(&query).await {
            Ok(r) => r,
            Err(e) => {
                error!(provider = self.prices.name(), error = %e, "price fetch failed");
                summary.degrade(Stage::PriceFetch);
                PriceResponse::default()
            }
        };
        let price_records = normalize_prices(quotes, &self.settings.convert, chrono::Utc::now());
        summary.prices = price_records.len();

        let news_envelopes: Vec<EventEnvelope> =
            news_records(enriched).into_iter().map(Into::into).collect();
        let price_envelopes: Vec<EventEnvelope> =
            price_records.into_iter().map(Into::into).collect();

        // 5) Local archive
        if let Some(archive) = &self.archive {
            let all: Vec<EventEnvelope> = news_envelopes
                .iter()
                .chain(price_envelopes.iter())
                .cloned()
                .collect();
            if let Err(e) = archive.store(&all).await {
                warn!(error = ?e, "archiving events failed");
                summary.degrade(Stage::Archive);
            }
        }

        // 6) Publish news, then prices
        let news_report = self
            .publish_stage(
                &self.settings.news_hub,
                &news_envelopes,
                Stage::NewsPublish,
                &mut summary,
            )
            .await;
        let price_report = self
            .publish_stage(
                &self.settings.price_hub,
                &price_envelopes,
                Stage::PricePublish,
                &mut summary,
            )
            .await;
        summary.news_publish = news_report;
        summary.price_publish = price_report;

        gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        if summary.is_degraded() {
            let stages: Vec<String> = summary.degraded.iter().map(|s| s.to_string()).collect();
            warn!(degraded = %stages.join(","), "run finished degraded");
        } else {
            info!(
                news = summary.enriched,
                prices = summary.prices,
                "run finished"
            );
        }
        summary
    }

    async fn publish_stage(
        &self,
        hub: &str,
        envelopes: &[EventEnvelope],
        stage: Stage,
        summary: &mut RunSummary,
    ) -> Option<PublishReport> {
        match publish(&self.hub, hub, envelopes).await {
            Ok(report) => {
                if !report.is_complete() {
                    summary.degrade(stage);
                }
                Some(report)
            }
            Err(e) => {
                error!(hub, error = %e, "publishing failed");
                summary.degrade(stage);
                None
            }
        }
    }
}
