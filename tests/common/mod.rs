// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crypto_pulse::error::{BatchAddError, HubError};
use crypto_pulse::hub::{EventBatch, HubConnector, HubProducer, SizedBatch};
use crypto_pulse::records::{DataType, PriceRecord, Prediction};
use crypto_pulse::EventEnvelope;

#[derive(Debug, Default)]
pub struct HubLog {
    pub connects: Vec<String>,
    /// (hub, events) per flushed batch, in send order.
    pub batches: Vec<(String, Vec<Vec<u8>>)>,
    pub closes: usize,
}

impl HubLog {
    pub fn batches_for(&self, hub: &str) -> Vec<Vec<serde_json::Value>> {
        self.batches
            .iter()
            .filter(|(h, _)| h == hub)
            .map(|(_, evs)| {
                evs.iter()
                    .map(|b| serde_json::from_slice(b).unwrap())
                    .collect()
            })
            .collect()
    }
}

/// In-memory hub recording every connect, flush and close.
#[derive(Clone)]
pub struct FakeHub {
    pub log: Arc<Mutex<HubLog>>,
    pub capacity: usize,
    /// Successful adds allowed before every further add is `Rejected`.
    pub reject_after: Option<usize>,
    pub fail_send: bool,
}

impl FakeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: Arc::new(Mutex::new(HubLog::default())),
            capacity,
            reject_after: None,
            fail_send: false,
        }
    }
}

pub struct FakeProducer {
    hub: String,
    log: Arc<Mutex<HubLog>>,
    capacity: usize,
    reject_after: Option<usize>,
    fail_send: bool,
    adds: Arc<AtomicUsize>,
}

pub struct FakeBatch {
    inner: SizedBatch,
    reject_after: Option<usize>,
    adds: Arc<AtomicUsize>,
}

impl EventBatch for FakeBatch {
    fn try_add(&mut self, body: &[u8]) -> Result<(), BatchAddError> {
        if let Some(n) = self.reject_after {
            if self.adds.load(Ordering::SeqCst) >= n {
                return Err(BatchAddError::Rejected("injected".into()));
            }
        }
        self.inner.try_add(body)?;
        self.adds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn size_in_bytes(&self) -> usize {
        self.inner.size_in_bytes()
    }
}

#[async_trait]
impl HubConnector for FakeHub {
    type Producer = FakeProducer;

    async fn connect(&self, hub_name: &str) -> Result<FakeProducer, HubError> {
        self.log.lock().unwrap().connects.push(hub_name.to_string());
        Ok(FakeProducer {
            hub: hub_name.to_string(),
            log: self.log.clone(),
            capacity: self.capacity,
            reject_after: self.reject_after,
            fail_send: self.fail_send,
            adds: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl HubProducer for FakeProducer {
    type Batch = FakeBatch;

    async fn create_batch(&self) -> Result<FakeBatch, HubError> {
        Ok(FakeBatch {
            inner: SizedBatch::new(self.capacity),
            reject_after: self.reject_after,
            adds: self.adds.clone(),
        })
    }

    async fn send_batch(&self, batch: FakeBatch) -> Result<(), HubError> {
        if self.fail_send {
            return Err(HubError::Send {
                hub: self.hub.clone(),
                reason: "injected".into(),
            });
        }
        self.log
            .lock()
            .unwrap()
            .batches
            .push((self.hub.clone(), batch.inner.into_events()));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), HubError> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub fn price_envelope(symbol: &str) -> EventEnvelope {
    EventEnvelope::Price(PriceRecord {
        record_id: uuid::Uuid::new_v4(),
        data_type: DataType::Price,
        symbol: symbol.into(),
        name: Some(format!("{symbol} coin")),
        price: Some(1.25),
        title: None,
        description: None,
        trend: Prediction::Neutral,
        published_at: Some("2024-01-01T00:00:00.000Z".into()),
        ingested_at: "2024-01-01T00:00:05Z".into(),
        volume_24h: None,
        percent_change_1h: None,
        percent_change_24h: None,
        percent_change_7d: None,
        cmc_rank: None,
    })
}

pub fn wire_len(env: &EventEnvelope) -> usize {
    env.to_wire().unwrap().len()
}

/// News source that takes `delay` and then returns nothing.
pub struct SlowNews {
    pub delay: std::time::Duration,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl crypto_pulse::ingest::types::NewsSource for SlowNews {
    async fn fetch_latest(
        &self,
    ) -> Result<Vec<crypto_pulse::ingest::types::RawNewsPost>, crypto_pulse::error::FetchError>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "slow-news"
    }
}

pub struct NoPrices;

#[async_trait]
impl crypto_pulse::ingest::types::PriceSource for NoPrices {
    async fn fetch_quotes(
        &self,
        _symbols: &str,
    ) -> Result<crypto_pulse::ingest::types::PriceResponse, crypto_pulse::error::FetchError> {
        Ok(Default::default())
    }

    fn name(&self) -> &'static str {
        "no-prices"
    }
}

/// Pipeline over in-memory sources whose news fetch takes `delay`.
pub fn slow_pipeline(
    delay: std::time::Duration,
    calls: Arc<AtomicUsize>,
) -> crypto_pulse::Pipeline<FakeHub> {
    use crypto_pulse::analyze::ai_adapter::DisabledModel;
    use crypto_pulse::config::EnrichmentMode;

    crypto_pulse::Pipeline::new(
        Box::new(SlowNews { delay, calls }),
        Box::new(NoPrices),
        crypto_pulse::EnrichmentGateway::new(Arc::new(DisabledModel), EnrichmentMode::TitleEcho),
        FakeHub::new(1 << 20),
        crypto_pulse::PipelineSettings {
            mode: EnrichmentMode::TitleEcho,
            watchlist: vec!["BTC".into()],
            convert: "USD".into(),
            news_hub: "news".into(),
            price_hub: "prices".into(),
        },
    )
}
