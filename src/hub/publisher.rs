// src/hub/publisher.rs
//! Pack envelopes into size-bounded batches, flushing each batch as it fills.

use metrics::counter;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{BatchAddError, HubError};
use crate::hub::{EventBatch, HubConnector, HubProducer};
use crate::records::EventEnvelope;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub hub: String,
    /// Envelopes handed to `publish`; reported as "sent".
    pub requested: usize,
    /// Envelopes that ended up in a sent batch.
    pub placed: usize,
    pub batches_sent: usize,
    /// Envelopes too large for an empty batch.
    pub rejected: usize,
    /// A batch refused an add for a reason other than capacity; the rest was skipped.
    pub aborted: bool,
}

impl PublishReport {
    fn new(hub: &str, requested: usize) -> Self {
        Self {
            hub: hub.to_string(),
            requested,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.aborted && self.rejected == 0 && self.placed == self.requested
    }
}

/// Publish `envelopes` to `hub_name` in input order.
///
/// An empty input returns immediately without connecting. Otherwise one
/// producer is opened for this call and closed on every exit path.
pub async fn publish<C: HubConnector>(
    connector: &C,
    hub_name: &str,
    envelopes: &[EventEnvelope],
) -> Result<PublishReport, HubError> {
    if envelopes.is_empty() {
        info!(hub = hub_name, "no events to send");
        return Ok(PublishReport::new(hub_name, 0));
    }

    let mut producer = connector.connect(hub_name).await?;
    let result = fill_and_send(&producer, hub_name, envelopes).await;
    if let Err(e) = producer.close().await {
        warn!(hub = hub_name, error = %e, "closing producer failed");
    }
    let report = result?;

    counter!("pipeline_events_published_total", "hub" => hub_name.to_string())
        .increment(report.placed as u64);
    counter!("pipeline_batches_sent_total", "hub" => hub_name.to_string())
        .increment(report.batches_sent as u64);
    info!(
        hub = hub_name,
        events = report.requested,
        placed = report.placed,
        batches = report.batches_sent,
        "Sent {} events to Event Hub: {}",
        report.requested,
        hub_name
    );
    Ok(report)
}

async fn fill_and_send<P: HubProducer>(
    producer: &P,
    hub: &str,
    envelopes: &[EventEnvelope],
) -> Result<PublishReport, HubError> {
    let mut report = PublishReport::new(hub, envelopes.len());
    let mut batch = producer.create_batch().await?;

    for (index, env) in envelopes.iter().enumerate() {
        let body = match env.to_wire() {
            Ok(b) => b,
            Err(e) => {
                error!(hub, index, error = %e, "serializing event failed; aborting publish");
                report.aborted = true;
                break;
            }
        };

        let added = match batch.try_add(&body) {
            Err(BatchAddError::Full { .. }) => {
                let fresh = producer.create_batch().await?;
                let full = std::mem::replace(&mut batch, fresh);
                producer.send_batch(full).await?;
                report.batches_sent += 1;
                batch.try_add(&body)
            }
            other => other,
        };

        match added {
            Ok(()) => report.placed += 1,
            Err(e @ (BatchAddError::Oversized { .. } | BatchAddError::Full { .. })) => {
                error!(
                    hub,
                    index,
                    record_id = %env.record_id(),
                    error = %e,
                    "event does not fit an empty batch; rejected"
                );
                report.rejected += 1;
            }
            Err(e @ BatchAddError::Rejected(_)) => {
                error!(hub, index, error = %e, "error adding event to batch; aborting publish");
                report.aborted = true;
                break;
            }
        }
    }

    if !batch.is_empty() {
        producer.send_batch(batch).await?;
        report.batches_sent += 1;
    }
    Ok(report)
}
