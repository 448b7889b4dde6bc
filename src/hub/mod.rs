// src/hub/mod.rs
//! Message hub seam: connector -> producer -> size-bounded batches.

pub mod publisher;
pub mod rest;

use async_trait::async_trait;

use crate::error::{BatchAddError, HubError};

pub use publisher::{publish, PublishReport};
pub use rest::{ConnectionString, RestHubConnector};

/// An ordered group of encoded events sent as one transport unit.
pub trait EventBatch: Send {
    /// Append one encoded event. `Full` means "flush me and retry".
    fn try_add(&mut self, body: &[u8]) -> Result<(), BatchAddError>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn size_in_bytes(&self) -> usize;
}

#[async_trait]
pub trait HubProducer: Send + Sync {
    type Batch: EventBatch;

    async fn create_batch(&self) -> Result<Self::Batch, HubError>;
    async fn send_batch(&self, batch: Self::Batch) -> Result<(), HubError>;
    async fn close(&mut self) -> Result<(), HubError>;
}

#[async_trait]
pub trait HubConnector: Send + Sync {
    type Producer: HubProducer;

    /// Open a producer scoped to one publish call.
    async fn connect(&self, hub_name: &str) -> Result<Self::Producer, HubError>;
}

/// Byte-bounded batch. `measure` gives the wire cost of one event.
#[derive(Debug, Clone)]
pub struct SizedBatch {
    events: Vec<Vec<u8>>,
    size: usize,
    capacity: usize,
    measure: fn(&[u8]) -> usize,
}

impl SizedBatch {
    /// Each event costs its raw length.
    pub fn new(capacity: usize) -> Self {
        Self::with_measure(capacity, <[u8]>::len)
    }

    pub fn with_measure(capacity: usize, measure: fn(&[u8]) -> usize) -> Self {
        Self {
            events: Vec::new(),
            size: 0,
            capacity,
            measure,
        }
    }

    pub fn into_events(self) -> Vec<Vec<u8>> {
        self.events
    }
}

impl EventBatch for SizedBatch {
    fn try_add(&mut self, body: &[u8]) -> Result<(), BatchAddError> {
        if body.is_empty() {
            return Err(BatchAddError::Rejected("empty event body".into()));
        }
        let incoming = (self.measure)(body);
        if incoming > self.capacity {
            return Err(BatchAddError::Oversized {
                incoming,
                capacity: self.capacity,
            });
        }
        if self.size + incoming > self.capacity {
            return Err(BatchAddError::Full {
                size: self.size,
                incoming,
                capacity: self.capacity,
            });
        }
        self.size += incoming;
        self.events.push(body.to_vec());
        Ok(())
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn size_in_bytes(&self) -> usize {
        self.size
    }
}
