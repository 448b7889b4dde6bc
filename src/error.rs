//! Error types shared by the pipeline stages.

use thiserror::Error;

/// Failure of a single provider call (or of the whole retry loop).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("service unavailable (HTTP 503)")]
    Unavailable,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("decoding response: {0}")]
    Decode(String),

    #[error("gave up after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Only rate-limit and unavailable responses earn a backoff sleep.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unavailable)
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            503 => Self::Unavailable,
            s => Self::Status(s),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status.as_u16())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("AI enrichment is disabled")]
    Disabled,

    #[error("AI transport error: {0}")]
    Transport(String),

    #[error("AI service returned HTTP {0}")]
    Status(u16),

    #[error("AI service returned no content")]
    EmptyResponse,

    #[error("AI output does not match crypto_analysis schema: {0}")]
    InvalidOutput(String),
}

/// Why an event could not be appended to a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchAddError {
    /// The batch is at capacity; flush it and retry with a fresh one.
    #[error("batch full ({size} + {incoming} > {capacity} bytes)")]
    Full {
        size: usize,
        incoming: usize,
        capacity: usize,
    },

    /// The event alone exceeds the capacity of an empty batch.
    #[error("event of {incoming} bytes exceeds batch capacity of {capacity} bytes")]
    Oversized { incoming: usize, capacity: usize },

    #[error("batch rejected event: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum HubError {
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("opening producer for {hub}: {reason}")]
    Connect { hub: String, reason: String },

    #[error("sending batch to {hub}: {reason}")]
    Send { hub: String, reason: String },

    #[error("serializing event: {0}")]
    Serialize(#[from] serde_json::Error),
}
