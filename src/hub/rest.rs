// src/hub/rest.rs
//! Event Hubs over the REST "send batch" API, authorised with a SAS token.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::config::HubConfig;
use crate::error::HubError;
use crate::hub::{HubConnector, HubProducer, SizedBatch};

const API_VERSION: &str = "2014-01";
const CONTENT_TYPE: &str = "application/vnd.microsoft.servicebus.json";

/// Parsed `Endpoint=sb://...;SharedAccessKeyName=...;SharedAccessKey=...[;EntityPath=...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Namespace host, e.g. `myns.servicebus.windows.net`.
    pub host: String,
    pub key_name: String,
    pub key: String,
    pub entity_path: Option<String>,
}

impl FromStr for ConnectionString {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key = None;
        let mut entity_path = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Keys are base64 and may contain '='; split on the first one only.
            let Some((k, v)) = part.split_once('=') else {
                return Err(HubError::InvalidConnectionString(format!(
                    "segment without '=': {part}"
                )));
            };
            match k.to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(v.to_string()),
                "sharedaccesskeyname" => key_name = Some(v.to_string()),
                "sharedaccesskey" => key = Some(v.to_string()),
                "entitypath" => entity_path = Some(v.to_string()).filter(|e| !e.is_empty()),
                _ => {}
            }
        }

        let endpoint =
            endpoint.ok_or_else(|| HubError::InvalidConnectionString("missing Endpoint".into()))?;
        let host = endpoint
            .trim_start_matches("sb://")
            .trim_start_matches("https://")
            .trim_end_matches('/')
            .to_string();
        if host.is_empty() {
            return Err(HubError::InvalidConnectionString("empty Endpoint".into()));
        }
        Ok(Self {
            host,
            key_name: key_name.ok_or_else(|| {
                HubError::InvalidConnectionString("missing SharedAccessKeyName".into())
            })?,
            key: key.ok_or_else(|| {
                HubError::InvalidConnectionString("missing SharedAccessKey".into())
            })?,
            entity_path,
        })
    }
}

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// `SharedAccessSignature sr=..&sig=..&se=..&skn=..` valid until `expiry` (unix seconds).
pub fn sas_token(
    resource_uri: &str,
    key_name: &str,
    key: &str,
    expiry: i64,
) -> Result<String, HubError> {
    let sr = url_encode(resource_uri);
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
        .map_err(|e| HubError::InvalidConnectionString(format!("signing key: {e}")))?;
    mac.update(format!("{sr}\n{expiry}").as_bytes());
    let sig = BASE64_STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!(
        "SharedAccessSignature sr={sr}&sig={}&se={expiry}&skn={key_name}",
        url_encode(&sig)
    ))
}

#[derive(Serialize)]
struct RestEvent<'a> {
    #[serde(rename = "Body")]
    body: &'a str,
}

/// Wire cost of one event inside the JSON array, separator included.
fn rest_event_len(body: &[u8]) -> usize {
    let text = String::from_utf8_lossy(body);
    serde_json::to_string(&RestEvent { body: &text })
        .map(|s| s.len() + 1)
        .unwrap_or(usize::MAX)
}

pub struct RestHubConnector {
    http: reqwest::Client,
    /// `None` when no connection string was configured; every connect then fails.
    conn: Option<ConnectionString>,
    base_url: String,
    max_batch_bytes: usize,
    sas_ttl: Duration,
}

impl RestHubConnector {
    /// A malformed connection string is an error. A missing one is not: the
    /// connector is built and each publish fails at connect time.
    pub fn new(cfg: &HubConfig) -> Result<Self, HubError> {
        let conn = match cfg.connection_string.trim() {
            "" => {
                tracing::warn!("EVENTHUB_CONNECTION_STRING not set; publishing will fail");
                None
            }
            s => Some(s.parse::<ConnectionString>()?),
        };
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-pulse/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| HubError::Connect {
                hub: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: conn
                .as_ref()
                .map(|c| format!("https://{}", c.host))
                .unwrap_or_default(),
            conn,
            max_batch_bytes: cfg.max_batch_bytes,
            sas_ttl: Duration::from_secs(cfg.sas_ttl_secs.max(60)),
        })
    }

    /// Send to a different base URL (local emulator, tests). Signing still uses the namespace host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl HubConnector for RestHubConnector {
    type Producer = RestHubProducer;

    async fn connect(&self, hub_name: &str) -> Result<RestHubProducer, HubError> {
        let conn = self.conn.as_ref().ok_or_else(|| {
            HubError::InvalidConnectionString("EVENTHUB_CONNECTION_STRING not set".into())
        })?;
        let hub = Some(hub_name.trim())
            .filter(|h| !h.is_empty())
            .or(conn.entity_path.as_deref())
            .ok_or_else(|| HubError::Connect {
                hub: String::new(),
                reason: "no hub name and no EntityPath in connection string".into(),
            })?
            .to_string();

        let expiry = chrono::Utc::now().timestamp() + self.sas_ttl.as_secs() as i64;
        let resource_uri = format!("https://{}/{}", conn.host, hub);
        let token = sas_token(&resource_uri, &conn.key_name, &conn.key, expiry)?;
        tracing::debug!(hub = %hub, "opened REST producer");

        Ok(RestHubProducer {
            http: self.http.clone(),
            url: format!(
                "{}/{}/messages?timeout=60&api-version={API_VERSION}",
                self.base_url, hub
            ),
            token,
            hub,
            capacity: self.max_batch_bytes.saturating_sub(2),
            closed: false,
        })
    }
}

pub struct RestHubProducer {
    http: reqwest::Client,
    url: String,
    token: String,
    hub: String,
    capacity: usize,
    closed: bool,
}

#[async_trait]
impl HubProducer for RestHubProducer {
    type Batch = SizedBatch;

    async fn create_batch(&self) -> Result<SizedBatch, HubError> {
        if self.closed {
            return Err(HubError::Connect {
                hub: self.hub.clone(),
                reason: "producer is closed".into(),
            });
        }
        Ok(SizedBatch::with_measure(self.capacity, rest_event_len))
    }

    async fn send_batch(&self, batch: SizedBatch) -> Result<(), HubError> {
        let texts: Vec<String> = batch
            .into_events()
            .into_iter()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .collect();
        let events: Vec<RestEvent<'_>> = texts.iter().map(|t| RestEvent { body: t }).collect();
        let body = serde_json::to_vec(&events)?;

        let resp = self
            .http
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| HubError::Send {
                hub: self.hub.clone(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(HubError::Send {
                hub: self.hub.clone(),
                reason: format!("HTTP {status}: {}", detail.trim()),
            });
        }
        tracing::debug!(hub = %self.hub, events = events.len(), "batch sent");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), HubError> {
        self.closed = true;
        Ok(())
    }
}
