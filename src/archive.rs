// src/archive.rs
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::records::EventEnvelope;

#[async_trait::async_trait]
pub trait ArchiveSink: Send + Sync {
    /// Store envelopes in order (best-effort).
    async fn store(&self, envelopes: &[EventEnvelope]) -> Result<()>;
}

/// Appends one JSON object per line.
pub struct JsonlArchive {
    path: PathBuf,
}

impl JsonlArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ArchiveSink for JsonlArchive {
    async fn store(&self, envelopes: &[EventEnvelope]) -> Result<()> {
        if envelopes.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::new();
        for env in envelopes {
            serde_json::to_writer(&mut buf, env)?;
            buf.push(b'\n');
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening archive {}", self.path.display()))?;
        f.write_all(&buf).await.context("appending to archive")?;
        f.flush().await?;
        Ok(())
    }
}

// --- Test helper ---
pub struct MockArchive {
    pub calls: std::sync::Mutex<Vec<Vec<EventEnvelope>>>,
}

impl MockArchive {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
        }
    }
}

impl Default for MockArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ArchiveSink for MockArchive {
    async fn store(&self, envelopes: &[EventEnvelope]) -> Result<()> {
        self.calls
            .lock()
            .map_err(|_| anyhow::anyhow!("mock archive lock poisoned"))?
            .push(envelopes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DataType, PriceRecord, Prediction};

    fn price(sym: &str) -> EventEnvelope {
        EventEnvelope::Price(PriceRecord {
            record_id: uuid::Uuid::new_v4(),
            data_type: DataType::Price,
            symbol: sym.into(),
            name: None,
            price: Some(1.0),
            title: None,
            description: None,
            trend: Prediction::Neutral,
            published_at: None,
            ingested_at: "2024-01-01T00:00:00Z".into(),
            volume_24h: None,
            percent_change_1h: None,
            percent_change_24h: None,
            percent_change_7d: None,
            cmc_rank: None,
        })
    }

    #[tokio::test]
    async fn appends_json_lines_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/history.jsonl");
        let archive = JsonlArchive::new(&path);

        archive.store(&[price("BTC"), price("ETH")]).await.unwrap();
        archive.store(&[price("SOL")]).await.unwrap();
        archive.store(&[]).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let symbols: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["symbol"].to_string())
            .collect();
        assert_eq!(symbols, vec!["\"BTC\"", "\"ETH\"", "\"SOL\""]);
    }
}
