// src/normalize.rs
//! Pure mapping from provider payloads to the shapes the rest of the pipeline uses.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use crate::analyze::EnrichedNewsItem;
use crate::config::EnrichmentMode;
use crate::ingest::clean_text;
use crate::ingest::types::{PriceResponse, RawNewsPost};
use crate::records::{DataType, NewsRecord, PriceRecord, Prediction, INGESTED_AT_FORMAT};

/// One news item as sent to enrichment. `published_at` is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsInput {
    pub title: Option<String>,
    pub description: String,
    pub published_at: String,
}

impl NewsInput {
    /// `[description, timestamp]` or `[title, description, timestamp]`.
    pub fn to_tuple(&self, mode: EnrichmentMode) -> Vec<&str> {
        match mode {
            EnrichmentMode::DescriptionOnly => {
                vec![self.description.as_str(), self.published_at.as_str()]
            }
            EnrichmentMode::TitleEcho => vec![
                self.title.as_deref().unwrap_or_default(),
                self.description.as_str(),
                self.published_at.as_str(),
            ],
        }
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Validate and clean raw posts, preserving input order.
///
/// Posts without a timestamp are dropped silently. Posts without a description
/// are dropped in description-only mode; in title-echo mode a `Source: <domain>`
/// summary stands in. Returns the kept inputs and the number dropped.
pub fn normalize_news(raw: Vec<RawNewsPost>, mode: EnrichmentMode) -> (Vec<NewsInput>, usize) {
    let total = raw.len();
    let mut out = Vec::with_capacity(total);

    for post in raw {
        let Some(published_at) =
            non_blank(post.published_at.clone()).or_else(|| non_blank(post.created_at.clone()))
        else {
            continue;
        };

        let cleaned = post
            .description
            .as_deref()
            .map(clean_text)
            .filter(|d| !d.is_empty());
        let description = match (cleaned, mode) {
            (Some(d), _) => d,
            (None, EnrichmentMode::TitleEcho) => format!("Source: {}", source_domain(&post)),
            (None, EnrichmentMode::DescriptionOnly) => continue,
        };

        out.push(NewsInput {
            title: post.title.as_deref().map(clean_text),
            description,
            published_at,
        });
    }

    let dropped = total - out.len();
    if dropped > 0 {
        counter!("pipeline_news_dropped_total").increment(dropped as u64);
    }
    (out, dropped)
}

fn source_domain(post: &RawNewsPost) -> &str {
    post.domain
        .as_deref()
        .or_else(|| post.source.as_ref().and_then(|s| s.domain.as_deref()))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or("Unknown source")
}

/// Flatten a quotes response into price records, one per symbol.
/// Missing nested fields become `None`.
pub fn normalize_prices(resp: PriceResponse, convert: &str, now: DateTime<Utc>) -> Vec<PriceRecord> {
    let ingested_at = now.format(INGESTED_AT_FORMAT).to_string();

    resp.data
        .into_iter()
        .map(|(key, quote)| {
            let q = quote.quote.get(convert).cloned().unwrap_or_default();
            PriceRecord {
                record_id: Uuid::new_v4(),
                data_type: DataType::Price,
                symbol: non_blank(quote.symbol).unwrap_or(key),
                name: quote.name,
                price: q.price,
                title: None,
                description: None,
                trend: Prediction::Neutral,
                published_at: q.last_updated,
                ingested_at: ingested_at.clone(),
                volume_24h: q.volume_24h,
                percent_change_1h: q.percent_change_1h,
                percent_change_24h: q.percent_change_24h,
                percent_change_7d: q.percent_change_7d,
                cmc_rank: quote.cmc_rank,
            }
        })
        .collect()
}

/// Enriched items become news records with fresh ids; `published_at` is moved, not rebuilt.
pub fn news_records(items: Vec<EnrichedNewsItem>) -> Vec<NewsRecord> {
    items
        .into_iter()
        .map(|it| NewsRecord {
            record_id: Uuid::new_v4(),
            data_type: DataType::News,
            symbol: it.symbol,
            name: it.name,
            price: None,
            title: it.title,
            description: it.description,
            trend: it.prediction,
            published_at: it.published_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{QuoteBlock, RawNewsSource, RawPriceQuote};
    use chrono::TimeZone;
    use std::collections::{BTreeMap, HashMap};

    fn post(desc: Option<&str>, published: Option<&str>, created: Option<&str>) -> RawNewsPost {
        RawNewsPost {
            title: Some("t".into()),
            description: desc.map(Into::into),
            published_at: published.map(Into::into),
            created_at: created.map(Into::into),
            ..RawNewsPost::default()
        }
    }

    #[test]
    fn drops_items_missing_description_or_timestamp() {
        let raw = vec![
            post(Some("a"), Some("2024-01-01T00:00:00Z"), None),
            post(None, Some("2024-01-01T00:00:01Z"), None),
            post(Some("c"), None, None),
            post(Some("d"), None, Some("2024-01-01T00:00:03Z")),
            post(Some("   "), Some("2024-01-01T00:00:04Z"), None),
        ];
        let (kept, dropped) = normalize_news(raw, EnrichmentMode::DescriptionOnly);
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 3);
        assert_eq!(kept[0].description, "a");
        assert_eq!(kept[1].published_at, "2024-01-01T00:00:03Z");
    }

    #[test]
    fn title_mode_derives_summary_from_domain() {
        let mut p = post(None, None, Some("2024-02-02T10:00:00Z"));
        p.source = Some(RawNewsSource {
            title: None,
            domain: Some("coindesk.com".into()),
        });
        let (kept, dropped) = normalize_news(vec![p], EnrichmentMode::TitleEcho);
        assert_eq!(dropped, 0);
        assert_eq!(kept[0].description, "Source: coindesk.com");
        assert_eq!(
            kept[0].to_tuple(EnrichmentMode::TitleEcho),
            vec!["t", "Source: coindesk.com", "2024-02-02T10:00:00Z"]
        );
    }

    #[test]
    fn timestamp_is_kept_verbatim() {
        let odd = " 2024-01-01 00:00:00+00 ";
        let (kept, _) = normalize_news(
            vec![post(Some("x"), Some(odd), None)],
            EnrichmentMode::DescriptionOnly,
        );
        assert_eq!(kept[0].published_at, odd);
    }

    #[test]
    fn prices_tolerate_missing_nested_fields() {
        let mut data = BTreeMap::new();
        let mut quote = HashMap::new();
        quote.insert(
            "USD".to_string(),
            QuoteBlock {
                price: Some(1.5),
                last_updated: Some("2024-01-01T00:00:00.000Z".into()),
                ..QuoteBlock::default()
            },
        );
        data.insert(
            "DOGE".to_string(),
            RawPriceQuote {
                symbol: Some("DOGE".into()),
                name: Some("Dogecoin".into()),
                cmc_rank: Some(9),
                quote,
            },
        );
        data.insert("XYZ".to_string(), RawPriceQuote::default());

        let now = Utc.with_ymd_and_hms(2024, 3, 4, 5, 6, 7).unwrap();
        let out = normalize_prices(PriceResponse { data }, "USD", now);
        assert_eq!(out.len(), 2);

        let doge = &out[0];
        assert_eq!(doge.symbol, "DOGE");
        assert_eq!(doge.price, Some(1.5));
        assert_eq!(doge.volume_24h, None);
        assert_eq!(doge.trend, Prediction::Neutral);
        assert_eq!(doge.published_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(doge.ingested_at, "2024-03-04T05:06:07Z");

        let xyz = &out[1];
        assert_eq!(xyz.symbol, "XYZ");
        assert!(xyz.price.is_none());
        assert!(xyz.published_at.is_none());
        assert_ne!(doge.record_id, xyz.record_id);
    }
}
