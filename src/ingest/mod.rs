// src/ingest/mod.rs
pub mod fetch;
pub mod providers;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// Upper bound on cleaned text length, in chars.
pub const MAX_TEXT_CHARS: usize = 1500;

/// One-time metrics registration (so series show up in the exposition).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_fetch_attempts_total",
            "HTTP attempts made against news/price providers."
        );
        describe_counter!(
            "pipeline_fetch_failures_total",
            "Provider attempts that failed (any reason)."
        );
        describe_histogram!(
            "pipeline_fetch_ms",
            "Successful provider fetch time in milliseconds."
        );
        describe_counter!(
            "pipeline_news_dropped_total",
            "News posts dropped by validation (missing description or timestamp)."
        );
        describe_counter!(
            "pipeline_enriched_items_total",
            "Structured items accepted from the AI enrichment."
        );
        describe_counter!(
            "pipeline_enrichment_errors_total",
            "Enrichment calls that degraded to an empty result."
        );
        describe_counter!(
            "pipeline_events_published_total",
            "Events placed into sent batches, per hub."
        );
        describe_counter!("pipeline_batches_sent_total", "Batches sent, per hub.");
        describe_counter!("pipeline_runs_total", "Scheduled pipeline runs completed.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last completed a run."
        );
    });
}

/// Clean provider text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    if let Ok(re) = RE_TAGS.get_or_try_init(|| regex::Regex::new(r"(?is)</?[^>]+>")) {
        out = re.replace_all(&out, "").to_string();
    }

    // 3) “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (includes NBSP)
    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}
