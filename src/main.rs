//! Crypto news + price producer: binary entrypoint.
//! Loads config, wires the pipeline, runs once or on an interval.

use std::process::ExitCode;

use crypto_pulse::metrics::Metrics;
use crypto_pulse::{Pipeline, PipelineConfig, RunSummary};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` filter (default `crypto_pulse=info,warn`); `LOG_FORMAT=json` for JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crypto_pulse=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn flush_metrics(metrics: Option<&Metrics>, cfg: &PipelineConfig) {
    let (Some(m), Some(path)) = (metrics, cfg.run.metrics_textfile.as_deref()) else {
        return;
    };
    if let Err(e) = m.write_textfile(path) {
        tracing::warn!(error = ?e, "writing metrics textfile failed");
    }
}

fn log_summary(summary: &RunSummary) {
    match serde_json::to_string(summary) {
        Ok(s) => tracing::info!(summary = %s, "run summary"),
        Err(e) => tracing::warn!(error = %e, "run summary not serializable"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match PipelineConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "invalid pipeline configuration");
            return ExitCode::from(1);
        }
    };

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics disabled");
            None
        }
    };

    let pipeline = match Pipeline::from_config(&cfg) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = ?e, "failed to build pipeline");
            return ExitCode::from(1);
        }
    };

    match cfg.interval() {
        Some(period) => {
            tracing::info!(interval_secs = period.as_secs(), "starting scheduled runs");
            crypto_pulse::scheduler::run_every(&pipeline, period, |summary| {
                log_summary(summary);
                flush_metrics(metrics.as_ref(), &cfg);
            })
            .await;
            ExitCode::SUCCESS
        }
        None => {
            let summary = pipeline.run_once().await;
            log_summary(&summary);
            flush_metrics(metrics.as_ref(), &cfg);
            tracing::info!("process complete");
            ExitCode::from(summary.exit_status(cfg.run.strict_exit))
        }
    }
}
