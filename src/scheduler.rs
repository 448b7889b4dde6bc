// src/scheduler.rs
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::time::MissedTickBehavior;

use crate::hub::HubConnector;
use crate::pipeline::{Pipeline, RunSummary};

/// Run the pipeline every `period` until Ctrl-C.
pub async fn run_every<C, F>(pipeline: &Pipeline<C>, period: Duration, after_run: F)
where
    C: HubConnector,
    F: FnMut(&RunSummary),
{
    run_until(pipeline, period, tokio::signal::ctrl_c(), after_run).await
}

/// Run the pipeline every `period` until `shutdown` resolves.
///
/// Runs never overlap; a run that outlasts the period delays the next tick
/// instead of bunching up. `shutdown` is polled before the first run and
/// during every run, so it also cancels a run in flight.
pub async fn run_until<C, F, S>(
    pipeline: &Pipeline<C>,
    period: Duration,
    shutdown: S,
    mut after_run: F,
) where
    C: HubConnector,
    F: FnMut(&RunSummary),
    S: Future,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let summary = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::warn!(target: "scheduler", "shutdown requested mid-run; run abandoned");
                return;
            }
            summary = pipeline.run_once() => summary,
        };

        counter!("pipeline_runs_total").increment(1);
        tracing::info!(
            target: "scheduler",
            degraded = summary.is_degraded(),
            next_in_secs = period.as_secs(),
            "scheduled run complete"
        );
        after_run(&summary);
    }
    tracing::info!(target: "scheduler", "shutdown requested");
}
