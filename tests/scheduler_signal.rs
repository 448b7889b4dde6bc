// tests/scheduler_signal.rs
// Kept in its own test binary: it delivers a real SIGINT to this process.
#![cfg(unix)]

mod common;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use common::slow_pipeline;
use crypto_pulse::scheduler::run_every;

#[tokio::test]
async fn sigint_during_first_run_shuts_down_cleanly() {
    let pipeline = slow_pipeline(Duration::from_millis(800), Arc::new(AtomicUsize::new(0)));

    let pid = std::process::id().to_string();
    let killer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        tokio::process::Command::new("kill")
            .args(["-INT", &pid])
            .status()
            .await
            .unwrap();
    });

    let finished = tokio::time::timeout(
        Duration::from_secs(4),
        run_every(&pipeline, Duration::from_secs(30), |_| {}),
    )
    .await;
    killer.await.unwrap();

    assert!(finished.is_ok(), "Ctrl-C during a run was ignored");
}
