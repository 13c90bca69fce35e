//! Contract Test: Tick Scheduling and Shutdown
//!
//! Constraints verified:
//! - Ticks fire on the configured interval while the poller runs
//! - A slow tick never delays the next one (fire-and-forget)
//! - The poller stops promptly on its shutdown signal

mod common;

use common::*;
use dcwatch_core::{MemoryCache, PollEvent, Poller};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn ticks_fire_until_shutdown() {
    let source = Arc::new(ScriptedSource::new());
    source.push_entries("20game01", single("20game01.x", "rbx", "unavailable"));

    let cache = MemoryCache::new();
    let (poller, mut rx) = Poller::new(
        source.clone(),
        Arc::new(cache.clone()),
        None,
        config_for(&["20game01"], 40),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let runner = poller.clone();
    let handle = tokio::spawn(async move { runner.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "poller should stop within 5 seconds");
    assert!(result.unwrap().unwrap().is_ok());

    assert!(
        poller.tick_count() >= 2,
        "expected at least 2 ticks, got {}",
        poller.tick_count()
    );
    assert!(cache.entries("20game01").await.is_some());

    let events = drain_events(&mut rx);
    assert_eq!(events.first(), Some(&PollEvent::Started { configs: 1 }));
    assert!(events.contains(&PollEvent::Stopped {
        reason: "Shutdown signal".to_string()
    }));
}

#[tokio::test]
async fn slow_requests_do_not_delay_next_tick() {
    // Each fetch takes far longer than the interval
    let source = Arc::new(ScriptedSource::with_delay(Duration::from_millis(500)));
    source.push_entries("20game01", single("20game01.x", "rbx", "unavailable"));

    let (poller, _rx) = Poller::new(
        source.clone(),
        Arc::new(MemoryCache::new()),
        None,
        config_for(&["20game01"], 40),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let runner = poller.clone();
    let handle = tokio::spawn(async move { runner.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(
        source.started() >= 3,
        "ticks must keep firing while requests are in flight, started {}",
        source.started()
    );
    assert_eq!(source.finished(), 0, "no request can have finished yet");

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn immediate_shutdown_fires_no_ticks() {
    let source = Arc::new(ScriptedSource::new());
    let (poller, mut rx) = Poller::new(
        source.clone(),
        Arc::new(MemoryCache::new()),
        None,
        config_for(&["20game01"], 10_000),
    )
    .unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(1), poller.run_with_shutdown(Some(shutdown_rx)))
        .await
        .expect("poller stops without waiting for a tick")
        .unwrap();

    assert_eq!(poller.tick_count(), 0);
    assert_eq!(source.started(), 0);
    assert_eq!(
        drain_events(&mut rx),
        vec![
            PollEvent::Started { configs: 1 },
            PollEvent::Stopped {
                reason: "Shutdown signal".to_string()
            },
        ]
    );
}
