//! Integration tests for the local ticker.
//!
//! Uses paused tokio time so `sleep_until` resolves as soon as the clock
//! is auto-advanced.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ashfire_tick::{TickConfig, TickScheduler, spawn_ticker};
use tokio::sync::watch;

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_120ms() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.interval(), Some(Duration::from_millis(120)));
    assert_eq!(cfg.initial_jitter_ms, 0);
}

#[test]
fn test_zero_interval_is_disabled() {
    assert_eq!(TickConfig::with_interval_ms(0).interval(), None);
}

#[test]
fn test_validated_clamps_interval() {
    let cfg = TickConfig::with_interval_ms(60_000).validated();
    assert_eq!(cfg.interval_ms, TickConfig::MAX_INTERVAL_MS);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_increments_from_one() {
    let mut s = TickScheduler::new(TickConfig::default());
    assert_eq!(s.tick(), 0);

    for expected in 1..=4 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.skipped, 0);
        assert!(!info.overrun);
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_tick_folds_missed_ticks() {
    let mut s = TickScheduler::new(TickConfig::with_interval_ms(100));
    s.wait_for_tick().await;

    // Stall for three and a half intervals past the next deadline.
    tokio::time::advance(Duration::from_millis(450)).await;
    let info = s.wait_for_tick().await;

    assert!(info.overrun);
    assert_eq!(info.skipped, 3);
    assert_eq!(info.tick, 5);
    assert_eq!(s.total_skipped(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_never_fires() {
    let mut s = TickScheduler::new(TickConfig::with_interval_ms(0));
    assert!(s.is_disabled());

    let result = tokio::time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;
    assert!(result.is_err(), "disabled ticker should pend forever");
}

// =========================================================================
// Pause / Resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_pause_prevents_ticks() {
    let mut s = TickScheduler::new(TickConfig::default());
    s.wait_for_tick().await;

    s.pause();
    assert!(s.is_paused());

    let result = tokio::time::timeout(Duration::from_secs(1), s.wait_for_tick()).await;
    assert!(result.is_err(), "paused ticker should pend");
}

#[tokio::test(start_paused = true)]
async fn test_resume_does_not_count_paused_time() {
    let mut s = TickScheduler::new(TickConfig::default());
    s.wait_for_tick().await;
    s.pause();
    tokio::time::advance(Duration::from_secs(10)).await;
    s.resume();

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 2);
    assert_eq!(info.skipped, 0);
}

#[tokio::test]
async fn test_pause_resume_idempotent() {
    let mut s = TickScheduler::new(TickConfig::default());

    s.pause();
    s.pause();
    assert!(s.is_paused());

    s.resume();
    s.resume();
    assert!(!s.is_paused());
}

// =========================================================================
// spawn_ticker
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_spawn_ticker_runs_until_shutdown() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let (tx, rx) = watch::channel(false);

    let handle = spawn_ticker(TickConfig::default(), rx, move |tick| {
        sink.lock().unwrap().push(tick);
    });

    tokio::time::sleep(Duration::from_millis(400)).await;
    tx.send(true).unwrap();
    handle.await.unwrap();

    let ticks = seen.lock().unwrap().clone();
    assert_eq!(ticks, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_ticker_stops_when_sender_dropped() {
    let (tx, rx) = watch::channel(false);
    let handle = spawn_ticker(TickConfig::default(), rx, |_| {});

    drop(tx);

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("ticker should stop")
        .unwrap();
}
