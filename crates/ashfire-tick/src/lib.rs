//! Local animation tick source for Ashfire.
//!
//! Servers that don't send tick messages leave animation pacing to the
//! client. [`TickScheduler`] produces increasing tick numbers at a fixed
//! interval (120 ms by default) and [`spawn_ticker`] drives a callback
//! from it until shut down.
//!
//! # Overruns
//!
//! When a tick is observed late, the ticks that should have fired in the
//! meantime are folded into the tick number instead of fired one by one,
//! so animation catches up in a single step.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         info = scheduler.wait_for_tick() => board.tick(info.tick, &faces),
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the local ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Milliseconds between ticks. 0 disables the ticker (it never fires).
    pub interval_ms: u64,
    /// Random delay (0..max ms) added to the first tick.
    pub initial_jitter_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval_ms: 120,
            initial_jitter_ms: 0,
        }
    }
}

impl TickConfig {
    /// Longest accepted interval.
    pub const MAX_INTERVAL_MS: u64 = 10_000;

    /// A config ticking every `interval_ms` milliseconds.
    pub fn with_interval_ms(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval_ms > Self::MAX_INTERVAL_MS {
            warn!(
                interval_ms = self.interval_ms,
                max = Self::MAX_INTERVAL_MS,
                "tick interval too long, clamping"
            );
            self.interval_ms = Self::MAX_INTERVAL_MS;
        }
        self
    }

    /// Time between ticks, or `None` when disabled.
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_ms > 0).then(|| Duration::from_millis(self.interval_ms))
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// One fired tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number. Starts at 1 and grows by `1 + skipped` per tick.
    pub tick: u32,
    /// Ticks folded into this one because it fired late.
    pub skipped: u32,
    /// Whether this tick fired noticeably late.
    pub overrun: bool,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick source driven by `tokio::time`.
#[derive(Debug)]
pub struct TickScheduler {
    interval: Option<Duration>,
    tick: u32,
    next_tick: Option<Instant>,
    paused: bool,
    total_skipped: u64,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let interval = config.interval();

        let next_tick = interval.map(|d| {
            let jitter = if config.initial_jitter_ms > 0 {
                Duration::from_millis(rand::rng().random_range(0..config.initial_jitter_ms))
            } else {
                Duration::ZERO
            };
            Instant::now() + d + jitter
        });

        match interval {
            Some(d) => debug!(interval_ms = d.as_millis() as u64, "local ticker created"),
            None => debug!("local ticker disabled"),
        }

        Self {
            interval,
            tick: 0,
            next_tick,
            paused: false,
            total_skipped: 0,
        }
    }

    /// Waits for the next tick. Pends forever while paused or disabled.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (next, interval) = match (self.next_tick, self.interval) {
            (Some(next), Some(interval)) if !self.paused => (next, interval),
            _ => return std::future::pending().await,
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let skipped = if overrun {
            u32::try_from(late_by.as_nanos() / interval.as_nanos()).unwrap_or(u32::MAX)
        } else {
            0
        };
        if skipped > 0 {
            warn!(
                tick = self.tick,
                skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "ticker fell behind, skipping ahead"
            );
        }

        self.tick = self.tick.wrapping_add(1).wrapping_add(skipped);
        self.total_skipped += u64::from(skipped);
        self.next_tick = Some(now + interval);
        trace!(tick = self.tick, overrun, "tick");

        TickInfo {
            tick: self.tick,
            skipped,
            overrun,
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick, "ticker paused");
        }
    }

    /// Resumes ticking one interval from now. Time spent paused is not
    /// counted as missed ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            if let Some(interval) = self.interval {
                self.next_tick = Some(Instant::now() + interval);
            }
            debug!(tick = self.tick, "ticker resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    /// The last tick number handed out (0 before the first).
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Ticks skipped over the scheduler's lifetime.
    pub fn total_skipped(&self) -> u64 {
        self.total_skipped
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

/// Spawns a task calling `on_tick` with each tick number until `shutdown`
/// turns `true` or its sender is dropped.
pub fn spawn_ticker<F>(
    config: TickConfig,
    mut shutdown: watch::Receiver<bool>,
    mut on_tick: F,
) -> JoinHandle<()>
where
    F: FnMut(u32) + Send + 'static,
{
    let mut scheduler = TickScheduler::new(config);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                info = scheduler.wait_for_tick() => on_tick(info.tick),
            }
        }
        debug!(tick = scheduler.tick(), "local ticker stopped");
    })
}
