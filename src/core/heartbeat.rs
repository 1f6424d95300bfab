//! # Heartbeat bookkeeping and stall detection.
//!
//! Two independent clocks are involved:
//! - each worker sends `heartbeat` every `heartbeat_worker_interval` (child side);
//! - the supervisor ticks every `heartbeat_monitor_interval` and compares
//!   "time since last heartbeat" against `heartbeat_stall_tolerance`.
//!
//! ```text
//! worker ── heartbeat ──► control task ──► HeartbeatBook::record()  ──► HeartbeatDelta
//! monitor task ── tick ─► control task ──► HeartbeatBook::stalled() ──► WorkerStall + StallDelta
//! ```
//!
//! A worker that never sent a heartbeat is measured from the moment monitoring
//! began. Stalls are reported, never acted upon: once per silence episode, the
//! next heartbeat re-arms the report.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::worker::WorkerId;

/// Last-heartbeat timestamps per worker.
#[derive(Debug, Default)]
pub struct HeartbeatBook {
    last: HashMap<WorkerId, Instant>,
    reported: HashSet<WorkerId>,
    started_at: Option<Instant>,
}

impl HeartbeatBook {
    /// Marks the start of monitoring (fallback "last heartbeat" for every worker).
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Stores a heartbeat, returning the time since the previous one (or since
    /// monitoring began). `None` when neither exists yet.
    pub fn record(&mut self, id: WorkerId, now: Instant) -> Option<Duration> {
        let since = self.last.get(&id).copied().or(self.started_at);
        self.last.insert(id, now);
        self.reported.remove(&id);
        since.map(|t| now.saturating_duration_since(t))
    }

    /// A new process took over `id`: measure it from `now`, not from its predecessor.
    pub fn reset(&mut self, id: WorkerId, now: Instant) {
        if self.started_at.is_some() {
            self.last.insert(id, now);
        }
        self.reported.remove(&id);
    }

    /// Time since the last heartbeat of `id` if it reaches `tolerance` and this
    /// silence has not been reported yet. Marks it reported.
    ///
    /// Returns `None` before monitoring has started.
    pub fn stalled(&mut self, id: WorkerId, now: Instant, tolerance: Duration) -> Option<Duration> {
        let since = self.last.get(&id).copied().or(self.started_at)?;
        let elapsed = now.saturating_duration_since(since);
        if elapsed < tolerance || !self.reported.insert(id) {
            return None;
        }
        Some(elapsed)
    }
}

/// Spawns the periodic monitor tick.
///
/// The first tick fires one `period` after the call. The task ends when `token`
/// is cancelled or the receiving side is gone.
pub fn spawn_monitor<T: Send + 'static>(
    period: Duration,
    tick: impl Fn() -> T + Send + 'static,
    tx: mpsc::UnboundedSender<T>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if tx.send(tick()).is_err() {
                        break;
                    }
                }
            }
        }
    });
}
