//! # Pool events emitted by the supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Worker events**: per-worker transitions republished at pool level
//! - **Pool events**: collective readiness and health
//! - **Shutdown events**: progress of the escalating stop sequence
//! - **Subscriber events**: delivery problems inside the [`SubscriberSet`](crate::SubscriberSet)
//!
//! The [`Event`] struct carries additional metadata such as the worker id, exit
//! information, timing deltas and counts.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{Event, EventKind, WorkerId};
//!
//! let ev = Event::new(EventKind::WorkerDown)
//!     .with_worker(WorkerId::new(3))
//!     .with_exit_code(1)
//!     .with_delta(Duration::from_millis(1500));
//!
//! assert_eq!(ev.kind, EventKind::WorkerDown);
//! assert_eq!(ev.worker, Some(WorkerId::new(3)));
//! assert_eq!(ev.exit_code, Some(1));
//! assert_eq!(ev.delta_ms, Some(1500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::worker::{ExitInfo, WorkerId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of pool events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Worker events ===
    /// Worker reported ready and moved `down → up`.
    ///
    /// Sets: `worker`
    WorkerUp,

    /// Worker process exited; worker is now `down`.
    ///
    /// Sets: `worker`, `exit_code` (if any), `signal` (if any)
    WorkerDown,

    /// Worker process exited cleanly and will not be replaced.
    ///
    /// Sets: `worker`
    WorkerTerminated,

    /// Worker sent a heartbeat.
    ///
    /// Sets: `worker`
    WorkerHeartbeat,

    /// Worker has not sent a heartbeat within the stall tolerance.
    ///
    /// Sets: `worker`, `delta_ms` (time since last heartbeat)
    WorkerStall,

    /// Worker sent a message outside the supervisor protocol.
    ///
    /// Sets: `worker`, `message`
    WorkerMessage,

    /// A replacement process was launched for a crashed worker.
    ///
    /// Sets: `worker`, `pid` (if known)
    WorkerRespawned,

    /// Launching a worker process failed; the worker stays down.
    ///
    /// Sets: `worker`, `reason`
    SpawnFailed,

    // === Pool events ===
    /// Every worker of the initial pool reported ready.
    WorkerAllUp,

    /// Pool health was recomputed and broadcast to the workers.
    ///
    /// Sets: `healthy`, `count` (workers up)
    PoolHealth,

    /// Diagnostic: time between two heartbeats of one worker.
    ///
    /// Sets: `worker`, `delta_ms`
    HeartbeatDelta,

    /// Diagnostic: time since the last heartbeat of a stalled worker.
    ///
    /// Sets: `worker`, `delta_ms`
    StallDelta,

    // === Shutdown events ===
    /// Stop requested; respawning is suppressed from here on.
    ///
    /// Sets: `count` (workers tracked)
    ShutdownRequested,

    /// Gentle stop did not finish within `gentle_stop_timeout`.
    ///
    /// Sets: `timeout_ms`
    GentleStopTimeout,

    /// A kill sweep is about to signal the remaining live workers.
    ///
    /// Sets: `signal`, `count` (live workers)
    KillSweep,

    /// A kill sweep did not finish within `kill_timeout`.
    ///
    /// Sets: `signal`, `timeout_ms`
    KillTimeout,

    /// The stop sequence has settled.
    ShutdownComplete,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic info)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`
    SubscriberOverflow,
}

/// Pool event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Worker the event is about, if applicable.
    pub worker: Option<WorkerId>,
    /// Process id, if known.
    pub pid: Option<u32>,
    /// Process exit code.
    pub exit_code: Option<i32>,
    /// Signal name (termination signal or the signal being swept).
    pub signal: Option<Arc<str>>,
    /// Elapsed time in milliseconds (heartbeat deltas).
    pub delta_ms: Option<u64>,
    /// Timeout that expired, in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Worker count (workers up, live workers, tracked workers).
    pub count: Option<usize>,
    /// Pool health verdict.
    pub healthy: Option<bool>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Payload of an external worker message.
    pub message: Option<Arc<serde_json::Value>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            pid: None,
            exit_code: None,
            signal: None,
            delta_ms: None,
            timeout_ms: None,
            count: None,
            healthy: None,
            reason: None,
            message: None,
        }
    }

    /// Attaches a worker id.
    #[inline]
    pub fn with_worker(mut self, id: WorkerId) -> Self {
        self.worker = Some(id);
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Attaches exit code and termination signal of an exited process.
    #[inline]
    pub fn with_exit(mut self, info: &ExitInfo) -> Self {
        self.exit_code = info.code;
        self.signal = info.signal.as_deref().map(Arc::from);
        self
    }

    /// Attaches a signal name.
    #[inline]
    pub fn with_signal(mut self, signal: &str) -> Self {
        self.signal = Some(Arc::from(signal));
        self
    }

    /// Attaches an elapsed duration (stored as milliseconds).
    #[inline]
    pub fn with_delta(mut self, d: Duration) -> Self {
        self.delta_ms = Some(millis(d));
        self
    }

    /// Attaches an expired timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(millis(d));
        self
    }

    /// Attaches a worker count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a health verdict.
    #[inline]
    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = Some(healthy);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an external message payload.
    #[inline]
    pub fn with_message(mut self, message: serde_json::Value) -> Self {
        self.message = Some(Arc::new(message));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    /// True for events published by the stop sequence.
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self.kind,
            EventKind::ShutdownRequested
                | EventKind::GentleStopTimeout
                | EventKind::KillSweep
                | EventKind::KillTimeout
                | EventKind::ShutdownComplete
        )
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::WorkerUp);
        let b = Event::new(EventKind::WorkerUp);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn exit_info_is_copied() {
        let info = ExitInfo {
            code: None,
            signal: Some("SIGKILL".to_string()),
        };
        let ev = Event::new(EventKind::WorkerDown).with_exit(&info);
        assert_eq!(ev.exit_code, None);
        assert_eq!(ev.signal.as_deref(), Some("SIGKILL"));
    }

    #[test]
    fn shutdown_classification() {
        assert!(Event::new(EventKind::KillSweep).is_shutdown());
        assert!(!Event::new(EventKind::WorkerStall).is_shutdown());
    }
}
