//! # LogWriter: pool events through `tracing`
//!
//! A subscriber that renders every [`Event`] as a structured `tracing` record.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO procvisor: worker up worker=1 pid=4242
//! WARN procvisor: worker down worker=3 pid=4244 exit_code=1
//! INFO procvisor: pool health healthy=true workers_up=3
//! WARN procvisor: worker stall worker=2 since_heartbeat_ms=5003
//! WARN procvisor: kill sweep signal="SIGTERM" live=1
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use crate::worker::WorkerId;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.map(WorkerId::get);
        let signal = e.signal.as_deref();
        let reason = e.reason.as_deref();

        match e.kind {
            EventKind::WorkerUp => {
                tracing::info!(target: "procvisor", worker, pid = e.pid, "worker up");
            }
            EventKind::WorkerDown => {
                tracing::warn!(target: "procvisor", worker, pid = e.pid, exit_code = e.exit_code, signal, "worker down");
            }
            EventKind::WorkerTerminated => {
                tracing::info!(target: "procvisor", worker, "worker terminated");
            }
            EventKind::WorkerHeartbeat => {
                tracing::trace!(target: "procvisor", worker, "worker heartbeat");
            }
            EventKind::WorkerStall => {
                tracing::warn!(target: "procvisor", worker, since_heartbeat_ms = e.delta_ms, "worker stall");
            }
            EventKind::WorkerMessage => {
                tracing::debug!(target: "procvisor", worker, message = ?e.message, "worker message");
            }
            EventKind::WorkerRespawned => {
                tracing::info!(target: "procvisor", worker, pid = e.pid, "worker respawned");
            }
            EventKind::SpawnFailed => {
                tracing::error!(target: "procvisor", worker, reason, "worker spawn failed");
            }
            EventKind::WorkerAllUp => {
                tracing::info!(target: "procvisor", "all workers up");
            }
            EventKind::PoolHealth => {
                tracing::info!(target: "procvisor", healthy = e.healthy, workers_up = e.count, "pool health");
            }
            EventKind::HeartbeatDelta => {
                tracing::trace!(target: "procvisor", worker, delta_ms = e.delta_ms, "heartbeat delta");
            }
            EventKind::StallDelta => {
                tracing::debug!(target: "procvisor", worker, delta_ms = e.delta_ms, "stall delta");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "procvisor", workers = e.count, "shutdown requested");
            }
            EventKind::GentleStopTimeout => {
                tracing::warn!(target: "procvisor", timeout_ms = e.timeout_ms, "gentle stop timed out");
            }
            EventKind::KillSweep => {
                tracing::warn!(target: "procvisor", signal, live = e.count, "kill sweep");
            }
            EventKind::KillTimeout => {
                tracing::warn!(target: "procvisor", signal, timeout_ms = e.timeout_ms, "kill sweep timed out");
            }
            EventKind::ShutdownComplete => {
                tracing::info!(target: "procvisor", "shutdown complete");
            }
            EventKind::SubscriberPanicked | EventKind::SubscriberOverflow => {
                tracing::warn!(target: "procvisor", kind = ?e.kind, reason, "subscriber problem");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
