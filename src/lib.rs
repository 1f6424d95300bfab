//! # procvisor
//!
//! **Procvisor** supervises a fixed-size pool of OS worker processes.
//!
//! It launches `worker_count` copies of a program, waits for each of them to
//! report ready, keeps crashed ones replaced, watches their heartbeats, tells
//! every worker whether the pool as a whole is healthy, and stops them with an
//! escalating sequence (ask, then `SIGTERM`, then `SIGKILL`).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  worker #1   │   │  worker #2   │   │  worker #N   │
//!     │ (OS process) │   │ (OS process) │   │ (OS process) │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!   stdin ▲  │ stdout    stdin ▲  │ stdout    stdin ▲  │ stdout      JSON lines:
//!         │  ▼                 │  ▼                 │  ▼             {"procvisor": "..."}
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Launch / ProcessControl (CommandLauncher)                        │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  control task (single owner of pool state)                        │
//! │  - Worker slots (id, state, generation)                           │
//! │  - HealthTracker (initializing / steady-state floor)              │
//! │  - HeartbeatBook + monitor tick                                   │
//! └──────┬───────────────────────────────────────────────▲────────────┘
//!        │ publish(Event)                                 │ Command
//!        ▼                                                │
//! ┌─────────────────────────────┐          ┌──────────────┴────────────┐
//! │  Bus (broadcast channel)    │          │  Supervisor               │
//! └──────┬───────────────┬──────┘          │  configure/start/stop     │
//!        ▼               ▼                 │  snapshot/subscribe       │
//!  SubscriberSet    subscribe()            └───────────────────────────┘
//!  ┌─────┼─────┐
//!  ▼     ▼     ▼
//! LogWriter  custom subscribers
//! ```
//!
//! ### Worker lifecycle
//! ```text
//! launch ──► Down (alive) ── "ready" ──► Up
//!                                         │ exit
//!                                         ▼
//!                               Down (dead) ── WorkerDown
//!                                 ├─ exit code 0      ─► WorkerTerminated (slot stays down)
//!                                 ├─ closing          ─► stays down
//!                                 └─ otherwise        ─► Replace ─► launch (same id)
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                      |
//! |-------------------|-------------------------------------------------------------|-----------------------------------------|
//! | **Supervision**   | Configure, start and stop a worker pool.                    | [`Supervisor`], [`ShutdownReport`]      |
//! | **Configuration** | Pool size, health floor, program, timeouts.                 | [`PoolOptions`], [`Settings`]           |
//! | **Processes**     | Pluggable launcher; OS processes by default.                | [`Launch`], [`CommandLauncher`]         |
//! | **Protocol**      | Line-delimited JSON between supervisor and workers.         | [`ControlMessage`], [`WorkerMessage`]   |
//! | **Subscriber API**| Hook into pool events (logging, alerting, stall policy).    | [`Subscribe`], [`Event`]                |
//! | **Errors**        | Typed errors for configuration, runtime and processes.      | [`ConfigError`], [`RuntimeError`]       |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber (renders events through `tracing`).
//!
//! ## Example
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use procvisor::{PoolOptions, Supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn procvisor::Subscribe>> = vec![Arc::new(procvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn procvisor::Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder().with_subscribers(subs).build();
//!     sup.configure(
//!         PoolOptions::new()
//!             .with_worker_count(4)
//!             .with_exec("/usr/local/bin/my-worker")
//!             .with_worker_env(|_| HashMap::new())
//!             .with_gentle_stop_timeout(Duration::from_secs(10)),
//!     )?;
//!     sup.start()?;
//!
//!     tokio::time::sleep(Duration::from_secs(30)).await;
//!     let report = sup.stop().await;
//!     assert!(report.was_gentle());
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use config::{
    DEFAULT_GENTLE_STOP_TIMEOUT, DEFAULT_HEARTBEAT_MONITOR_INTERVAL,
    DEFAULT_HEARTBEAT_STALL_TOLERANCE, DEFAULT_HEARTBEAT_WORKER_INTERVAL, DEFAULT_KILL_TIMEOUT,
    HEARTBEAT_INTERVAL_ENV, PoolOptions, Settings, WORKER_ID_ENV, WorkerEnvFn,
};
pub use core::{Health, Outcome, Raced, ShutdownReport, Supervisor, SupervisorBuilder, Sweep, race};
pub use error::{ConfigError, ProcessError, RuntimeError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use worker::{
    CommandLauncher, ControlMessage, ENVELOPE_KEY, ExitInfo, Inbound, KillSignal, Launch,
    LaunchSpec, ProcessControl, ProcessEvent, Spawned, WorkerId, WorkerMessage, WorkerState,
    decode_line,
};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
