//! # Process-launch collaborator.
//!
//! The supervisor never touches OS processes directly. It asks a [`Launch`]
//! implementation for a [`Spawned`] process and from then on talks to it
//! through two halves:
//!
//! ```text
//!              LaunchSpec
//! Supervisor ─────────────► Launch::launch()
//!     ▲                          │
//!     │                          ▼
//!     │                 Spawned { control, events }
//!     │                          │          │
//!     │   send / kill            │          │  ProcessEvent::Message(..)
//!     └──── ProcessControl ◄─────┘          │  ProcessEvent::Exited(..)  (exactly once, last)
//!                                           ▼
//!                                  forwarder task ──► control task
//! ```
//!
//! ## Contract
//! - `events` yields every decoded message in order and then exactly one
//!   [`ProcessEvent::Exited`]; nothing follows it.
//! - [`ProcessControl`] methods never block; failures are reported, not retried.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

use super::handle::WorkerId;
use super::protocol::{ControlMessage, Inbound};
use crate::error::ProcessError;

/// Everything needed to start one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Worker slot this process serves.
    pub worker: WorkerId,
    /// Program to run.
    pub exec: PathBuf,
    /// Interpreter flags, placed before `args`.
    pub exec_argv: Vec<String>,
    /// Program arguments.
    pub args: Vec<String>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Full argument vector: `exec_argv` followed by `args`.
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        self.exec_argv
            .iter()
            .chain(self.args.iter())
            .map(String::as_str)
    }
}

/// Signals used by the kill sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KillSignal {
    /// Polite termination request.
    Term,
    /// Forceful termination.
    Kill,
}

impl KillSignal {
    /// Conventional signal name.
    pub fn name(self) -> &'static str {
        match self {
            KillSignal::Term => "SIGTERM",
            KillSignal::Kill => "SIGKILL",
        }
    }
}

impl fmt::Display for KillSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a process ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited on its own.
    pub code: Option<i32>,
    /// Name of the terminating signal, if it was killed.
    pub signal: Option<String>,
}

impl ExitInfo {
    /// Exit with a status code.
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Termination by a signal.
    pub fn signaled(signal: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: Some(signal.into()),
        }
    }

    /// A clean exit means the worker stopped intentionally: code `0`, no signal.
    pub fn is_clean(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.signal) {
            (Some(code), _) => write!(f, "exited with code {code}"),
            (None, Some(sig)) => write!(f, "killed by {sig}"),
            (None, None) => f.write_str("exited for an unknown reason"),
        }
    }
}

/// Something a running process reported.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    /// A decoded message from the process.
    Message(Inbound),
    /// The process is gone. Always the last event.
    Exited(ExitInfo),
}

/// Control half of a running process.
pub trait ProcessControl: Send + 'static {
    /// OS process id, if the process is (or was) running.
    fn pid(&self) -> Option<u32>;

    /// Queues a protocol message for delivery.
    fn send(&self, msg: ControlMessage) -> Result<(), ProcessError>;

    /// Delivers a signal to the process.
    fn kill(&self, signal: KillSignal) -> Result<(), ProcessError>;
}

/// A freshly launched process.
pub struct Spawned {
    /// Send/kill handle.
    pub control: Box<dyn ProcessControl>,
    /// Messages from the process, terminated by [`ProcessEvent::Exited`].
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

impl fmt::Debug for Spawned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawned")
            .field("pid", &self.control.pid())
            .finish_non_exhaustive()
    }
}

/// Launches worker processes.
///
/// Called from the supervisor's control task; implementations must not block.
pub trait Launch: Send + Sync + 'static {
    /// Starts one process described by `spec`.
    fn launch(&self, spec: &LaunchSpec) -> Result<Spawned, ProcessError>;
}
