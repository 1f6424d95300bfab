//! # Worker: one logical slot of the pool.
//!
//! A [`Worker`] outlives the processes that serve it. When a process crashes the
//! supervisor swaps a new one in with [`Worker::set_process`]; the id, the status
//! channel and every receiver handed out earlier stay valid.
//!
//! ## State
//! ```text
//!            ready                 exit
//!   Down ───────────► Up ───────────────► Down
//!    ▲                                      │
//!    └──── set_process (replacement) ◄──────┘
//! ```
//!
//! `state` and liveness are separate: a freshly launched process is alive but
//! still `Down` until it reports ready.

use std::fmt;

use tokio::sync::{mpsc, oneshot, watch};

use super::process::{KillSignal, ProcessControl, ProcessEvent, Spawned};
use super::protocol::ControlMessage;
use crate::error::ProcessError;

/// Stable identifier of a worker slot (`1..=worker_count`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u32);

impl WorkerId {
    /// Wraps a raw slot number.
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    /// Raw slot number.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Readiness of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Not ready (starting, exited, or retired).
    Down,
    /// Reported ready and still running.
    Up,
}

/// Snapshot published on a worker's status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStatus {
    /// Readiness.
    pub state: WorkerState,
    /// Whether the current process is still running.
    pub alive: bool,
}

/// Supervisor-side handle of one pool slot.
pub struct Worker {
    id: WorkerId,
    status: watch::Sender<WorkerStatus>,
    process: Option<Box<dyn ProcessControl>>,
    generation: u64,
    ready: Option<oneshot::Sender<()>>,
}

impl Worker {
    /// Creates a worker in state `Down` with no process attached.
    ///
    /// Returns the worker and a receiver resolved the first time it becomes ready.
    pub fn new(id: WorkerId) -> (Self, oneshot::Receiver<()>) {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (status, _) = watch::channel(WorkerStatus {
            state: WorkerState::Down,
            alive: false,
        });
        let worker = Self {
            id,
            status,
            process: None,
            generation: 0,
            ready: Some(ready_tx),
        };
        (worker, ready_rx)
    }

    /// Slot id.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Current readiness.
    pub fn state(&self) -> WorkerState {
        self.status.borrow().state
    }

    /// True when no process is running for this worker.
    pub fn is_dead(&self) -> bool {
        !self.status.borrow().alive
    }

    /// Generation of the current process (increments on every `set_process`).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pid of the current process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.pid())
    }

    /// Subscribes to status changes. The current value is observed immediately.
    pub fn watch(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    /// Attaches a new process, returning its generation and event stream.
    ///
    /// The worker goes back to `Down` until the new process reports ready.
    pub fn set_process(&mut self, spawned: Spawned) -> (u64, mpsc::UnboundedReceiver<ProcessEvent>) {
        self.process = Some(spawned.control);
        self.generation += 1;
        self.status.send_replace(WorkerStatus {
            state: WorkerState::Down,
            alive: true,
        });
        (self.generation, spawned.events)
    }

    /// Moves `Down → Up`. Returns `false` if the worker was already up or is dead.
    pub fn mark_up(&mut self) -> bool {
        let changed = self.status.send_if_modified(|s| {
            if s.alive && s.state == WorkerState::Down {
                s.state = WorkerState::Up;
                true
            } else {
                false
            }
        });
        if changed {
            if let Some(tx) = self.ready.take() {
                let _ = tx.send(());
            }
        }
        changed
    }

    /// Records that the current process exited.
    pub fn mark_exited(&mut self) {
        self.status.send_replace(WorkerStatus {
            state: WorkerState::Down,
            alive: false,
        });
    }

    /// Sends a protocol message to the current process.
    pub fn send(&self, msg: ControlMessage) -> Result<(), ProcessError> {
        match &self.process {
            Some(p) if !self.is_dead() => p.send(msg),
            _ => Err(ProcessError::Exited),
        }
    }

    /// Signals the current process.
    pub fn kill(&self, signal: KillSignal) -> Result<(), ProcessError> {
        match &self.process {
            Some(p) if !self.is_dead() => p.kill(signal),
            _ => Err(ProcessError::Exited),
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("status", &*self.status.borrow())
            .field("generation", &self.generation)
            .field("pid", &self.pid())
            .finish()
    }
}
