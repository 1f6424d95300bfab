//! Scripted in-memory launcher for tests.
//!
//! Each launch records a [`FakeProcess`] the test can drive: push messages,
//! simulate exits, and inspect what the supervisor sent or signalled. A
//! [`Behavior`] decides how a process reacts to shutdown requests and signals.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::handle::WorkerId;
use super::process::{ExitInfo, KillSignal, Launch, LaunchSpec, ProcessControl, ProcessEvent, Spawned};
use super::protocol::{ControlMessage, Inbound, WorkerMessage};
use crate::error::ProcessError;

/// How a fake process reacts to the supervisor.
#[derive(Debug, Clone, Copy)]
pub struct Behavior {
    /// Exit code used when a shutdown request arrives (`None` = ignore it).
    pub on_shutdown: Option<i32>,
    /// Exit when SIGTERM arrives.
    pub dies_on_term: bool,
    /// Exit when SIGKILL arrives.
    pub dies_on_kill: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            on_shutdown: Some(0),
            dies_on_term: true,
            dies_on_kill: true,
        }
    }
}

impl Behavior {
    /// Ignores every request and signal.
    pub fn immortal() -> Self {
        Self {
            on_shutdown: None,
            dies_on_term: false,
            dies_on_kill: false,
        }
    }
}

type BehaviorFn = dyn Fn(WorkerId) -> Behavior + Send + Sync;

/// One launched fake process.
#[derive(Clone)]
pub struct FakeProcess {
    pub spec: LaunchSpec,
    events: mpsc::UnboundedSender<ProcessEvent>,
    sent: Arc<Mutex<Vec<ControlMessage>>>,
    signals: Arc<Mutex<Vec<KillSignal>>>,
}

impl FakeProcess {
    pub fn worker(&self) -> WorkerId {
        self.spec.worker
    }

    pub fn ready(&self) {
        self.push(ProcessEvent::Message(Inbound::Internal(WorkerMessage::Ready)));
    }

    pub fn heartbeat(&self) {
        self.push(ProcessEvent::Message(Inbound::Internal(WorkerMessage::Heartbeat)));
    }

    pub fn external(&self, value: serde_json::Value) {
        self.push(ProcessEvent::Message(Inbound::External(value)));
    }

    pub fn exit(&self, info: ExitInfo) {
        self.push(ProcessEvent::Exited(info));
    }

    pub fn sent(&self) -> Vec<ControlMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<KillSignal> {
        self.signals.lock().unwrap().clone()
    }

    fn push(&self, ev: ProcessEvent) {
        let _ = self.events.send(ev);
    }
}

struct FakeControl {
    pid: u32,
    behavior: Behavior,
    process: FakeProcess,
}

impl ProcessControl for FakeControl {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn send(&self, msg: ControlMessage) -> Result<(), ProcessError> {
        self.process.sent.lock().unwrap().push(msg);
        if msg == ControlMessage::Shutdown {
            if let Some(code) = self.behavior.on_shutdown {
                self.process.exit(ExitInfo::code(code));
            }
        }
        Ok(())
    }

    fn kill(&self, signal: KillSignal) -> Result<(), ProcessError> {
        self.process.signals.lock().unwrap().push(signal);
        let dies = match signal {
            KillSignal::Term => self.behavior.dies_on_term,
            KillSignal::Kill => self.behavior.dies_on_kill,
        };
        if dies {
            self.process.exit(ExitInfo::signaled(signal.name()));
        }
        Ok(())
    }
}

/// Launcher recording every fake process it creates.
#[derive(Clone)]
pub struct FakeLauncher {
    behavior: Arc<BehaviorFn>,
    launched: Arc<Mutex<Vec<FakeProcess>>>,
    fail: Arc<Mutex<Vec<WorkerId>>>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::with_behavior(|_| Behavior::default())
    }
}

impl FakeLauncher {
    pub fn with_behavior(f: impl Fn(WorkerId) -> Behavior + Send + Sync + 'static) -> Self {
        Self {
            behavior: Arc::new(f),
            launched: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes the next launch for `id` fail.
    pub fn fail_next(&self, id: WorkerId) {
        self.fail.lock().unwrap().push(id);
    }

    /// All processes launched so far, in launch order.
    pub fn launched(&self) -> Vec<FakeProcess> {
        self.launched.lock().unwrap().clone()
    }

    /// Most recent process launched for `id`.
    pub fn latest(&self, id: WorkerId) -> FakeProcess {
        self.launched()
            .into_iter()
            .rev()
            .find(|p| p.worker() == id)
            .expect("no process launched for worker")
    }

    pub fn launch_count(&self, id: WorkerId) -> usize {
        self.launched().iter().filter(|p| p.worker() == id).count()
    }
}

impl Launch for FakeLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Spawned, ProcessError> {
        {
            let mut fail = self.fail.lock().unwrap();
            if let Some(pos) = fail.iter().position(|id| *id == spec.worker) {
                fail.remove(pos);
                return Err(ProcessError::Spawn(std::io::Error::other("scripted failure")));
            }
        }

        let (tx, events) = mpsc::unbounded_channel();
        let process = FakeProcess {
            spec: spec.clone(),
            events: tx,
            sent: Arc::default(),
            signals: Arc::default(),
        };
        let mut launched = self.launched.lock().unwrap();
        let pid = 1000 + launched.len() as u32;
        launched.push(process.clone());

        Ok(Spawned {
            control: Box::new(FakeControl {
                pid,
                behavior: (self.behavior)(spec.worker),
                process,
            }),
            events,
        })
    }
}
