//! # Pool control task: lifecycle, process exits, health and heartbeats.
//!
//! All mutable supervisor state lives in [`Pool`] and is touched only by the
//! single task running [`Pool::run`]. Everything else talks to it through two
//! queues:
//!
//! ```text
//! Supervisor ── Command ──────────────┐
//!                                     ▼
//! forwarder(id, gen) ── Report ──► Pool::run ──► Bus.publish(Event)
//! ready join        ── Report ──►     │
//! monitor tick      ── Report ──►     ├──► Worker::send / Worker::kill
//! Pool itself (Replace) ── Report ─►  └──► Launch::launch
//! ```
//!
//! ## Rules
//! - Handlers run to completion; no lock is ever taken on pool state.
//! - A crash enqueues `Report::Replace` instead of relaunching inline, so the
//!   `WorkerDown` event is out before the replacement process exists.
//! - Reports carry the process generation; reports from a replaced process are dropped.
//! - Nothing is launched while `closing` is set.
//! - The task ends when every command sender is dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::health::HealthTracker;
use super::heartbeat::{HeartbeatBook, spawn_monitor};
use crate::config::Settings;
use crate::events::{Bus, Event, EventKind};
use crate::worker::{
    ControlMessage, ExitInfo, Inbound, KillSignal, Launch, ProcessEvent, Spawned, Worker, WorkerId,
    WorkerMessage, WorkerState, WorkerStatus,
};

/// Requests from [`Supervisor`](crate::Supervisor) handles.
pub(crate) enum Command {
    /// Clear `closing` and create the pool if it does not exist yet.
    Start,
    /// Gentle-stop phase: set `closing`, broadcast `shutdown`, reply with every tracked worker.
    RequestShutdown {
        reply: oneshot::Sender<Vec<watch::Receiver<WorkerStatus>>>,
    },
    /// Kill sweep: signal every live worker, reply with the ones signalled.
    Sweep {
        signal: KillSignal,
        reply: oneshot::Sender<Vec<watch::Receiver<WorkerStatus>>>,
    },
    /// Stop sequence settled: stop heartbeat monitoring.
    FinishShutdown,
    /// Current state of every worker, ascending id.
    Snapshot {
        reply: oneshot::Sender<Vec<(WorkerId, WorkerState)>>,
    },
}

/// Internal reports, processed in arrival order.
enum Report {
    Process {
        id: WorkerId,
        generation: u64,
        event: ProcessEvent,
    },
    AllReady,
    MonitorTick,
    Replace(WorkerId),
}

pub(crate) struct Pool {
    settings: Arc<Settings>,
    bus: Bus,
    launcher: Arc<dyn Launch>,
    workers: BTreeMap<WorkerId, Worker>,
    health: HealthTracker,
    heartbeats: HeartbeatBook,
    closing: bool,
    pool_created: bool,
    reports: mpsc::UnboundedSender<Report>,
    token: CancellationToken,
    monitor: Option<CancellationToken>,
}

impl Pool {
    /// Spawns the control task and returns its command queue.
    pub(crate) fn spawn(
        settings: Arc<Settings>,
        bus: Bus,
        launcher: Arc<dyn Launch>,
        parent: &CancellationToken,
    ) -> mpsc::UnboundedSender<Command> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (rep_tx, rep_rx) = mpsc::unbounded_channel();
        let pool = Pool {
            health: HealthTracker::new(settings.worker_count, settings.min_worker_count),
            settings,
            bus,
            launcher,
            workers: BTreeMap::new(),
            heartbeats: HeartbeatBook::default(),
            closing: false,
            pool_created: false,
            reports: rep_tx,
            token: parent.child_token(),
            monitor: None,
        };
        tokio::spawn(pool.run(cmd_rx, rep_rx));
        cmd_tx
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut reports: mpsc::UnboundedReceiver<Report>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(report) = reports.recv() => self.handle_report(report),
            }
        }
        self.token.cancel();
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start => {
                self.closing = false;
                if !self.pool_created {
                    self.create_worker_pool();
                }
            }
            Command::RequestShutdown { reply } => {
                let _ = reply.send(self.request_shutdown());
            }
            Command::Sweep { signal, reply } => {
                let _ = reply.send(self.sweep(signal));
            }
            Command::FinishShutdown => {
                if let Some(monitor) = self.monitor.take() {
                    monitor.cancel();
                }
            }
            Command::Snapshot { reply } => {
                let snapshot = self
                    .workers
                    .values()
                    .map(|w| (w.id(), w.state()))
                    .collect();
                let _ = reply.send(snapshot);
            }
        }
    }

    fn handle_report(&mut self, report: Report) {
        match report {
            Report::Process {
                id,
                generation,
                event,
            } => {
                let current = self.workers.get(&id).map(Worker::generation);
                if current != Some(generation) {
                    tracing::debug!(worker = %id, generation, "dropping report from replaced process");
                    return;
                }
                match event {
                    ProcessEvent::Message(Inbound::Internal(WorkerMessage::Ready)) => self.on_ready(id),
                    ProcessEvent::Message(Inbound::Internal(WorkerMessage::Heartbeat)) => {
                        self.record_heartbeat(id)
                    }
                    ProcessEvent::Message(Inbound::External(value)) => self.bus.publish(
                        Event::new(EventKind::WorkerMessage)
                            .with_worker(id)
                            .with_message(value),
                    ),
                    ProcessEvent::Exited(info) => self.on_exit(id, info),
                }
            }
            Report::AllReady => self.on_all_ready(),
            Report::MonitorTick => self.monitor_heartbeat(),
            Report::Replace(id) => self.replace_worker_process(id),
        }
    }

    // ---------------------------
    // Lifecycle
    // ---------------------------

    /// Launches one process per slot and joins on their first readiness.
    fn create_worker_pool(&mut self) {
        self.pool_created = true;

        let ids: Vec<WorkerId> = self.settings.worker_ids().collect();
        let mut ready = Vec::with_capacity(ids.len());
        for id in ids {
            let (mut worker, ready_rx) = Worker::new(id);
            if let Some(spawned) = self.launch(id) {
                let (generation, events) = worker.set_process(spawned);
                forward(id, generation, events, self.reports.clone());
            }
            ready.push(ready_rx);
            self.workers.insert(id, worker);
        }

        let reports = self.reports.clone();
        tokio::spawn(async move {
            let results = join_all(ready).await;
            if results.iter().all(Result::is_ok) {
                let _ = reports.send(Report::AllReady);
            }
        });
    }

    /// Relaunches a crashed worker in place; same `Worker`, same id, next generation.
    fn replace_worker_process(&mut self, id: WorkerId) {
        if self.closing {
            tracing::debug!(worker = %id, "closing; not replacing worker");
            return;
        }
        if !self.workers.get(&id).is_some_and(Worker::is_dead) {
            return;
        }
        let Some(spawned) = self.launch(id) else {
            return;
        };
        let Some(worker) = self.workers.get_mut(&id) else {
            return;
        };
        let (generation, events) = worker.set_process(spawned);
        let pid = worker.pid();
        forward(id, generation, events, self.reports.clone());
        self.heartbeats.reset(id, Instant::now());
        self.bus.publish(
            Event::new(EventKind::WorkerRespawned)
                .with_worker(id)
                .with_pid(pid),
        );
    }

    fn launch(&self, id: WorkerId) -> Option<Spawned> {
        let spec = self.settings.launch_spec(id);
        match self.launcher.launch(&spec) {
            Ok(spawned) => Some(spawned),
            Err(err) => {
                tracing::warn!(worker = %id, error = %err, label = err.as_label(), "failed to launch worker");
                self.bus.publish(
                    Event::new(EventKind::SpawnFailed)
                        .with_worker(id)
                        .with_reason(err.to_string()),
                );
                None
            }
        }
    }

    fn on_all_ready(&mut self) {
        self.heartbeats.start(Instant::now());
        if !self.closing && self.monitor.is_none() {
            let token = self.token.child_token();
            spawn_monitor(
                self.settings.heartbeat_monitor_interval,
                || Report::MonitorTick,
                self.reports.clone(),
                token.clone(),
            );
            self.monitor = Some(token);
        }
        self.bus.publish(Event::new(EventKind::WorkerAllUp));
    }

    fn on_ready(&mut self, id: WorkerId) {
        let Some(worker) = self.workers.get_mut(&id) else {
            return;
        };
        if worker.mark_up() {
            let pid = worker.pid();
            self.bus
                .publish(Event::new(EventKind::WorkerUp).with_worker(id).with_pid(pid));
            self.recompute_health();
        }
    }

    /// Exit of the current process: down first, then terminate or schedule a replacement.
    fn on_exit(&mut self, id: WorkerId, info: ExitInfo) {
        let Some(worker) = self.workers.get_mut(&id) else {
            return;
        };
        let pid = worker.pid();
        worker.mark_exited();
        self.bus.publish(
            Event::new(EventKind::WorkerDown)
                .with_worker(id)
                .with_pid(pid)
                .with_exit(&info),
        );
        self.recompute_health();

        if info.is_clean() {
            self.bus
                .publish(Event::new(EventKind::WorkerTerminated).with_worker(id));
        } else if !self.closing {
            tracing::debug!(worker = %id, exit = %info, "worker crashed; scheduling replacement");
            let _ = self.reports.send(Report::Replace(id));
        } else {
            tracing::debug!(worker = %id, exit = %info, "worker exited while closing");
        }
    }

    // ---------------------------
    // Health
    // ---------------------------

    /// Recomputes pool health and broadcasts it to every worker, changed or not.
    fn recompute_health(&mut self) {
        let up = self
            .workers
            .values()
            .filter(|w| w.state() == WorkerState::Up)
            .count();
        let health = self.health.recompute(up);
        self.broadcast(health.message());
        self.bus.publish(
            Event::new(EventKind::PoolHealth)
                .with_healthy(health.is_healthy())
                .with_count(up),
        );
    }

    fn broadcast(&self, msg: ControlMessage) {
        for worker in self.workers.values() {
            if let Err(err) = worker.send(msg) {
                tracing::debug!(worker = %worker.id(), ?msg, error = %err, "message not delivered");
            }
        }
    }

    // ---------------------------
    // Heartbeats
    // ---------------------------

    fn record_heartbeat(&mut self, id: WorkerId) {
        self.bus
            .publish(Event::new(EventKind::WorkerHeartbeat).with_worker(id));
        if let Some(delta) = self.heartbeats.record(id, Instant::now()) {
            self.bus.publish(
                Event::new(EventKind::HeartbeatDelta)
                    .with_worker(id)
                    .with_delta(delta),
            );
        }
    }

    fn monitor_heartbeat(&mut self) {
        let now = Instant::now();
        let tolerance = self.settings.heartbeat_stall_tolerance;
        for worker in self.workers.values().filter(|w| !w.is_dead()) {
            let id = worker.id();
            if let Some(elapsed) = self.heartbeats.stalled(id, now, tolerance) {
                self.bus.publish(
                    Event::new(EventKind::WorkerStall)
                        .with_worker(id)
                        .with_delta(elapsed),
                );
                self.bus.publish(
                    Event::new(EventKind::StallDelta)
                        .with_worker(id)
                        .with_delta(elapsed),
                );
            }
        }
    }

    // ---------------------------
    // Shutdown
    // ---------------------------

    fn request_shutdown(&mut self) -> Vec<watch::Receiver<WorkerStatus>> {
        self.closing = true;
        self.bus.publish(
            Event::new(EventKind::ShutdownRequested).with_count(self.workers.len()),
        );
        self.broadcast(ControlMessage::Shutdown);
        self.workers.values().map(Worker::watch).collect()
    }

    fn sweep(&mut self, signal: KillSignal) -> Vec<watch::Receiver<WorkerStatus>> {
        let live: Vec<&Worker> = self.workers.values().filter(|w| !w.is_dead()).collect();
        self.bus.publish(
            Event::new(EventKind::KillSweep)
                .with_signal(signal.name())
                .with_count(live.len()),
        );
        for worker in &live {
            if let Err(err) = worker.kill(signal) {
                tracing::warn!(worker = %worker.id(), %signal, error = %err, "failed to signal worker");
            }
        }
        live.into_iter().map(Worker::watch).collect()
    }
}

/// Feeds one process's events into the control task, tagged with its generation.
fn forward(
    id: WorkerId,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
    reports: mpsc::UnboundedSender<Report>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let last = matches!(event, ProcessEvent::Exited(_));
            if reports
                .send(Report::Process {
                    id,
                    generation,
                    event,
                })
                .is_err()
                || last
            {
                break;
            }
        }
    });
}
