//! # Supervisor: configures, starts and stops a pool of worker processes.
//!
//! The [`Supervisor`] is a cheap facade. It owns the event bus, the
//! [`SubscriberSet`] and the resolved [`Settings`]; every piece of pool state
//! lives in the control task spawned on the first [`Supervisor::start`].
//!
//! ## Key responsibilities
//! - validate options once ([`Supervisor::configure`])
//! - spawn the control task and create the pool ([`Supervisor::start`])
//! - drive the escalating stop sequence ([`Supervisor::stop`])
//! - expose pool events ([`Supervisor::subscribe`]) and state ([`Supervisor::snapshot`])
//!
//! ## High-level architecture
//! ```text
//! configure(PoolOptions) ──► Settings::resolve ──► OnceLock<Arc<Settings>>
//!
//! start():
//!   Pool::spawn(settings, bus, launcher, token) ──► control task
//!   Command::Start ──► create_worker_pool()
//!                        ├─ Launch::launch(spec(id))  for id in 1..=worker_count
//!                        └─ join(first ready of all)  ──► WorkerAllUp + heartbeat monitor
//!
//! Event flow:
//!   control task ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet::emit(&Event)
//!                                          └──► subscribe() receivers
//!
//! stop():
//!   shutdown::run()
//!     ├─ RequestShutdown  closing = true, broadcast `shutdown`   wait all down  ≤ gentle_stop_timeout
//!     ├─ Sweep(SIGTERM)   signal live workers                    wait all dead  ≤ kill_timeout
//!     ├─ Sweep(SIGKILL)   signal live workers                    wait all dead  ≤ kill_timeout
//!     └─ FinishShutdown + ShutdownComplete
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use procvisor::{PoolOptions, Subscribe, Supervisor};
//! #[cfg(feature = "logging")]
//! use procvisor::LogWriter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!     #[cfg(feature = "logging")]
//!     subs.push(Arc::new(LogWriter::new()));
//!
//!     let sup = Supervisor::builder().with_subscribers(subs).build();
//!     sup.configure(
//!         PoolOptions::new()
//!             .with_worker_count(4)
//!             .with_exec("/usr/local/bin/my-worker")
//!             .with_worker_env(|id| HashMap::from([("SHARD".into(), id.to_string())])),
//!     )?;
//!     sup.start()?;
//!
//!     let report = sup.run_until_signal().await?;
//!     println!("stopped gently: {}", report.was_gentle());
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, OnceLock};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::builder::SupervisorBuilder;
use super::pool::{Command, Pool};
use super::shutdown::{self, ShutdownReport};
use super::signals;
use crate::config::{PoolOptions, Settings};
use crate::error::{ConfigError, RuntimeError};
use crate::events::{Bus, Event};
use crate::subscribers::SubscriberSet;
use crate::worker::{Launch, WorkerId, WorkerState};

/// Supervises a fixed-size pool of worker processes.
pub struct Supervisor {
    pub(super) bus: Bus,
    pub(super) subs: Arc<SubscriberSet>,
    launcher: Arc<dyn Launch>,
    settings: OnceLock<Arc<Settings>>,
    control: OnceLock<mpsc::UnboundedSender<Command>>,
    token: CancellationToken,
}

impl Supervisor {
    /// Creates a new builder for constructing a Supervisor.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    pub(super) fn new_internal(
        bus: Bus,
        subs: Arc<SubscriberSet>,
        launcher: Arc<dyn Launch>,
        token: CancellationToken,
    ) -> Self {
        Self {
            bus,
            subs,
            launcher,
            settings: OnceLock::new(),
            control: OnceLock::new(),
            token,
        }
    }

    /// Validates `opts` and stores the resulting settings.
    ///
    /// # Errors
    /// - [`ConfigError::AlreadyConfigured`] on every call after the first successful one
    /// - any validation error from [`Settings::resolve`]
    pub fn configure(&self, opts: PoolOptions) -> Result<(), ConfigError> {
        if self.settings.get().is_some() {
            return Err(ConfigError::AlreadyConfigured);
        }
        let settings = Arc::new(Settings::resolve(opts)?);
        tracing::debug!(?settings, "supervisor configured");
        self.settings
            .set(settings)
            .map_err(|_| ConfigError::AlreadyConfigured)
    }

    /// Resolved settings, once configured.
    pub fn settings(&self) -> Option<&Settings> {
        self.settings.get().map(Arc::as_ref)
    }

    /// Creates the pool on first call; later calls only clear the `closing` flag.
    ///
    /// Returns immediately: readiness is reported through
    /// [`EventKind::WorkerUp`](crate::EventKind::WorkerUp) and
    /// [`EventKind::WorkerAllUp`](crate::EventKind::WorkerAllUp).
    ///
    /// # Errors
    /// - [`RuntimeError::NotConfigured`] if [`configure`](Self::configure) was not called
    /// - [`RuntimeError::ControlClosed`] if the control task has stopped
    pub fn start(&self) -> Result<(), RuntimeError> {
        let settings = self.settings.get().ok_or(RuntimeError::NotConfigured)?;
        let control = self.control.get_or_init(|| {
            Pool::spawn(
                Arc::clone(settings),
                self.bus.clone(),
                Arc::clone(&self.launcher),
                &self.token,
            )
        });
        control
            .send(Command::Start)
            .map_err(|_| RuntimeError::ControlClosed)
    }

    /// Runs the escalating stop sequence and resolves once it has settled.
    ///
    /// Never fails: phases that time out are recorded in the returned report.
    /// A supervisor that was never started settles at once with a default report.
    pub async fn stop(&self) -> ShutdownReport {
        let (Some(control), Some(settings)) = (self.control.get(), self.settings.get()) else {
            return ShutdownReport::default();
        };
        shutdown::run(control, &self.bus, settings).await
    }

    /// State of every worker, ascending id.
    ///
    /// Empty before [`start`](Self::start).
    ///
    /// # Errors
    /// [`RuntimeError::ControlClosed`] if the control task has stopped.
    pub async fn snapshot(&self) -> Result<Vec<(WorkerId, WorkerState)>, RuntimeError> {
        let Some(control) = self.control.get() else {
            return Ok(Vec::new());
        };
        let (reply, rx) = oneshot::channel();
        control
            .send(Command::Snapshot { reply })
            .map_err(|_| RuntimeError::ControlClosed)?;
        rx.await.map_err(|_| RuntimeError::ControlClosed)
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Waits for SIGINT, SIGTERM or SIGQUIT, then runs [`stop`](Self::stop).
    ///
    /// # Errors
    /// [`RuntimeError::Signal`] if the signal handlers cannot be installed.
    pub async fn run_until_signal(&self) -> Result<ShutdownReport, RuntimeError> {
        signals::wait_for_shutdown_signal()
            .await
            .map_err(RuntimeError::Signal)?;
        Ok(self.stop().await)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::core::shutdown::{Outcome, Sweep};
    use crate::events::EventKind;
    use crate::worker::fake::{Behavior, FakeLauncher};
    use crate::worker::{ControlMessage, ExitInfo, KillSignal};

    const W1: WorkerId = WorkerId::new(1);
    const W2: WorkerId = WorkerId::new(2);
    const W3: WorkerId = WorkerId::new(3);

    fn options(n: usize) -> PoolOptions {
        PoolOptions::new()
            .with_worker_count(n)
            .with_worker_env(|_| HashMap::new())
            .with_exec("/opt/worker")
    }

    fn supervisor(launcher: &FakeLauncher, opts: PoolOptions) -> Arc<Supervisor> {
        let sup = Supervisor::builder()
            .with_launcher(Arc::new(launcher.clone()))
            .build();
        sup.configure(opts).unwrap();
        sup
    }

    async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        let find = async {
            loop {
                let ev = rx.recv().await.expect("bus closed");
                if ev.kind == kind {
                    return ev;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(60), find)
            .await
            .unwrap_or_else(|_| panic!("{kind:?} was not published"))
    }

    /// Starts the pool and makes every worker ready.
    async fn start_all_up(sup: &Supervisor, launcher: &FakeLauncher, rx: &mut broadcast::Receiver<Event>) {
        sup.start().unwrap();
        sup.snapshot().await.unwrap();
        for p in launcher.launched() {
            p.ready();
        }
        wait_for(rx, EventKind::WorkerAllUp).await;
    }

    #[tokio::test(start_paused = true)]
    async fn configure_once_and_start_after_configure() {
        let sup = Supervisor::builder()
            .with_launcher(Arc::new(FakeLauncher::default()))
            .build();
        assert!(matches!(sup.start(), Err(RuntimeError::NotConfigured)));
        assert!(sup.settings().is_none());

        sup.configure(options(2)).unwrap();
        assert!(matches!(
            sup.configure(options(3)),
            Err(ConfigError::AlreadyConfigured)
        ));
        assert_eq!(sup.settings().unwrap().worker_count, 2);
        assert!(sup.snapshot().await.unwrap().is_empty());
        assert_eq!(sup.stop().await, ShutdownReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_options_leave_supervisor_unconfigured() {
        let sup = Supervisor::builder()
            .with_launcher(Arc::new(FakeLauncher::default()))
            .build();
        let err = sup
            .configure(options(2).with_min_worker_count(3))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MinWorkerCountExceeds { min: 3, count: 2 }));

        let err = sup
            .configure(options(1).with_heartbeat_monitor_interval(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroDuration("heartbeat_monitor_interval")));
        assert!(matches!(sup.start(), Err(RuntimeError::NotConfigured)));

        sup.configure(options(2)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_launches_pool_with_worker_environment() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(3).with_args(["--serve"]));
        sup.start().unwrap();

        let snapshot = sup.snapshot().await.unwrap();
        assert_eq!(
            snapshot,
            vec![
                (W1, WorkerState::Down),
                (W2, WorkerState::Down),
                (W3, WorkerState::Down)
            ]
        );
        let spec = launcher.latest(W2).spec;
        assert_eq!(spec.args, vec!["--serve".to_string()]);
        assert_eq!(spec.env.get("PROCVISOR_WORKER_ID").map(String::as_str), Some("2"));
        assert_eq!(
            spec.env.get("PROCVISOR_HEARTBEAT_INTERVAL").map(String::as_str),
            Some("500")
        );

        // A second start neither relaunches nor fails.
        sup.start().unwrap();
        sup.snapshot().await.unwrap();
        assert_eq!(launcher.launched().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_workers_come_up_and_pool_turns_healthy() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(2));
        let mut rx = sup.subscribe();

        sup.start().unwrap();
        sup.snapshot().await.unwrap();
        launcher.latest(W1).ready();
        let up = wait_for(&mut rx, EventKind::WorkerUp).await;
        assert_eq!(up.worker, Some(W1));
        assert_eq!(up.pid, Some(1000));
        let health = wait_for(&mut rx, EventKind::PoolHealth).await;
        assert_eq!(health.healthy, Some(false));

        launcher.latest(W2).ready();
        let health = wait_for(&mut rx, EventKind::PoolHealth).await;
        assert_eq!(health.healthy, Some(true));
        assert_eq!(health.count, Some(2));
        wait_for(&mut rx, EventKind::WorkerAllUp).await;

        assert_eq!(
            launcher.latest(W1).sent(),
            vec![ControlMessage::Unhealthy, ControlMessage::Healthy]
        );
        assert_eq!(
            sup.snapshot().await.unwrap(),
            vec![(W1, WorkerState::Up), (W2, WorkerState::Up)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_worker_is_replaced_after_down_event() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(4));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        launcher.latest(W3).exit(ExitInfo::code(1));
        let down = wait_for(&mut rx, EventKind::WorkerDown).await;
        assert_eq!(down.worker, Some(W3));
        assert_eq!(down.exit_code, Some(1));
        let health = wait_for(&mut rx, EventKind::PoolHealth).await;
        assert_eq!(health.healthy, Some(true));
        let respawned = wait_for(&mut rx, EventKind::WorkerRespawned).await;
        assert_eq!(respawned.worker, Some(W3));
        assert!(respawned.seq > down.seq);
        assert_eq!(launcher.launch_count(W3), 2);

        let replacement = launcher.latest(W3);
        assert_eq!(replacement.spec.env.get("PROCVISOR_WORKER_ID").map(String::as_str), Some("3"));
        replacement.ready();
        let up = wait_for(&mut rx, EventKind::WorkerUp).await;
        assert_eq!(up.worker, Some(W3));
        assert_eq!(up.pid, Some(1004));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_from_replaced_process_are_ignored() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(1));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        let first = launcher.latest(W1);
        first.exit(ExitInfo::signaled("SIGSEGV"));
        let down = wait_for(&mut rx, EventKind::WorkerDown).await;
        assert_eq!(down.signal.as_deref(), Some("SIGSEGV"));
        wait_for(&mut rx, EventKind::WorkerRespawned).await;

        first.ready();
        assert_eq!(sup.snapshot().await.unwrap(), vec![(W1, WorkerState::Down)]);

        launcher.latest(W1).ready();
        let up = wait_for(&mut rx, EventKind::WorkerUp).await;
        assert_eq!(up.pid, Some(1001));
    }

    #[tokio::test(start_paused = true)]
    async fn clean_exit_is_not_replaced() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(2));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        launcher.latest(W2).exit(ExitInfo::code(0));
        let down = wait_for(&mut rx, EventKind::WorkerDown).await;
        assert_eq!(down.exit_code, Some(0));
        let terminated = wait_for(&mut rx, EventKind::WorkerTerminated).await;
        assert_eq!(terminated.worker, Some(W2));

        assert_eq!(
            sup.snapshot().await.unwrap(),
            vec![(W1, WorkerState::Up), (W2, WorkerState::Down)]
        );
        assert_eq!(launcher.launch_count(W2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_leaves_worker_down() {
        let launcher = FakeLauncher::default();
        launcher.fail_next(W2);
        let sup = supervisor(&launcher, options(2));
        let mut rx = sup.subscribe();

        sup.start().unwrap();
        let failed = wait_for(&mut rx, EventKind::SpawnFailed).await;
        assert_eq!(failed.worker, Some(W2));
        assert!(failed.reason.as_deref().unwrap().contains("scripted failure"));

        launcher.latest(W1).ready();
        let health = wait_for(&mut rx, EventKind::PoolHealth).await;
        assert_eq!(health.healthy, Some(false));
        assert_eq!(
            sup.snapshot().await.unwrap(),
            vec![(W1, WorkerState::Up), (W2, WorkerState::Down)]
        );
        assert_eq!(launcher.launch_count(W2), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn external_messages_are_republished() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(1));
        let mut rx = sup.subscribe();
        sup.start().unwrap();
        sup.snapshot().await.unwrap();

        launcher.latest(W1).external(json!({"progress": 42}));
        let ev = wait_for(&mut rx, EventKind::WorkerMessage).await;
        assert_eq!(ev.worker, Some(W1));
        assert_eq!(ev.message.as_deref(), Some(&json!({"progress": 42})));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_report_deltas() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(1));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        tokio::time::sleep(Duration::from_millis(400)).await;
        launcher.latest(W1).heartbeat();
        wait_for(&mut rx, EventKind::WorkerHeartbeat).await;
        let delta = wait_for(&mut rx, EventKind::HeartbeatDelta).await;
        assert_eq!(delta.delta_ms, Some(400));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_worker_is_reported_stalled() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(
            &launcher,
            options(1)
                .with_heartbeat_monitor_interval(Duration::from_millis(500))
                .with_heartbeat_stall_tolerance(Duration::from_millis(5500)),
        );
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;
        let t0 = Instant::now();

        let stall = wait_for(&mut rx, EventKind::WorkerStall).await;
        assert_eq!(t0.elapsed(), Duration::from_millis(5500));
        assert_eq!(stall.worker, Some(W1));
        assert_eq!(stall.delta_ms, Some(5500));
        let delta = wait_for(&mut rx, EventKind::StallDelta).await;
        assert_eq!(delta.delta_ms, Some(5500));

        // Reported, never acted upon.
        assert!(launcher.latest(W1).signals().is_empty());
        assert_eq!(launcher.launch_count(W1), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn six_seconds_of_silence_is_one_stall() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(1));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        tokio::time::sleep(Duration::from_millis(6000)).await;
        let mut stalls = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::WorkerStall {
                stalls.push(ev);
            }
        }
        assert_eq!(stalls.len(), 1);
        assert_eq!(stalls[0].worker, Some(W1));
        assert_eq!(stalls[0].delta_ms, Some(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_rearms_stall_report() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(1));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;
        let t0 = Instant::now();

        wait_for(&mut rx, EventKind::WorkerStall).await;
        launcher.latest(W1).heartbeat();
        let delta = wait_for(&mut rx, EventKind::HeartbeatDelta).await;
        assert_eq!(delta.delta_ms, Some(5000));

        let stall = wait_for(&mut rx, EventKind::WorkerStall).await;
        assert_eq!(t0.elapsed(), Duration::from_millis(10_000));
        assert_eq!(stall.delta_ms, Some(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn replacement_is_measured_from_its_launch() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(1));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        wait_for(&mut rx, EventKind::WorkerStall).await;
        launcher.latest(W1).exit(ExitInfo::code(1));
        wait_for(&mut rx, EventKind::WorkerRespawned).await;
        let respawned_at = Instant::now();

        let stall = wait_for(&mut rx, EventKind::WorkerStall).await;
        assert_eq!(respawned_at.elapsed(), Duration::from_millis(5000));
        assert_eq!(stall.delta_ms, Some(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn gentle_stop_sends_no_signals() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(3));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        let t0 = Instant::now();
        let report = sup.stop().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
        assert!(report.was_gentle());
        assert_eq!(report.gentle, Outcome::Completed);

        for p in launcher.launched() {
            assert!(p.sent().contains(&ControlMessage::Shutdown));
            assert!(p.signals().is_empty());
        }
        let requested = wait_for(&mut rx, EventKind::ShutdownRequested).await;
        assert_eq!(requested.count, Some(3));
        wait_for(&mut rx, EventKind::ShutdownComplete).await;
        assert_eq!(launcher.launched().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn crash_while_closing_is_not_replaced() {
        let launcher = FakeLauncher::with_behavior(|_| Behavior {
            on_shutdown: Some(1),
            ..Behavior::default()
        });
        let sup = supervisor(&launcher, options(2));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        let report = sup.stop().await;
        assert!(report.was_gentle());
        assert_eq!(launcher.launch_count(W1), 1);
        assert_eq!(launcher.launch_count(W2), 1);
        assert_eq!(
            sup.snapshot().await.unwrap(),
            vec![(W1, WorkerState::Down), (W2, WorkerState::Down)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_worker_gets_term_then_kill() {
        let launcher = FakeLauncher::with_behavior(|id| {
            if id == W2 {
                Behavior {
                    on_shutdown: None,
                    dies_on_term: false,
                    dies_on_kill: true,
                }
            } else {
                Behavior::default()
            }
        });
        let sup = supervisor(&launcher, options(2));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        let t0 = Instant::now();
        let report = sup.stop().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(7000));
        assert_eq!(
            report,
            ShutdownReport {
                gentle: Outcome::TimedOut,
                term: Sweep {
                    signalled: 1,
                    outcome: Outcome::TimedOut,
                },
                kill: Sweep {
                    signalled: 1,
                    outcome: Outcome::Completed,
                },
            }
        );
        assert!(launcher.latest(W1).signals().is_empty());
        assert_eq!(
            launcher.latest(W2).signals(),
            vec![KillSignal::Term, KillSignal::Kill]
        );
        wait_for(&mut rx, EventKind::GentleStopTimeout).await;
        let sweep = wait_for(&mut rx, EventKind::KillSweep).await;
        assert_eq!(sweep.signal.as_deref(), Some("SIGTERM"));
        assert_eq!(sweep.count, Some(1));
        let timeout = wait_for(&mut rx, EventKind::KillTimeout).await;
        assert_eq!(timeout.timeout_ms, Some(2000));
        assert_eq!(launcher.launch_count(W2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_settles_even_if_nothing_dies() {
        let launcher = FakeLauncher::with_behavior(|_| Behavior::immortal());
        let sup = supervisor(
            &launcher,
            options(2)
                .with_gentle_stop_timeout(Duration::from_millis(1000))
                .with_kill_timeout(Duration::from_millis(300)),
        );
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;

        let t0 = Instant::now();
        let report = sup.stop().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(1600));
        assert_eq!(report.gentle, Outcome::TimedOut);
        assert_eq!(report.term.signalled, 2);
        assert_eq!(report.kill.outcome, Outcome::TimedOut);
        wait_for(&mut rx, EventKind::ShutdownComplete).await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_does_not_recreate_pool() {
        let launcher = FakeLauncher::default();
        let sup = supervisor(&launcher, options(2));
        let mut rx = sup.subscribe();
        start_all_up(&sup, &launcher, &mut rx).await;
        sup.stop().await;

        sup.start().unwrap();
        assert_eq!(
            sup.snapshot().await.unwrap(),
            vec![(W1, WorkerState::Down), (W2, WorkerState::Down)]
        );
        assert_eq!(launcher.launched().len(), 2);
    }
}
