//! # Escalating shutdown sequence.
//!
//! ```text
//! stop()
//!   ├─► gentle stop   closing = true, broadcast `shutdown`, wait all Down   ≤ gentle_stop_timeout
//!   ├─► SIGTERM sweep signal live workers, wait all dead                    ≤ kill_timeout
//!   ├─► SIGKILL sweep signal live workers, wait all dead                    ≤ kill_timeout
//!   └─► FinishShutdown (monitor off) + ShutdownComplete
//! ```
//!
//! ## Rules
//! - Every phase settles: it either completes or times out, then the next one runs.
//! - A sweep that finds no live worker sends nothing and completes at once.
//! - Waits are raced, not cancelled: a worker going down after its phase timed
//!   out only updates its status channel.
//! - If the control task is gone, every phase completes with zero workers.

use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, watch};

use super::pool::Command;
use super::timeout::{Raced, race};
use crate::config::Settings;
use crate::events::{Bus, Event, EventKind};
use crate::worker::{KillSignal, WorkerState, WorkerStatus};

/// How a bounded phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    /// Every awaited worker reached the target state in time.
    #[default]
    Completed,
    /// The phase deadline elapsed first.
    TimedOut,
}

impl<T> From<Raced<T>> for Outcome {
    fn from(r: Raced<T>) -> Self {
        match r {
            Raced::Completed(_) => Outcome::Completed,
            Raced::TimedOut => Outcome::TimedOut,
        }
    }
}

/// Result of one kill sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sweep {
    /// Number of workers the signal was sent to.
    pub signalled: usize,
    /// Whether all of them died before `kill_timeout`.
    pub outcome: Outcome,
}

/// What `stop()` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    pub gentle: Outcome,
    pub term: Sweep,
    pub kill: Sweep,
}

impl ShutdownReport {
    /// True if every worker stopped cooperatively (no signal was needed).
    pub fn was_gentle(&self) -> bool {
        self.term.signalled == 0 && self.kill.signalled == 0
    }
}

/// Runs the three phases against the control task.
pub(crate) async fn run(
    control: &mpsc::UnboundedSender<Command>,
    bus: &Bus,
    settings: &Settings,
) -> ShutdownReport {
    let gentle = gentle_stop(control, bus, settings.gentle_stop_timeout).await;
    let term = sweep(control, bus, KillSignal::Term, settings.kill_timeout).await;
    let kill = sweep(control, bus, KillSignal::Kill, settings.kill_timeout).await;

    let _ = control.send(Command::FinishShutdown);
    bus.publish(Event::new(EventKind::ShutdownComplete));
    ShutdownReport { gentle, term, kill }
}

async fn gentle_stop(
    control: &mpsc::UnboundedSender<Command>,
    bus: &Bus,
    timeout: Duration,
) -> Outcome {
    let workers = request(control, |reply| Command::RequestShutdown { reply }).await;
    let all_down = join_all(workers.into_iter().map(|rx| {
        wait_until(rx, |s| s.state == WorkerState::Down)
    }));

    race(all_down, timeout, || {
        tracing::warn!(?timeout, "gentle stop timed out");
        bus.publish(Event::new(EventKind::GentleStopTimeout).with_timeout(timeout));
    })
    .await
    .into()
}

async fn sweep(
    control: &mpsc::UnboundedSender<Command>,
    bus: &Bus,
    signal: KillSignal,
    timeout: Duration,
) -> Sweep {
    let workers = request(control, |reply| Command::Sweep { signal, reply }).await;
    let signalled = workers.len();
    if signalled == 0 {
        return Sweep {
            signalled,
            outcome: Outcome::Completed,
        };
    }

    let all_dead = join_all(workers.into_iter().map(|rx| wait_until(rx, |s| !s.alive)));
    let outcome: Outcome = race(all_dead, timeout, || {
        tracing::warn!(%signal, ?timeout, "kill sweep timed out");
        bus.publish(
            Event::new(EventKind::KillTimeout)
                .with_signal(signal.name())
                .with_timeout(timeout),
        );
    })
    .await
    .into();

    Sweep { signalled, outcome }
}

/// Sends a command and awaits its reply. A closed control task yields no workers.
async fn request(
    control: &mpsc::UnboundedSender<Command>,
    make: impl FnOnce(oneshot::Sender<Vec<watch::Receiver<WorkerStatus>>>) -> Command,
) -> Vec<watch::Receiver<WorkerStatus>> {
    let (tx, rx) = oneshot::channel();
    if control.send(make(tx)).is_err() {
        return Vec::new();
    }
    rx.await.unwrap_or_default()
}

/// Resolves once the status satisfies `pred` (or the worker is gone).
async fn wait_until(mut rx: watch::Receiver<WorkerStatus>, pred: impl FnMut(&WorkerStatus) -> bool) {
    let _ = rx.wait_for(pred).await;
}
