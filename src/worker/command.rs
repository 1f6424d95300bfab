//! # OS process launcher.
//!
//! [`CommandLauncher`] starts workers with [`tokio::process::Command`] and speaks
//! the JSON-lines protocol over the child's stdin/stdout. The child's stderr is
//! inherited so worker diagnostics land next to the supervisor's own.
//!
//! ## Per-process tasks
//! ```text
//! ChildControl::send ──► outbox ──► writer task ──► child stdin
//!
//! child stdout ──► reader task ──► decode_line ──► ProcessEvent::Message ──┐
//!                                                                          ├──► events
//! child.wait() ──► waiter task ──(drain reader, bounded)──► Exited ────────┘
//! ```
//!
//! The waiter does not wait for stdout EOF on its own: a grandchild that
//! inherited stdout could keep the pipe open long after the worker died.
//! Once the child is reaped its pid may be reused, so signalling stops there,
//! before `Exited` is reported.

use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::handle::WorkerId;
use super::process::{ExitInfo, KillSignal, Launch, LaunchSpec, ProcessControl, ProcessEvent, Spawned};
use super::protocol::{ControlMessage, decode_line};
use crate::error::ProcessError;

/// How long the waiter lets the reader flush buffered output after exit.
const EXIT_DRAIN: Duration = Duration::from_millis(250);

/// Launches workers as real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandLauncher;

impl CommandLauncher {
    /// Construct a new [`CommandLauncher`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Launch for CommandLauncher {
    fn launch(&self, spec: &LaunchSpec) -> Result<Spawned, ProcessError> {
        let mut cmd = Command::new(&spec.exec);
        cmd.args(spec.argv())
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn()?;
        let pid = child.id();
        let stdin = child.stdin.take().ok_or(ProcessError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::MissingPipe("stdout"))?;

        let (outbox, out_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let reaped = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_lines(spec.worker, stdin, out_rx));
        let reader = tokio::spawn(read_lines(spec.worker, stdout, events_tx.clone()));
        tokio::spawn(wait_exit(
            spec.worker,
            child,
            reader,
            Arc::clone(&reaped),
            events_tx,
        ));

        tracing::debug!(worker = %spec.worker, pid, exec = %spec.exec.display(), "worker process launched");
        Ok(Spawned {
            control: Box::new(ChildControl {
                pid,
                outbox,
                reaped,
            }),
            events,
        })
    }
}

/// Control half of a [`CommandLauncher`] process.
struct ChildControl {
    pid: Option<u32>,
    outbox: mpsc::UnboundedSender<String>,
    /// Set by the waiter as soon as the child is reaped.
    reaped: Arc<AtomicBool>,
}

impl ProcessControl for ChildControl {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn send(&self, msg: ControlMessage) -> Result<(), ProcessError> {
        let line = msg.to_line()?;
        self.outbox
            .send(line)
            .map_err(|_| ProcessError::ChannelClosed)
    }

    fn kill(&self, sig: KillSignal) -> Result<(), ProcessError> {
        if self.reaped.load(Ordering::Acquire) {
            return Err(ProcessError::Exited);
        }
        let pid = self.pid.ok_or(ProcessError::Exited)?;
        let raw = i32::try_from(pid).map_err(|_| ProcessError::Signal {
            signal: sig.name(),
            pid,
            reason: "pid out of range".to_string(),
        })?;
        signal::kill(Pid::from_raw(raw), Signal::from(sig)).map_err(|errno| ProcessError::Signal {
            signal: sig.name(),
            pid,
            reason: errno.desc().to_string(),
        })
    }
}

impl From<KillSignal> for Signal {
    fn from(sig: KillSignal) -> Self {
        match sig {
            KillSignal::Term => Signal::SIGTERM,
            KillSignal::Kill => Signal::SIGKILL,
        }
    }
}

async fn write_lines(id: WorkerId, mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        let res = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        if let Err(err) = res {
            tracing::debug!(worker = %id, %err, "worker stdin closed");
            break;
        }
    }
}

async fn read_lines(id: WorkerId, stdout: ChildStdout, tx: mpsc::UnboundedSender<ProcessEvent>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match decode_line(&line) {
                Ok(inbound) => {
                    if tx.send(ProcessEvent::Message(inbound)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::debug!(worker = %id, %err, line = %line, "ignoring undecodable worker output");
                }
            },
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(worker = %id, %err, "failed to read worker stdout");
                break;
            }
        }
    }
}

async fn wait_exit(
    id: WorkerId,
    mut child: Child,
    mut reader: JoinHandle<()>,
    reaped: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<ProcessEvent>,
) {
    let info = match child.wait().await {
        Ok(status) => exit_info(status),
        Err(err) => {
            tracing::warn!(worker = %id, %err, "failed to wait for worker process");
            ExitInfo::default()
        }
    };
    reaped.store(true, Ordering::Release);

    if tokio::time::timeout(EXIT_DRAIN, &mut reader).await.is_err() {
        reader.abort();
    }
    let _ = tx.send(ProcessEvent::Exited(info));
}

fn exit_info(status: ExitStatus) -> ExitInfo {
    ExitInfo {
        code: status.code(),
        signal: status
            .signal()
            .map(|raw| match Signal::try_from(raw) {
                Ok(sig) => sig.as_str().to_string(),
                Err(_) => format!("SIG{raw}"),
            }),
    }
}
