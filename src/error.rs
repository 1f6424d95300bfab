//! Error types used by the procvisor runtime.
//!
//! This module defines three error enums:
//!
//! - [`ConfigError`]: settings were rejected by [`Supervisor::configure`](crate::Supervisor::configure).
//! - [`RuntimeError`]: the supervisor was driven in an invalid order.
//! - [`ProcessError`]: a worker process could not be launched, messaged or signalled.
//!
//! Timeouts are not errors here: a bounded wait that expires is a control-flow
//! branch ([`Raced::TimedOut`](crate::Raced::TimedOut)), not an error value.
//!
//! All types provide `as_label` (stable snake_case label for logs/metrics).

use thiserror::Error;

/// # Errors produced while configuring the supervisor.
///
/// Configuration errors are fatal to the call and leave no partial state behind.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `configure` was called on a supervisor that is already configured.
    #[error("supervisor is already configured")]
    AlreadyConfigured,

    /// A required option was not supplied.
    #[error("missing required option `{0}`")]
    MissingField(&'static str),

    /// `worker_count` must be at least one and fit a worker id.
    #[error("worker_count must be between 1 and u32::MAX")]
    InvalidWorkerCount,

    /// `min_worker_count` is larger than the pool itself.
    #[error("min_worker_count {min} exceeds worker_count {count}")]
    MinWorkerCountExceeds {
        /// Requested steady-state floor.
        min: usize,
        /// Configured pool size.
        count: usize,
    },

    /// A heartbeat interval or the stall tolerance was zero.
    #[error("`{0}` must be greater than zero")]
    ZeroDuration(&'static str),

    /// No `exec` was supplied and the current executable could not be resolved.
    #[error("cannot resolve current executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::ConfigError;
    ///
    /// assert_eq!(ConfigError::AlreadyConfigured.as_label(), "config_already_configured");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::AlreadyConfigured => "config_already_configured",
            ConfigError::MissingField(_) => "config_missing_field",
            ConfigError::InvalidWorkerCount => "config_invalid_worker_count",
            ConfigError::MinWorkerCountExceeds { .. } => "config_min_worker_count_exceeds",
            ConfigError::ZeroDuration(_) => "config_zero_duration",
            ConfigError::CurrentExe(_) => "config_current_exe",
        }
    }
}

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `start` was called before `configure`.
    #[error("supervisor is not configured")]
    NotConfigured,

    /// The control task is gone (the runtime is shutting down).
    #[error("supervisor control task has stopped")]
    ControlClosed,

    /// Termination signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NotConfigured => "runtime_not_configured",
            RuntimeError::ControlClosed => "runtime_control_closed",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Errors produced by a worker process handle.
///
/// None of these abort the supervisor: a failed launch leaves the worker down,
/// a failed send or signal is logged and the current phase carries on.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The process could not be spawned.
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[from] std::io::Error),

    /// A pipe the supervisor needs was not captured.
    #[error("worker {0} was not captured")]
    MissingPipe(&'static str),

    /// The message channel to the process is closed.
    #[error("message channel to worker process is closed")]
    ChannelClosed,

    /// A message could not be encoded.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Delivering a signal failed.
    #[error("failed to deliver {signal} to pid {pid}: {reason}")]
    Signal {
        /// Signal name, e.g. `SIGTERM`.
        signal: &'static str,
        /// Target process id.
        pid: u32,
        /// OS error description.
        reason: String,
    },

    /// The process has no pid (it already exited and was reaped).
    #[error("worker process has already exited")]
    Exited,
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Spawn(_) => "process_spawn",
            ProcessError::MissingPipe(_) => "process_missing_pipe",
            ProcessError::ChannelClosed => "process_channel_closed",
            ProcessError::Encode(_) => "process_encode",
            ProcessError::Signal { .. } => "process_signal",
            ProcessError::Exited => "process_exited",
        }
    }
}
