//! # Pool configuration.
//!
//! Two layers:
//! 1. [`PoolOptions`]: what the caller supplies; every field optional.
//! 2. [`Settings`]: the validated, immutable result of merging options over defaults.
//!
//! ```text
//! PoolOptions ──► Settings::resolve() ──► Settings ──► Supervisor (once)
//!                     ├─ worker_count, worker_env required
//!                     ├─ min_worker_count derived when absent
//!                     └─ exec defaults to the current executable
//! ```
//!
//! ## Defaults
//! | option                       | default                                        |
//! |------------------------------|------------------------------------------------|
//! | `min_worker_count`           | `worker_count - 2` if `worker_count >= 4`, else `worker_count` |
//! | `gentle_stop_timeout`        | 5000ms                                         |
//! | `kill_timeout`               | 2000ms                                         |
//! | `heartbeat_worker_interval`  | 500ms                                          |
//! | `heartbeat_monitor_interval` | 1000ms                                         |
//! | `heartbeat_stall_tolerance`  | 5000ms                                         |

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::worker::{LaunchSpec, WorkerId};

/// Env var carrying the worker id into the child.
pub const WORKER_ID_ENV: &str = "PROCVISOR_WORKER_ID";
/// Env var carrying the expected heartbeat interval (milliseconds) into the child.
pub const HEARTBEAT_INTERVAL_ENV: &str = "PROCVISOR_HEARTBEAT_INTERVAL";

pub const DEFAULT_GENTLE_STOP_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_HEARTBEAT_WORKER_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_HEARTBEAT_MONITOR_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_HEARTBEAT_STALL_TOLERANCE: Duration = Duration::from_millis(5000);

/// Per-worker environment overrides.
pub type WorkerEnvFn = Arc<dyn Fn(WorkerId) -> HashMap<String, String> + Send + Sync>;

/// Caller-supplied pool options.
///
/// `worker_count` and `worker_env` are required; everything else has a default.
#[derive(Clone, Default)]
pub struct PoolOptions {
    pub worker_count: Option<usize>,
    pub min_worker_count: Option<usize>,
    pub worker_env: Option<WorkerEnvFn>,
    pub exec: Option<PathBuf>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub exec_argv: Vec<String>,
    pub gentle_stop_timeout: Option<Duration>,
    pub kill_timeout: Option<Duration>,
    pub heartbeat_worker_interval: Option<Duration>,
    pub heartbeat_monitor_interval: Option<Duration>,
    pub heartbeat_stall_tolerance: Option<Duration>,
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_count(mut self, n: usize) -> Self {
        self.worker_count = Some(n);
        self
    }

    pub fn with_min_worker_count(mut self, n: usize) -> Self {
        self.min_worker_count = Some(n);
        self
    }

    pub fn with_worker_env(
        mut self,
        f: impl Fn(WorkerId) -> HashMap<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.worker_env = Some(Arc::new(f));
        self
    }

    pub fn with_exec(mut self, exec: impl Into<PathBuf>) -> Self {
        self.exec = Some(exec.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exec_argv<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exec_argv = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_gentle_stop_timeout(mut self, d: Duration) -> Self {
        self.gentle_stop_timeout = Some(d);
        self
    }

    pub fn with_kill_timeout(mut self, d: Duration) -> Self {
        self.kill_timeout = Some(d);
        self
    }

    pub fn with_heartbeat_worker_interval(mut self, d: Duration) -> Self {
        self.heartbeat_worker_interval = Some(d);
        self
    }

    pub fn with_heartbeat_monitor_interval(mut self, d: Duration) -> Self {
        self.heartbeat_monitor_interval = Some(d);
        self
    }

    pub fn with_heartbeat_stall_tolerance(mut self, d: Duration) -> Self {
        self.heartbeat_stall_tolerance = Some(d);
        self
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("worker_count", &self.worker_count)
            .field("min_worker_count", &self.min_worker_count)
            .field("worker_env", &self.worker_env.as_ref().map(|_| "<fn>"))
            .field("exec", &self.exec)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Validated supervisor settings. Immutable once resolved.
#[derive(Clone)]
pub struct Settings {
    pub worker_count: usize,
    pub min_worker_count: usize,
    pub worker_env: WorkerEnvFn,
    pub exec: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub exec_argv: Vec<String>,
    pub gentle_stop_timeout: Duration,
    pub kill_timeout: Duration,
    pub heartbeat_worker_interval: Duration,
    pub heartbeat_monitor_interval: Duration,
    pub heartbeat_stall_tolerance: Duration,
}

impl Settings {
    /// Merges `opts` over the defaults and validates the result.
    ///
    /// # Errors
    /// - [`ConfigError::MissingField`] if `worker_count` or `worker_env` is absent
    /// - [`ConfigError::InvalidWorkerCount`] if `worker_count` is zero or does not fit a [`WorkerId`]
    /// - [`ConfigError::ZeroDuration`] if a heartbeat interval or the stall tolerance is zero
    /// - [`ConfigError::MinWorkerCountExceeds`] if `min_worker_count > worker_count`
    /// - [`ConfigError::CurrentExe`] if no `exec` was given and the current one is unknown
    pub fn resolve(opts: PoolOptions) -> Result<Self, ConfigError> {
        let worker_count = opts
            .worker_count
            .ok_or(ConfigError::MissingField("worker_count"))?;
        let worker_env = opts
            .worker_env
            .ok_or(ConfigError::MissingField("worker_env"))?;
        if worker_count == 0 || u32::try_from(worker_count).is_err() {
            return Err(ConfigError::InvalidWorkerCount);
        }

        let min_worker_count = opts
            .min_worker_count
            .unwrap_or_else(|| default_min_worker_count(worker_count));
        if min_worker_count > worker_count {
            return Err(ConfigError::MinWorkerCountExceeds {
                min: min_worker_count,
                count: worker_count,
            });
        }

        let exec = match opts.exec {
            Some(exec) => exec,
            None => std::env::current_exe().map_err(ConfigError::CurrentExe)?,
        };

        let heartbeat_worker_interval = non_zero(
            "heartbeat_worker_interval",
            opts.heartbeat_worker_interval
                .unwrap_or(DEFAULT_HEARTBEAT_WORKER_INTERVAL),
        )?;
        let heartbeat_monitor_interval = non_zero(
            "heartbeat_monitor_interval",
            opts.heartbeat_monitor_interval
                .unwrap_or(DEFAULT_HEARTBEAT_MONITOR_INTERVAL),
        )?;
        let heartbeat_stall_tolerance = non_zero(
            "heartbeat_stall_tolerance",
            opts.heartbeat_stall_tolerance
                .unwrap_or(DEFAULT_HEARTBEAT_STALL_TOLERANCE),
        )?;

        Ok(Self {
            worker_count,
            min_worker_count,
            worker_env,
            exec,
            args: opts.args,
            env: opts.env,
            exec_argv: opts.exec_argv,
            gentle_stop_timeout: opts
                .gentle_stop_timeout
                .unwrap_or(DEFAULT_GENTLE_STOP_TIMEOUT),
            kill_timeout: opts.kill_timeout.unwrap_or(DEFAULT_KILL_TIMEOUT),
            heartbeat_worker_interval,
            heartbeat_monitor_interval,
            heartbeat_stall_tolerance,
        })
    }

    /// Ids of every slot, ascending.
    pub fn worker_ids(&self) -> impl Iterator<Item = WorkerId> + use<> {
        let last = u32::try_from(self.worker_count).unwrap_or(u32::MAX);
        (1..=last).map(WorkerId::new)
    }

    /// Builds the launch description for one worker.
    ///
    /// Environment precedence, lowest first: settings `env`, `worker_env(id)`,
    /// then the two injected variables.
    pub fn launch_spec(&self, id: WorkerId) -> LaunchSpec {
        let mut env = self.env.clone();
        env.extend((self.worker_env)(id));
        env.insert(WORKER_ID_ENV.to_string(), id.to_string());
        env.insert(
            HEARTBEAT_INTERVAL_ENV.to_string(),
            self.heartbeat_worker_interval.as_millis().to_string(),
        );

        LaunchSpec {
            worker: id,
            exec: self.exec.clone(),
            exec_argv: self.exec_argv.clone(),
            args: self.args.clone(),
            env,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("worker_count", &self.worker_count)
            .field("min_worker_count", &self.min_worker_count)
            .field("exec", &self.exec)
            .field("args", &self.args)
            .field("gentle_stop_timeout", &self.gentle_stop_timeout)
            .field("kill_timeout", &self.kill_timeout)
            .field("heartbeat_monitor_interval", &self.heartbeat_monitor_interval)
            .field("heartbeat_stall_tolerance", &self.heartbeat_stall_tolerance)
            .finish_non_exhaustive()
    }
}

fn non_zero(field: &'static str, d: Duration) -> Result<Duration, ConfigError> {
    if d.is_zero() {
        return Err(ConfigError::ZeroDuration(field));
    }
    Ok(d)
}

/// Steady-state floor used when `min_worker_count` is not given.
fn default_min_worker_count(worker_count: usize) -> usize {
    if worker_count >= 4 {
        worker_count - 2
    } else {
        worker_count
    }
}
