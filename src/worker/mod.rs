//! Worker processes: handle, launch collaborator and wire protocol.
//!
//! - [`handle`]: [`Worker`]: one pool slot, survives process replacement;
//! - [`process`]: the [`Launch`] / [`ProcessControl`] seam the supervisor talks through;
//! - [`command`]: [`CommandLauncher`]: real OS processes over JSON lines;
//! - [`protocol`]: supervisor ↔ worker messages.

mod command;
mod handle;
mod process;
mod protocol;

#[cfg(test)]
pub(crate) mod fake;

pub use command::CommandLauncher;
pub use handle::{Worker, WorkerId, WorkerState, WorkerStatus};
pub use process::{ExitInfo, KillSignal, Launch, LaunchSpec, ProcessControl, ProcessEvent, Spawned};
pub use protocol::{ControlMessage, ENVELOPE_KEY, Inbound, WorkerMessage, decode_line};
