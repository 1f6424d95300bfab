//! Runtime core: pool control, health, heartbeats and shutdown.
//!
//! The only public entry point from this module is [`Supervisor`] (and its
//! [`SupervisorBuilder`]); the rest are the pieces it is made of.
//!
//! Internal modules:
//! - [`supervisor`]: facade; configure/start/stop/snapshot/subscribe;
//! - [`builder`]: wires bus, subscribers and launcher;
//! - [`pool`]: the control task owning every worker;
//! - [`health`]: pool health rules;
//! - [`heartbeat`]: heartbeat bookkeeping and the monitor tick;
//! - [`shutdown`]: the escalating stop sequence;
//! - [`signals`]: OS termination signals for `run_until_signal`;
//! - [`timeout`]: racing a future against a deadline.

mod builder;
mod health;
mod heartbeat;
mod pool;
mod shutdown;
mod signals;
mod supervisor;
mod timeout;

pub use builder::SupervisorBuilder;
pub use health::Health;
pub use shutdown::{Outcome, ShutdownReport, Sweep};
pub use supervisor::Supervisor;
pub use timeout::{Raced, race};
