//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! control task ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet::emit(&Event)
//!                                                                    ┌─────────┼─────────┐
//!                                                                    ▼         ▼         ▼
//!                                                                LogWriter  Alerts   Custom
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
