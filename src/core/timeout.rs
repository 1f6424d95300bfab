//! # Deadline racing.
//!
//! [`race`] runs a future against a deadline. If the deadline elapses first the
//! `on_timeout` callback runs and the race resolves to [`Raced::TimedOut`];
//! the losing future is dropped, so a late completion has no effect.

use std::future::Future;
use std::time::Duration;

use tokio::time;

/// Outcome of [`race`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raced<T> {
    /// The future finished first.
    Completed(T),
    /// The deadline elapsed first.
    TimedOut,
}

impl<T> Raced<T> {
    /// True if the deadline won.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Raced::TimedOut)
    }
}

/// Races `fut` against `deadline`, calling `on_timeout` if the deadline wins.
pub async fn race<F, C>(fut: F, deadline: Duration, on_timeout: C) -> Raced<F::Output>
where
    F: Future,
    C: FnOnce(),
{
    match time::timeout(deadline, fut).await {
        Ok(out) => Raced::Completed(out),
        Err(_elapsed) => {
            on_timeout();
            Raced::TimedOut
        }
    }
}
