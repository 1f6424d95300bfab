use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::supervisor::Supervisor;
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
    worker::{CommandLauncher, Launch},
};

/// Default capacity of the event bus ring buffer.
const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Builder for constructing a Supervisor with optional features.
pub struct SupervisorBuilder {
    subscribers: Vec<Arc<dyn Subscribe>>,
    launcher: Option<Arc<dyn Launch>>,
    bus_capacity: usize,
}

impl Default for SupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorBuilder {
    /// Creates a new builder with no subscribers and the OS process launcher.
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            launcher: None,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive pool events (worker lifecycle, health, stalls, shutdown
    /// progress) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the collaborator that launches worker processes.
    ///
    /// Defaults to [`CommandLauncher`].
    pub fn with_launcher(mut self, launcher: Arc<dyn Launch>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Sets the event bus capacity (minimum 1).
    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Builds and returns the Supervisor instance.
    ///
    /// Must be called inside a tokio runtime: subscriber workers and the
    /// subscriber listener are spawned here.
    pub fn build(self) -> Arc<Supervisor> {
        let bus = Bus::new(self.bus_capacity);
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let token = CancellationToken::new();
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(CommandLauncher::new()));

        if !subs.is_empty() {
            subscriber_listener(&bus, Arc::clone(&subs), token.clone());
        }
        Arc::new(Supervisor::new_internal(bus, subs, launcher, token))
    }
}

/// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
fn subscriber_listener(bus: &Bus, set: Arc<SubscriberSet>, token: CancellationToken) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit(&ev),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });
}
