//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom event handlers into the
//! supervisor. Each subscriber is driven by a dedicated worker loop fed by a bounded
//! queue that is owned by the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! This is also where stall policy lives: the supervisor only reports
//! [`EventKind::WorkerStall`](crate::EventKind::WorkerStall); a subscriber decides
//! whether to alert, restart or ignore.
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching, retries) – they do **not** block
//!   the control task nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, events for that
//!   subscriber are **dropped** and a `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind, Subscribe};
//!
//! struct StallAlert;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for StallAlert {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::WorkerStall {
//!             // page someone...
//!         }
//!     }
//!     fn name(&self) -> &'static str { "stall-alert" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
