//! Price events - Notifications emitted after prices or project lines change.
//!
//! Consumers (display caches, push channels) subscribe to a [`PriceEvents`] bus and
//! invalidate whatever they mirror. Publishing never fails: an event nobody listens
//! to is simply dropped.

use tokio::sync::broadcast;
use tracing::trace;

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_CAPACITY: usize = 256;

/// Something observable happened to prices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceEvent {
    /// A component's stored sale price was recomputed
    ComponentRepriced {
        /// Component id
        component_id: i64,
    },
    /// A product's stored cost and sale price were recomputed
    ProductRepriced {
        /// Product id
        product_id: i64,
    },
    /// Draft projects whose live totals moved because a product changed
    DraftProjectsAffected {
        /// Product that changed
        product_id: i64,
        /// Draft projects with a line on that product
        project_ids: Vec<i64>,
    },
    /// A project's line prices were frozen
    ProjectPricesFrozen {
        /// Project id
        project_id: i64,
    },
    /// A project's line prices were released back to live pricing
    ProjectPricesUnfrozen {
        /// Project id
        project_id: i64,
    },
    /// Lines were added, removed or changed, or the project was deleted
    ProjectLinesChanged {
        /// Project id
        project_id: i64,
    },
}

/// Broadcast bus for [`PriceEvent`]s. Cheap to clone; clones share the channel.
#[derive(Debug, Clone)]
pub struct PriceEvents {
    sender: broadcast::Sender<PriceEvent>,
}

impl PriceEvents {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PriceEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, event: PriceEvent) {
        match self.sender.send(event) {
            Ok(receivers) => trace!(receivers, "Published price event"),
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "Price event dropped, no subscribers");
            }
        }
    }
}

impl Default for PriceEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
