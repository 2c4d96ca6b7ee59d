//! In-process change feed over a tokio broadcast channel.
//!
//! Every subscriber sees events in publish order. A subscriber that falls
//! more than `capacity` events behind receives [`FeedError::Lagged`] and
//! should re-fetch the shop's state before continuing.

use async_stream::stream;
use chairbook_core::effect::ChangeEvent;
use chairbook_core::environment::{ChangeFeed, ChangeStream, FeedError};
use chairbook_core::types::ShopId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast-backed [`ChangeFeed`]
#[derive(Clone, Debug)]
pub struct BroadcastFeed {
    sender: broadcast::Sender<ChangeEvent>,
    closed: Arc<AtomicBool>,
}

impl BroadcastFeed {
    /// Creates a feed buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop accepting events. Open subscriptions end when the last feed
    /// handle is dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::info!("Change feed closed");
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed for BroadcastFeed {
    fn publish(&self, event: ChangeEvent) -> Result<(), FeedError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FeedError::Closed);
        }
        // No receivers is fine: nobody has a dashboard open
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::trace!(delivered, "Published change event");
        Ok(())
    }

    fn subscribe(&self, shop_id: ShopId) -> ChangeStream {
        let mut receiver = self.sender.subscribe();

        Box::pin(stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.shop_id == shop_id => yield Ok(event),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(%shop_id, missed, "Change feed subscriber lagged");
                        yield Err(FeedError::Lagged(missed));
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
