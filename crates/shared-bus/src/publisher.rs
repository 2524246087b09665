//! # Notification Publisher
//!
//! Defines the publishing side of the bus.

use crate::events::{ChannelFilter, Notification};
use crate::subscriber::{NotificationStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing notifications to the bus.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish a notification.
    ///
    /// # Returns
    ///
    /// The number of live subscriptions the notification was handed to
    /// (before channel filtering).
    async fn notify(&self, notification: Notification) -> usize;

    /// Get the total number of notifications published.
    fn notifications_published(&self) -> u64;
}

/// In-memory implementation of the notification bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// A database-backed deployment would put `LISTEN`/`NOTIFY` behind the same
/// publisher and subscription types.
pub struct InMemoryNotificationBus {
    /// Broadcast sender for notifications.
    sender: broadcast::Sender<Notification>,

    /// Active listener count by channel.
    listeners: Arc<RwLock<HashMap<String, usize>>>,

    /// Total notifications published.
    published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryNotificationBus {
    /// Create a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            listeners: Arc::new(RwLock::new(HashMap::new())),
            published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Open a subscription listening on no channel yet.
    ///
    /// Call [`Subscription::listen`] to start receiving.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_with(ChannelFilter::none())
    }

    /// Open a subscription with an initial channel filter.
    #[must_use]
    pub fn subscribe_with(&self, filter: ChannelFilter) -> Subscription {
        let receiver = self.sender.subscribe();

        if let Ok(mut listeners) = self.listeners.write() {
            for channel in &filter.channels {
                *listeners.entry(channel.clone()).or_insert(0) += 1;
            }
        }

        debug!(channels = ?filter.channels, "New subscription created");

        Subscription::new(receiver, filter, self.listeners.clone())
    }

    /// Get a stream of notifications on the given channels.
    #[must_use]
    pub fn notification_stream(&self, filter: ChannelFilter) -> NotificationStream {
        NotificationStream::new(self.subscribe_with(filter))
    }

    /// Get the number of open subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Get the number of subscriptions listening on `channel`.
    #[must_use]
    pub fn listener_count(&self, channel: &str) -> usize {
        self.listeners
            .read()
            .ok()
            .and_then(|listeners| listeners.get(channel).copied())
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryNotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryNotificationBus {
    async fn notify(&self, notification: Notification) -> usize {
        // Always increment counter (notification was attempted)
        self.published.fetch_add(1, Ordering::Relaxed);

        let channel = notification.channel.clone();
        if self.listener_count(&channel) == 0 {
            debug!(channel = %channel, "No listener on channel");
        }

        match self.sender.send(notification) {
            Ok(receiver_count) => {
                debug!(
                    channel = %channel,
                    receivers = receiver_count,
                    "Notification published"
                );
                receiver_count
            }
            Err(e) => {
                // No receivers - notification is dropped
                warn!(
                    channel = %channel,
                    error = %e,
                    "Notification dropped (no receivers)"
                );
                0
            }
        }
    }

    fn notifications_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
