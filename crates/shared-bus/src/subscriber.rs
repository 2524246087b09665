//! # Notification Subscriber
//!
//! Defines the subscription side of the bus.

use crate::events::{ChannelFilter, Notification};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus was closed.
    #[error("Notification bus closed")]
    Closed,

    /// A channel name was rejected.
    #[error("Invalid channel name: {channel:?}")]
    InvalidChannel { channel: String },
}

/// Channels a subscription listens on, plus the shared listener registry.
///
/// Releases its channels from the registry when dropped.
struct Registration {
    filter: ChannelFilter,
    listeners: Arc<RwLock<HashMap<String, usize>>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Ok(mut listeners) = self.listeners.write() else {
            return;
        };
        for channel in &self.filter.channels {
            let Some(count) = listeners.get_mut(channel) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 {
                listeners.remove(channel);
            }
        }
        debug!(channels = ?self.filter.channels, "Subscription dropped");
    }
}

/// A subscription handle for receiving notifications.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Notification>,

    registration: Registration,
}

impl Subscription {
    /// Create a new subscription.
    pub(crate) fn new(
        receiver: broadcast::Receiver<Notification>,
        filter: ChannelFilter,
        listeners: Arc<RwLock<HashMap<String, usize>>>,
    ) -> Self {
        Self {
            receiver,
            registration: Registration { filter, listeners },
        }
    }

    /// Start listening on `channel`.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` - The channel was added
    /// - `Ok(false)` - Already listening on it
    /// - `Err(SubscriptionError::InvalidChannel)` - Empty or whitespace-bearing name
    pub fn listen(&mut self, channel: &str) -> Result<bool, SubscriptionError> {
        if channel.is_empty() || channel.chars().any(char::is_whitespace) {
            return Err(SubscriptionError::InvalidChannel {
                channel: channel.to_string(),
            });
        }

        if !self.registration.filter.add(channel) {
            return Ok(false);
        }

        if let Ok(mut listeners) = self.registration.listeners.write() {
            *listeners.entry(channel.to_string()).or_insert(0) += 1;
        }
        debug!(channel = %channel, "Listening");
        Ok(true)
    }

    /// Receive the next notification on a listened channel.
    ///
    /// # Returns
    ///
    /// - `Some(notification)` - The next matching notification
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            let notification = match self.receiver.recv().await {
                Ok(n) => n,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Subscriber lagged, notifications dropped");
                    continue;
                }
            };

            if self.registration.filter.matches(&notification) {
                return Some(notification);
            }
        }
    }

    /// Try to receive the next notification without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(notification))` - A notification was available and matched
    /// - `Ok(None)` - No notification available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<Notification>, SubscriptionError> {
        loop {
            let notification = match self.receiver.try_recv() {
                Ok(n) => n,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(lagged = count, "Subscriber lagged, notifications dropped");
                    continue;
                }
            };

            if self.registration.filter.matches(&notification) {
                return Ok(Some(notification));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn channel_filter(&self) -> &ChannelFilter {
        &self.registration.filter
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct NotificationStream {
    inner: BroadcastStream<Notification>,
    registration: Registration,
}

impl NotificationStream {
    /// Create a new notification stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription {
            receiver,
            registration,
        } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            registration,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn channel_filter(&self) -> &ChannelFilter {
        &self.registration.filter
    }
}

impl Stream for NotificationStream {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(notification))) => {
                    if self.registration.filter.matches(&notification) {
                        return Poll::Ready(Some(notification));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    warn!(lagged = count, "Stream lagged, notifications dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
