//! # Bus Notification Source
//!
//! Adapts a `shared_bus::Subscription` to the `NotificationSource` port.

use crate::domain::SourceError;
use crate::ports::NotificationSource;
use async_trait::async_trait;
use shared_bus::{InMemoryNotificationBus, Notification, Subscription, SubscriptionError};
use tracing::debug;

/// Notification source reading from the in-process bus.
pub struct BusNotificationSource {
    subscription: Subscription,
}

impl BusNotificationSource {
    /// Open a subscription on `bus`. Channels are added with `listen`.
    #[must_use]
    pub fn new(bus: &InMemoryNotificationBus) -> Self {
        Self {
            subscription: bus.subscribe(),
        }
    }
}

#[async_trait]
impl NotificationSource for BusNotificationSource {
    async fn listen(&mut self, channel: &str) -> Result<(), SourceError> {
        let added = self
            .subscription
            .listen(channel)
            .map_err(SourceError::from)?;
        if !added {
            debug!(channel = %channel, "Already listening");
        }
        Ok(())
    }

    async fn wait_for_notification(&mut self) -> Result<Notification, SourceError> {
        self.subscription.recv().await.ok_or(SourceError::Closed)
    }
}

impl From<SubscriptionError> for SourceError {
    fn from(error: SubscriptionError) -> Self {
        match error {
            SubscriptionError::Closed => SourceError::Closed,
            SubscriptionError::InvalidChannel { channel } => SourceError::Subscription {
                reason: format!("invalid channel name {channel:?}"),
                channel,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{NotificationPublisher, BLOCK_READY_CHANNEL};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_receives_listened_channel() {
        let bus = InMemoryNotificationBus::new();
        let mut source = BusNotificationSource::new(&bus);
        source.listen(BLOCK_READY_CHANNEL).await.unwrap();

        bus.notify(Notification::block(BLOCK_READY_CHANNEL, 12)).await;

        let notification = timeout(Duration::from_millis(100), source.wait_for_notification())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(notification.payload, r#"{"blockNumber":12}"#);
    }

    #[tokio::test]
    async fn test_invalid_channel_is_subscription_error() {
        let bus = InMemoryNotificationBus::new();
        let mut source = BusNotificationSource::new(&bus);

        assert!(matches!(
            source.listen("").await,
            Err(SourceError::Subscription { .. })
        ));
    }

    #[tokio::test]
    async fn test_bus_dropped_closes_source() {
        let bus = InMemoryNotificationBus::new();
        let mut source = BusNotificationSource::new(&bus);
        drop(bus);

        assert_eq!(source.wait_for_notification().await, Err(SourceError::Closed));
    }
}
