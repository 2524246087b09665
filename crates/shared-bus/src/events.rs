//! # Notifications
//!
//! Defines what flows through the bus: a channel name and a text payload,
//! plus the block signal payload both block channels carry.

use serde::{Deserialize, Serialize};
use shared_types::BlockNumber;

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Channel the notification was published on.
    pub channel: String,
    /// Opaque payload, interpreted by the consumer.
    pub payload: String,
}

impl Notification {
    /// Create a notification.
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Create a block signal notification for `block_number` on `channel`.
    pub fn block(channel: impl Into<String>, block_number: BlockNumber) -> Self {
        Self::new(channel, BlockSignal { block_number }.to_payload())
    }
}

/// Payload of both the "block ready" and "block reverted" channels.
///
/// Wire shape: `{ "blockNumber": <u64> }`. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockSignal {
    pub block_number: BlockNumber,
}

impl BlockSignal {
    /// Parse a notification payload.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Render as a notification payload.
    #[must_use]
    pub fn to_payload(&self) -> String {
        format!("{{\"blockNumber\":{}}}", self.block_number)
    }
}

/// Set of channels a subscription listens on.
///
/// Mirrors `LISTEN` semantics: an empty filter receives nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    /// Channels to include.
    pub channels: Vec<String>,
}

impl ChannelFilter {
    /// A filter listening on no channel.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// A filter listening on the given channels.
    #[must_use]
    pub fn channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut filter = Self::none();
        for channel in channels {
            filter.add(channel);
        }
        filter
    }

    /// Add a channel. Returns `false` if it was already present.
    pub fn add(&mut self, channel: impl Into<String>) -> bool {
        let channel = channel.into();
        if self.channels.contains(&channel) {
            return false;
        }
        self.channels.push(channel);
        true
    }

    /// Check if a notification matches this filter.
    #[must_use]
    pub fn matches(&self, notification: &Notification) -> bool {
        self.channels.iter().any(|c| *c == notification.channel)
    }
}
