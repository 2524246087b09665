//! # Shared Bus - Change-Notification Channel
//!
//! Carries block-level signals from the ingestion side of the indexer to the
//! event-application core.
//!
//! ## Channels
//!
//! ```text
//! ┌──────────────┐   publish("new_block", {"blockNumber": N})    ┌──────────────┐
//! │  Ingestion   │ ─────────────┐                                │  Dispatcher  │
//! │  / Reorg     │              ▼                                │              │
//! │  detection   │        ┌──────────────┐   listen(channel)     │              │
//! └──────────────┘        │  Notification│ ────────────────────→ │              │
//!                         │      Bus     │                       └──────────────┘
//!                         └──────────────┘
//! ```
//!
//! A notification is a channel name plus an opaque text payload, the same
//! shape as a database `NOTIFY`. Subscribers pick the channels they care
//! about with [`Subscription::listen`]; everything else is filtered out.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BlockSignal, ChannelFilter, Notification};
pub use publisher::{InMemoryNotificationBus, NotificationPublisher};
pub use subscriber::{NotificationStream, Subscription, SubscriptionError};

/// Channel on which "block ready" signals are published.
pub const BLOCK_READY_CHANNEL: &str = "new_block";

/// Channel on which "block reverted" signals are published.
pub const BLOCK_REVERTED_CHANNEL: &str = "revert_block";

/// Maximum notifications to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
