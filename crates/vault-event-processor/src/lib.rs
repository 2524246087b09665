//! # vault-event-processor
//!
//! Applies and reverts options-vault events against the materialized view,
//! one block at a time.
//!
//! ## Overview
//!
//! - **Dispatcher**: waits on the block channels and runs one batch per
//!   notification
//! - **Applier / Reverter**: forward and inverse transition per event kind
//! - **Atomic batches**: a block's events commit together or not at all
//!
//! ## Architecture
//!
//! ```text
//! Ingestion ──"new_block"────┐
//!                            ├──→ Dispatcher ──events_by_block──→ Event Store
//! Reorg ─────"revert_block"──┘        │
//!                                     ├── decode ──→ apply_event / revert_event
//!                                     │
//!                                     └── begin ... commit ──→ Materialized Store
//! ```
//!
//! Reverts run newest block first. Within a reverted block the events are
//! replayed in reverse stored order unless `RevertOrder::Stored` is
//! configured.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vault_event_processor::{
//!     BlockEventDispatcher, BusNotificationSource, DispatcherConfig, InMemoryStore,
//!     JsonEventDecoder,
//! };
//!
//! let dispatcher = BlockEventDispatcher::new(
//!     DispatcherConfig::default(),
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(JsonEventDecoder),
//! );
//! let mut source = BusNotificationSource::new(&bus);
//! dispatcher.run(&mut source).await?;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(test)]
mod test_utils;

pub use adapters::{BusNotificationSource, InMemoryStore, InMemoryTransaction, JsonEventDecoder};
pub use config::{ConfigError, DispatcherConfig, RevertOrder, DEFAULT_UNDO_RETENTION_BLOCKS};
pub use domain::{
    BatchError, DecodeError, DecodedEvent, DispatcherError, Event, EventKind, ProcessingError,
    SourceError, StoreError,
};
pub use ports::inbound::{BatchDirection, BatchReport, BlockEventProcessorApi, DispatcherStats};
pub use ports::outbound::{
    EventDecoder, EventStore, MaterializedStore, NotificationSource, StoreTransaction,
};
pub use service::{apply_event, revert_event, BlockEventDispatcher, DispatcherState};
