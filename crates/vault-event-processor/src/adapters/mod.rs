//! # Adapters
//!
//! Implementations of the outbound ports.
//!
//! - `json_decoder` - `EventDecoder` for JSON-object payloads
//! - `in_memory_store` - Transactional `MaterializedStore` + `EventStore`
//! - `bus_notification_source` - `NotificationSource` over the shared bus

pub mod bus_notification_source;
pub mod in_memory_store;
pub mod json_decoder;

pub use bus_notification_source::BusNotificationSource;
pub use in_memory_store::{InMemoryStore, InMemoryTransaction};
pub use json_decoder::JsonEventDecoder;
