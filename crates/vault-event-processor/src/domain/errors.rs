//! # Domain Errors
//!
//! Error types for event application.
//!
//! ## Categories
//!
//! - Batch-local: `DecodeError`, `StoreError`, `ProcessingError`, `BatchError`.
//!   The batch is rolled back and the dispatcher keeps running.
//! - Fatal: `DispatcherError`. The dispatcher loop ends.

use super::entities::RoundState;
use super::events::EventKind;
use shared_types::{Address, BlockNumber};
use thiserror::Error;

/// Errors raised while decoding a stored event into typed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The stored event name is not part of the catalogue.
    #[error("Unknown event kind: {name}")]
    UnknownEventKind { name: String },

    /// The payload does not match the kind's parameter layout.
    #[error("Malformed {kind} payload: {reason}")]
    MalformedPayload { kind: EventKind, reason: String },
}

/// Errors raised by the materialized store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Row does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Write rejected by an integrity rule.
    #[error("Constraint violation: {reason}")]
    ConstraintViolation { reason: String },

    /// Checked addition overflowed.
    #[error("Arithmetic overflow on {field}")]
    Overflow { field: &'static str },

    /// Checked subtraction underflowed.
    #[error("Arithmetic underflow on {field}")]
    Underflow { field: &'static str },

    /// The store behind the transaction is gone.
    #[error("Transaction closed")]
    TransactionClosed,

    /// Another transaction committed since this one began.
    #[error("Transaction conflict: store at version {actual}, transaction began at {expected}")]
    Conflict { expected: u64, actual: u64 },

    /// Backend failure (connectivity, I/O).
    #[error("Store backend error: {reason}")]
    Backend { reason: String },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn constraint(reason: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            reason: reason.into(),
        }
    }
}

/// Errors raised while applying or reverting a single event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A round needed to recover context is not in the store.
    #[error("Option round lookup failed: {round_address}")]
    Lookup { round_address: Address },

    /// The round is not in the stage the event requires.
    #[error("Option round {round_address} is {state:?}, expected {expected:?}")]
    UnexpectedRoundState {
        round_address: Address,
        state: RoundState,
        expected: RoundState,
    },

    /// Derived value did not fit.
    #[error("Arithmetic error deriving {field}")]
    Arithmetic { field: &'static str },

    #[error("Store rejected mutation: {0}")]
    Store(#[from] StoreError),
}

/// Errors that abandon the batch for one notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    /// Notification arrived on a channel that is not configured.
    #[error("Unknown channel: {channel}")]
    UnknownChannel { channel: String },

    /// Payload is not `{ "blockNumber": <u64> }`.
    #[error("Invalid payload on {channel}: {reason}")]
    InvalidPayload { channel: String, reason: String },

    #[error("Failed to fetch events for block {block_number}: {source}")]
    EventFetch {
        block_number: BlockNumber,
        source: StoreError,
    },

    #[error("Failed to begin transaction: {source}")]
    Begin { source: StoreError },

    /// One event failed; nothing from the batch is visible.
    #[error("Event #{position} ({event_name}) in block {block_number} failed: {source}")]
    Event {
        block_number: BlockNumber,
        position: usize,
        event_name: String,
        source: ProcessingError,
    },

    #[error("Failed to commit block {block_number}: {source}")]
    Commit {
        block_number: BlockNumber,
        source: StoreError,
    },
}

/// Errors raised by a notification source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Could not listen on a channel.
    #[error("Cannot listen on {channel}: {reason}")]
    Subscription { channel: String, reason: String },

    /// Source closed; no further notifications will arrive.
    #[error("Notification source closed")]
    Closed,

    #[error("Notification source error: {reason}")]
    Connection { reason: String },
}

/// Fatal errors that stop the dispatcher loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatcherError {
    #[error("Subscription to {channel} failed: {source}")]
    Subscription {
        channel: String,
        source: SourceError,
    },

    #[error("Notification source closed")]
    SourceClosed,

    #[error("Notification source failed: {0}")]
    Source(SourceError),
}

impl From<SourceError> for DispatcherError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::Closed => Self::SourceClosed,
            other => Self::Source(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_closed_maps_to_source_closed() {
        assert_eq!(
            DispatcherError::from(SourceError::Closed),
            DispatcherError::SourceClosed
        );
        assert!(matches!(
            DispatcherError::from(SourceError::Connection {
                reason: "reset".into()
            }),
            DispatcherError::Source(_)
        ));
    }

    #[test]
    fn test_batch_error_message_names_event() {
        let error = BatchError::Event {
            block_number: 100,
            position: 2,
            event_name: "BidPlaced".into(),
            source: ProcessingError::Store(StoreError::constraint("duplicate bid")),
        };
        let message = error.to_string();
        assert!(message.contains("#2"));
        assert!(message.contains("BidPlaced"));
        assert!(message.contains("block 100"));
    }
}
