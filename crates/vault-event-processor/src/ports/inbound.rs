//! # Inbound Ports (Driving Ports)
//!
//! The API the dispatcher offers to callers that drive batches directly,
//! such as tests or a retry layer re-delivering notifications.

use crate::domain::BatchError;
use async_trait::async_trait;
use shared_bus::Notification;
use shared_types::BlockNumber;
use std::fmt;
use uuid::Uuid;

/// Correlation ID tying together the log lines of one batch.
pub type CorrelationId = Uuid;

/// Which pass a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchDirection {
    /// Block ready: apply every event.
    Apply,
    /// Block reverted: undo every event.
    Revert,
}

impl fmt::Display for BatchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchDirection::Apply => f.write_str("apply"),
            BatchDirection::Revert => f.write_str("revert"),
        }
    }
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub block_number: BlockNumber,
    pub direction: BatchDirection,
    pub events_processed: usize,
    pub correlation_id: CorrelationId,
}

/// Counters since the dispatcher was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub batches_applied: u64,
    pub batches_reverted: u64,
    pub batches_failed: u64,
    pub events_applied: u64,
    pub events_reverted: u64,
    pub payloads_rejected: u64,
}

/// Block event processing API.
#[async_trait]
pub trait BlockEventProcessorApi: Send + Sync {
    /// Apply every event of `block_number` in one transaction.
    async fn apply_block(&self, block_number: BlockNumber) -> Result<BatchReport, BatchError>;

    /// Revert every event of `block_number` in one transaction.
    async fn revert_block(&self, block_number: BlockNumber) -> Result<BatchReport, BatchError>;

    /// Classify a notification by channel, parse its payload and run the batch.
    async fn process_notification(
        &self,
        notification: &Notification,
    ) -> Result<BatchReport, BatchError>;

    fn stats(&self) -> DispatcherStats;
}
