//! # Dispatcher Configuration

use serde::{Deserialize, Serialize};
use shared_bus::{BLOCK_READY_CHANNEL, BLOCK_REVERTED_CHANNEL};
use shared_types::BlockNumber;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Order in which a reverted block's events are undone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevertOrder {
    /// Last event first. Each revert sees the state its event left behind.
    #[default]
    Reverse,
    /// Same order as the apply pass.
    Stored,
}

impl fmt::Display for RevertOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevertOrder::Reverse => f.write_str("reverse"),
            RevertOrder::Stored => f.write_str("stored"),
        }
    }
}

impl FromStr for RevertOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reverse" => Ok(RevertOrder::Reverse),
            "stored" => Ok(RevertOrder::Stored),
            other => Err(ConfigError::InvalidRevertOrder {
                value: other.to_string(),
            }),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid revert order {value:?} (expected \"reverse\" or \"stored\")")]
    InvalidRevertOrder { value: String },

    #[error("Channel name must not be empty")]
    EmptyChannel,

    #[error("Block ready and block reverted channels are both {channel:?}")]
    DuplicateChannel { channel: String },
}

/// Blocks behind the newest applied block whose undo state is kept.
pub const DEFAULT_UNDO_RETENTION_BLOCKS: u64 = 128;

/// Dispatcher configuration.
///
/// The same channel names are used to subscribe and to classify incoming
/// notifications, so producer and consumer only have to agree here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Channel carrying "block ready" signals.
    pub block_ready_channel: String,
    /// Channel carrying "block reverted" signals.
    pub block_reverted_channel: String,
    pub revert_order: RevertOrder,
    /// How deep a reorg can still be reverted. After applying block N the
    /// store forgets undo state below `N - undo_retention_blocks`.
    /// Zero keeps everything.
    pub undo_retention_blocks: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            block_ready_channel: BLOCK_READY_CHANNEL.to_string(),
            block_reverted_channel: BLOCK_REVERTED_CHANNEL.to_string(),
            revert_order: RevertOrder::default(),
            undo_retention_blocks: DEFAULT_UNDO_RETENTION_BLOCKS,
        }
    }
}

impl DispatcherConfig {
    /// First block whose undo state must survive once `applied` is applied.
    pub fn undo_horizon(&self, applied: BlockNumber) -> Option<BlockNumber> {
        match self.undo_retention_blocks {
            0 => None,
            depth => applied.checked_sub(depth).filter(|horizon| *horizon > 0),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_ready_channel.is_empty() || self.block_reverted_channel.is_empty() {
            return Err(ConfigError::EmptyChannel);
        }
        if self.block_ready_channel == self.block_reverted_channel {
            return Err(ConfigError::DuplicateChannel {
                channel: self.block_ready_channel.clone(),
            });
        }
        Ok(())
    }
}
