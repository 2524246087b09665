//! # Indexer Runtime
//!
//! Process-level pieces of the indexer binary.
//!
//! ## Modules
//!
//! - `config` - `RuntimeConfig`: defaults, JSON file, `OVI_*` environment
//! - `fixtures` - seed vaults and pre-ingested events into the store
//! - `feeder` - turn `<channel> <json-payload>` input lines into notifications

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod feeder;
pub mod fixtures;

pub use config::{RuntimeConfig, RuntimeConfigError};
pub use feeder::{feed_notifications, parse_line, FeedError, FeedSummary};
pub use fixtures::{Fixtures, FixturesError};
