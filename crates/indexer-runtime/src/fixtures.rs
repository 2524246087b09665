//! # Fixtures
//!
//! Stand-in for the ingestion side: a JSON file of vault rows and stored
//! events loaded into the in-memory store before the dispatcher starts.
//!
//! ```json
//! {
//!   "vaults": [{ "address": "0x7a017", "unlockedBalance": "0x3e8" }],
//!   "events": [{ "blockNumber": 10, "eventName": "Deposit", "vaultAddress": "0x7a017",
//!                "timestamp": 1700000010, "payload": { "account": "0x5", ... } }]
//! }
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use vault_event_processor::domain::Vault;
use vault_event_processor::{Event, InMemoryStore};

#[derive(Debug, Error)]
pub enum FixturesError {
    #[error("Failed to read fixtures {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse fixtures {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Vault seeds and pre-ingested events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    pub vaults: Vec<Vault>,
    pub events: Vec<Event>,
}

impl Fixtures {
    pub fn load(path: &Path) -> Result<Self, FixturesError> {
        let text = std::fs::read_to_string(path).map_err(|e| FixturesError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text).map_err(|e| FixturesError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Seed `store`. Events keep file order within each block.
    pub fn install(self, store: &InMemoryStore) {
        for vault in self.vaults {
            debug!(vault = %vault.address, "Seeding vault");
            store.seed_vault(vault);
        }
        for event in self.events {
            store.insert_event(event);
        }
    }
}
