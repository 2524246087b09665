//! # Domain Layer
//!
//! Entities of the materialized view, the event catalogue and error types.
//!
//! ## Modules
//!
//! - `entities` - Vault, OptionRound, Bid, OptionBuyer and the stored Event record
//! - `events` - `EventKind` catalogue and per-kind decoded parameters
//! - `errors` - Batch-local and fatal error types

pub mod entities;
pub mod errors;
pub mod events;

pub use entities::*;
pub use errors::*;
pub use events::*;
