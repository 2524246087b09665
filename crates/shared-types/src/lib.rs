//! # Shared Types Crate
//!
//! Chain scalar types used across the indexer crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate names addresses, amounts and
//!   block coordinates through the types defined here.
//! - **Hex on the wire**: field elements serialize as `0x`-prefixed hex
//!   strings, the way the source chain's RPC renders them.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
