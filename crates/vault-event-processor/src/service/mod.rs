//! # Service Layer
//!
//! - `applier` - forward transition per event kind
//! - `reverter` - inverse transition per event kind
//! - `dispatcher` - notification loop and per-block transaction envelope

pub mod applier;
pub mod dispatcher;
pub mod reverter;

pub use applier::apply_event;
pub use dispatcher::{BlockEventDispatcher, DispatcherState};
pub use reverter::revert_event;

use crate::domain::{OptionRound, ProcessingError};
use crate::ports::OptionRoundStore;
use shared_types::Address;

/// Read a round that must exist.
pub(crate) fn lookup_round<S>(
    store: &S,
    round_address: &Address,
) -> Result<OptionRound, ProcessingError>
where
    S: OptionRoundStore + ?Sized,
{
    store
        .option_round(round_address)?
        .ok_or(ProcessingError::Lookup {
            round_address: *round_address,
        })
}
