//! # JSON Event Decoder
//!
//! Decodes events whose payload was stored as a JSON object keyed by
//! camelCase parameter names. Field elements and amounts are hex strings,
//! tree nonces and dates are plain numbers.
//!
//! ```json
//! { "account": "0x5", "amount": "0x64",
//!   "accountUnlockedBalanceNow": "0x64", "vaultUnlockedBalanceNow": "0x3e8" }
//! ```

use crate::domain::{DecodeError, DecodedEvent, Event, EventKind};
use crate::ports::EventDecoder;
use serde::de::DeserializeOwned;

/// Decoder for JSON-object payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventDecoder;

impl JsonEventDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn params<T: DeserializeOwned>(kind: EventKind, event: &Event) -> Result<T, DecodeError> {
    T::deserialize(&event.payload).map_err(|e| DecodeError::MalformedPayload {
        kind,
        reason: e.to_string(),
    })
}

impl EventDecoder for JsonEventDecoder {
    fn decode(&self, event: &Event) -> Result<DecodedEvent, DecodeError> {
        let kind: EventKind = event.event_name.parse()?;

        let decoded = match kind {
            EventKind::ContractDeployed => DecodedEvent::ContractDeployed,
            EventKind::Deposit => DecodedEvent::Deposit(params(kind, event)?),
            EventKind::Withdrawal => DecodedEvent::Withdrawal(params(kind, event)?),
            EventKind::WithdrawalQueued => DecodedEvent::WithdrawalQueued(params(kind, event)?),
            EventKind::StashWithdrawn => DecodedEvent::StashWithdrawn(params(kind, event)?),
            EventKind::OptionRoundDeployed => {
                DecodedEvent::OptionRoundDeployed(params(kind, event)?)
            }
            EventKind::PricingDataSet => DecodedEvent::PricingDataSet(params(kind, event)?),
            EventKind::AuctionStarted => DecodedEvent::AuctionStarted(params(kind, event)?),
            EventKind::AuctionEnded => DecodedEvent::AuctionEnded(params(kind, event)?),
            EventKind::OptionRoundSettled => {
                DecodedEvent::OptionRoundSettled(params(kind, event)?)
            }
            EventKind::BidPlaced => DecodedEvent::BidPlaced(params(kind, event)?),
            EventKind::BidUpdated => DecodedEvent::BidUpdated(params(kind, event)?),
            EventKind::OptionsMinted => DecodedEvent::OptionsMinted(params(kind, event)?),
            EventKind::OptionsExercised => DecodedEvent::OptionsExercised(params(kind, event)?),
            EventKind::UnusedBidsRefunded => {
                DecodedEvent::UnusedBidsRefunded(params(kind, event)?)
            }
        };

        Ok(decoded)
    }
}
