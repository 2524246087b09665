//! # Event Catalogue
//!
//! The closed set of vault event kinds and their decoded parameters.
//!
//! Both the applier and the reverter match [`DecodedEvent`] exhaustively, so a
//! new kind cannot be added without deciding its forward and inverse handling.

use super::entities::PricingData;
use super::errors::DecodeError;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Felt, Timestamp, U256};
use std::fmt;
use std::str::FromStr;

/// Every event kind the vault contracts emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ContractDeployed,
    Deposit,
    Withdrawal,
    WithdrawalQueued,
    StashWithdrawn,
    OptionRoundDeployed,
    PricingDataSet,
    AuctionStarted,
    AuctionEnded,
    OptionRoundSettled,
    BidPlaced,
    BidUpdated,
    OptionsMinted,
    OptionsExercised,
    UnusedBidsRefunded,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::ContractDeployed,
        EventKind::Deposit,
        EventKind::Withdrawal,
        EventKind::WithdrawalQueued,
        EventKind::StashWithdrawn,
        EventKind::OptionRoundDeployed,
        EventKind::PricingDataSet,
        EventKind::AuctionStarted,
        EventKind::AuctionEnded,
        EventKind::OptionRoundSettled,
        EventKind::BidPlaced,
        EventKind::BidUpdated,
        EventKind::OptionsMinted,
        EventKind::OptionsExercised,
        EventKind::UnusedBidsRefunded,
    ];

    /// Stored event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ContractDeployed => "ContractDeployed",
            EventKind::Deposit => "Deposit",
            EventKind::Withdrawal => "Withdrawal",
            EventKind::WithdrawalQueued => "WithdrawalQueued",
            EventKind::StashWithdrawn => "StashWithdrawn",
            EventKind::OptionRoundDeployed => "OptionRoundDeployed",
            EventKind::PricingDataSet => "PricingDataSet",
            EventKind::AuctionStarted => "AuctionStarted",
            EventKind::AuctionEnded => "AuctionEnded",
            EventKind::OptionRoundSettled => "OptionRoundSettled",
            EventKind::BidPlaced => "BidPlaced",
            EventKind::BidUpdated => "BidUpdated",
            EventKind::OptionsMinted => "OptionsMinted",
            EventKind::OptionsExercised => "OptionsExercised",
            EventKind::UnusedBidsRefunded => "UnusedBidsRefunded",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DecodeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        // Older contract versions emit "Withdraw"
        if name == "Withdraw" {
            return Ok(EventKind::Withdrawal);
        }
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| DecodeError::UnknownEventKind {
                name: name.to_string(),
            })
    }
}

/// Deposit / Withdrawal: balances after the move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityMovedParams {
    pub account: Address,
    pub amount: U256,
    pub account_unlocked_balance_now: U256,
    pub vault_unlocked_balance_now: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalQueuedParams {
    pub account: Address,
    pub bps: U256,
    pub round_id: Felt,
    pub account_queued_liquidity_before: U256,
    pub account_queued_liquidity_now: U256,
    pub vault_queued_liquidity_now: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StashWithdrawnParams {
    pub account: Address,
    pub amount: U256,
    pub vault_stashed_balance_now: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRoundDeployedParams {
    pub round_id: Felt,
    pub round_address: Address,
    pub auction_start_date: Timestamp,
    pub auction_end_date: Timestamp,
    pub option_settlement_date: Timestamp,
    #[serde(default)]
    pub pricing: Option<PricingData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingDataSetParams {
    pub round_address: Address,
    pub strike_price: U256,
    pub cap_level: U256,
    pub reserve_price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionStartedParams {
    pub round_address: Address,
    pub options_available: U256,
    pub starting_liquidity: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionEndedParams {
    pub round_address: Address,
    pub options_sold: U256,
    pub clearing_price: U256,
    pub unsold_liquidity: U256,
    pub clearing_bid_tree_nonce: u64,
    pub premium: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRoundSettledParams {
    pub round_address: Address,
    pub settlement_price: U256,
    pub payout_per_option: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPlacedParams {
    pub account: Address,
    pub round_address: Address,
    pub bid_id: Felt,
    pub amount: U256,
    pub price: U256,
    pub bid_tree_nonce_now: u64,
}

/// Carries both nonces so the update can be inverted from the event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidUpdatedParams {
    pub account: Address,
    pub round_address: Address,
    pub bid_id: Felt,
    pub price_increase: U256,
    pub bid_tree_nonce_before: u64,
    pub bid_tree_nonce_now: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsMintedParams {
    pub account: Address,
    pub round_address: Address,
    pub minted_amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsExercisedParams {
    pub account: Address,
    pub round_address: Address,
    pub total_options_exercised: U256,
    pub mintable_options_exercised: U256,
    pub exercised_amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnusedBidsRefundedParams {
    pub account: Address,
    pub round_address: Address,
    pub refunded_amount: U256,
}

/// A stored event decoded into its kind's parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    ContractDeployed,
    Deposit(LiquidityMovedParams),
    Withdrawal(LiquidityMovedParams),
    WithdrawalQueued(WithdrawalQueuedParams),
    StashWithdrawn(StashWithdrawnParams),
    OptionRoundDeployed(OptionRoundDeployedParams),
    PricingDataSet(PricingDataSetParams),
    AuctionStarted(AuctionStartedParams),
    AuctionEnded(AuctionEndedParams),
    OptionRoundSettled(OptionRoundSettledParams),
    BidPlaced(BidPlacedParams),
    BidUpdated(BidUpdatedParams),
    OptionsMinted(OptionsMintedParams),
    OptionsExercised(OptionsExercisedParams),
    UnusedBidsRefunded(UnusedBidsRefundedParams),
}

impl DecodedEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            DecodedEvent::ContractDeployed => EventKind::ContractDeployed,
            DecodedEvent::Deposit(_) => EventKind::Deposit,
            DecodedEvent::Withdrawal(_) => EventKind::Withdrawal,
            DecodedEvent::WithdrawalQueued(_) => EventKind::WithdrawalQueued,
            DecodedEvent::StashWithdrawn(_) => EventKind::StashWithdrawn,
            DecodedEvent::OptionRoundDeployed(_) => EventKind::OptionRoundDeployed,
            DecodedEvent::PricingDataSet(_) => EventKind::PricingDataSet,
            DecodedEvent::AuctionStarted(_) => EventKind::AuctionStarted,
            DecodedEvent::AuctionEnded(_) => EventKind::AuctionEnded,
            DecodedEvent::OptionRoundSettled(_) => EventKind::OptionRoundSettled,
            DecodedEvent::BidPlaced(_) => EventKind::BidPlaced,
            DecodedEvent::BidUpdated(_) => EventKind::BidUpdated,
            DecodedEvent::OptionsMinted(_) => EventKind::OptionsMinted,
            DecodedEvent::OptionsExercised(_) => EventKind::OptionsExercised,
            DecodedEvent::UnusedBidsRefunded(_) => EventKind::UnusedBidsRefunded,
        }
    }
}
