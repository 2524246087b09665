//! # Domain Entities
//!
//! Rows of the materialized view and the stored event record.

use super::events::{
    AuctionEndedParams, AuctionStartedParams, BidPlacedParams, OptionRoundDeployedParams,
    PricingDataSetParams,
};
use serde::{Deserialize, Serialize};
use shared_types::{Address, BlockNumber, Felt, Timestamp, U256};

/// An already-persisted on-chain occurrence.
///
/// Created upstream at ingestion and only ever read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub block_number: BlockNumber,
    pub event_name: String,
    pub vault_address: Address,
    pub timestamp: Timestamp,
    /// Opaque to the core; interpreted by the event decoder.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    /// The parts of the record that handlers need besides the decoded parameters.
    #[must_use]
    pub fn context(&self) -> EventContext {
        EventContext {
            block_number: self.block_number,
            vault_address: self.vault_address,
            timestamp: self.timestamp,
        }
    }
}

/// Block coordinates and owning vault of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventContext {
    pub block_number: BlockNumber,
    pub vault_address: Address,
    pub timestamp: Timestamp,
}

/// Aggregate liquidity of one vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    pub address: Address,
    #[serde(default)]
    pub unlocked_balance: U256,
    #[serde(default)]
    pub locked_balance: U256,
    #[serde(default)]
    pub stashed_balance: U256,
    #[serde(default)]
    pub queued_liquidity: U256,
}

impl Vault {
    /// An empty vault at `address`.
    #[must_use]
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

/// One account's position in a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidityProvider {
    pub account: Address,
    pub vault_address: Address,
    pub unlocked_balance: U256,
    pub stashed_balance: U256,
    pub queued_liquidity: U256,
}

impl LiquidityProvider {
    #[must_use]
    pub fn new(vault_address: Address, account: Address) -> Self {
        Self {
            account,
            vault_address,
            ..Self::default()
        }
    }
}

/// Liquidity an account queued for withdrawal at the end of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLiquidity {
    pub account: Address,
    pub round_id: Felt,
    pub bps: U256,
    pub queued_liquidity: U256,
}

/// Lifecycle stage of an option round.
///
/// ```text
/// Open ──AuctionStarted──→ Auctioning ──AuctionEnded──→ Running ──OptionRoundSettled──→ Settled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundState {
    Open,
    Auctioning,
    Running,
    Settled,
}

impl RoundState {
    /// The stage an event of this stage reverts to.
    #[must_use]
    pub fn previous(self) -> Option<RoundState> {
        match self {
            RoundState::Open => None,
            RoundState::Auctioning => Some(RoundState::Open),
            RoundState::Running => Some(RoundState::Auctioning),
            RoundState::Settled => Some(RoundState::Running),
        }
    }
}

/// Strike, cap and reserve of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingData {
    pub strike_price: U256,
    pub cap_level: U256,
    pub reserve_price: U256,
}

/// Metrics recorded when the auction starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionStart {
    pub options_available: U256,
    pub starting_liquidity: U256,
}

/// Metrics recorded when the auction ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionOutcome {
    pub options_sold: U256,
    pub clearing_price: U256,
    pub unsold_liquidity: U256,
    pub clearing_bid_tree_nonce: u64,
    pub premium: U256,
}

/// Metrics recorded at settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub settlement_price: U256,
    pub payout_per_option: U256,
    pub total_payout: U256,
}

/// One options-auction cycle of a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRound {
    pub address: Address,
    pub vault_address: Address,
    pub round_id: Felt,
    pub state: RoundState,
    pub deployment_date: Timestamp,
    pub auction_start_date: Timestamp,
    pub auction_end_date: Timestamp,
    pub option_settlement_date: Timestamp,
    /// Pricing carried by the deployment event, restored when a later
    /// pricing update is reverted.
    pub initial_pricing: Option<PricingData>,
    pub pricing: Option<PricingData>,
    pub auction: Option<AuctionStart>,
    pub outcome: Option<AuctionOutcome>,
    pub settlement: Option<Settlement>,
}

impl OptionRound {
    /// A freshly deployed round.
    #[must_use]
    pub fn deployed(
        vault_address: Address,
        deployment_date: Timestamp,
        params: &OptionRoundDeployedParams,
    ) -> Self {
        Self {
            address: params.round_address,
            vault_address,
            round_id: params.round_id,
            state: RoundState::Open,
            deployment_date,
            auction_start_date: params.auction_start_date,
            auction_end_date: params.auction_end_date,
            option_settlement_date: params.option_settlement_date,
            initial_pricing: params.pricing.clone(),
            pricing: params.pricing.clone(),
            auction: None,
            outcome: None,
            settlement: None,
        }
    }
}

impl From<&PricingDataSetParams> for PricingData {
    fn from(params: &PricingDataSetParams) -> Self {
        Self {
            strike_price: params.strike_price,
            cap_level: params.cap_level,
            reserve_price: params.reserve_price,
        }
    }
}

impl From<&AuctionStartedParams> for AuctionStart {
    fn from(params: &AuctionStartedParams) -> Self {
        Self {
            options_available: params.options_available,
            starting_liquidity: params.starting_liquidity,
        }
    }
}

impl From<&AuctionEndedParams> for AuctionOutcome {
    fn from(params: &AuctionEndedParams) -> Self {
        Self {
            options_sold: params.options_sold,
            clearing_price: params.clearing_price,
            unsold_liquidity: params.unsold_liquidity,
            clearing_bid_tree_nonce: params.clearing_bid_tree_nonce,
            premium: params.premium,
        }
    }
}

/// A bid in a round's auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub bid_id: Felt,
    pub round_address: Address,
    pub buyer: Address,
    pub amount: U256,
    pub price: U256,
    pub tree_nonce: u64,
}

impl From<&BidPlacedParams> for Bid {
    fn from(params: &BidPlacedParams) -> Self {
        Self {
            bid_id: params.bid_id,
            round_address: params.round_address,
            buyer: params.account,
            amount: params.amount,
            price: params.price,
            tree_nonce: params.bid_tree_nonce_now,
        }
    }
}

/// Post-settlement flags of a buyer in a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionBuyer {
    pub address: Address,
    pub round_address: Address,
    pub has_minted: bool,
    pub has_refunded: bool,
}

impl OptionBuyer {
    #[must_use]
    pub fn new(address: Address, round_address: Address) -> Self {
        Self {
            address,
            round_address,
            has_minted: false,
            has_refunded: false,
        }
    }
}

/// Partial update of an [`OptionBuyer`]. `None` leaves the field unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionBuyerUpdate {
    pub has_minted: Option<bool>,
    pub has_refunded: Option<bool>,
}

impl OptionBuyerUpdate {
    #[must_use]
    pub fn minted(value: bool) -> Self {
        Self {
            has_minted: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn refunded(value: bool) -> Self {
        Self {
            has_refunded: Some(value),
            ..Self::default()
        }
    }

    /// True when no field would be set to `true`.
    #[must_use]
    pub fn only_clears(&self) -> bool {
        self.has_minted != Some(true) && self.has_refunded != Some(true)
    }

    /// Write the set fields into `buyer`.
    pub fn apply_to(&self, buyer: &mut OptionBuyer) {
        if let Some(has_minted) = self.has_minted {
            buyer.has_minted = has_minted;
        }
        if let Some(has_refunded) = self.has_refunded {
            buyer.has_refunded = has_refunded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_state_previous() {
        assert_eq!(RoundState::Open.previous(), None);
        assert_eq!(RoundState::Auctioning.previous(), Some(RoundState::Open));
        assert_eq!(RoundState::Running.previous(), Some(RoundState::Auctioning));
        assert_eq!(RoundState::Settled.previous(), Some(RoundState::Running));
    }

    #[test]
    fn test_buyer_update_touches_only_set_fields() {
        let mut buyer = OptionBuyer::new(Felt::from(1), Felt::from(2));
        buyer.has_refunded = true;

        OptionBuyerUpdate::minted(true).apply_to(&mut buyer);
        assert!(buyer.has_minted);
        assert!(buyer.has_refunded);

        OptionBuyerUpdate::refunded(false).apply_to(&mut buyer);
        assert!(buyer.has_minted);
        assert!(!buyer.has_refunded);

        OptionBuyerUpdate::default().apply_to(&mut buyer);
        assert!(buyer.has_minted);
    }

    #[test]
    fn test_only_clears() {
        assert!(OptionBuyerUpdate::minted(false).only_clears());
        assert!(OptionBuyerUpdate::default().only_clears());
        assert!(!OptionBuyerUpdate::refunded(true).only_clears());
        let mixed = OptionBuyerUpdate {
            has_minted: Some(false),
            has_refunded: Some(true),
        };
        assert!(!mixed.only_clears());
    }

    #[test]
    fn test_event_deserializes_from_camel_case() {
        let event: Event = serde_json::from_value(serde_json::json!({
            "blockNumber": 100,
            "eventName": "Deposit",
            "vaultAddress": "0x1",
            "timestamp": 1700000000,
            "payload": { "account": "0x2" }
        }))
        .unwrap();

        assert_eq!(event.block_number, 100);
        assert_eq!(event.vault_address, Felt::from(1));
        assert_eq!(event.context().timestamp, 1_700_000_000);
    }
}
