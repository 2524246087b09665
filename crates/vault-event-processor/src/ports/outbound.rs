//! # Outbound Ports (Driven Ports)
//!
//! Dependencies required by the event processor.
//!
//! Production backs the store traits with a relational database and the
//! notification source with `LISTEN`/`NOTIFY`. Testing and the bundled runtime
//! use `InMemoryStore` and `BusNotificationSource` from `adapters`.

use crate::domain::{
    AuctionOutcome, AuctionStart, Bid, DecodeError, DecodedEvent, Event, LiquidityMovedParams,
    OptionBuyer, OptionBuyerUpdate, OptionRound, PricingData, Settlement, SourceError,
    StashWithdrawnParams, StoreError, WithdrawalQueuedParams,
};
use async_trait::async_trait;
use shared_bus::Notification;
use shared_types::{Address, BlockNumber, Felt, U256};

/// Turns a stored event record into typed parameters.
pub trait EventDecoder: Send + Sync {
    fn decode(&self, event: &Event) -> Result<DecodedEvent, DecodeError>;
}

/// Read access to ingested events.
pub trait EventStore: Send + Sync {
    /// All events of `block_number`, in log order.
    fn events_by_block(&self, block_number: BlockNumber) -> Result<Vec<Event>, StoreError>;
}

/// The materialized view. Every mutation goes through a transaction.
pub trait MaterializedStore: Send + Sync {
    type Transaction: StoreTransaction;

    /// Open a transaction. Nothing written through it is visible until commit.
    fn begin(&self) -> Result<Self::Transaction, StoreError>;

    /// Forget the undo state kept for blocks below `below`, which are then
    /// treated as final. Returns how many entries were dropped.
    fn prune_undo_state(&self, _below: BlockNumber) -> Result<usize, StoreError> {
        Ok(0)
    }
}

/// One atomic unit of work over the materialized view.
///
/// ## Atomicity Guarantee
///
/// Either every write made through the transaction becomes visible on
/// `commit`, or none does. Dropping without commit is a rollback.
pub trait StoreTransaction: VaultStore + OptionRoundStore + BidStore + OptionBuyerStore {
    fn commit(self) -> Result<(), StoreError>
    where
        Self: Sized;

    fn rollback(self)
    where
        Self: Sized;
}

/// Vault and liquidity-provider balances.
///
/// Liquidity reverts restore the rows as they were before `block_number`;
/// the store keeps what it needs for that when the forward write happens.
pub trait VaultStore {
    fn deposit(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &LiquidityMovedParams,
    ) -> Result<(), StoreError>;

    fn withdraw(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &LiquidityMovedParams,
    ) -> Result<(), StoreError>;

    fn withdraw_stash(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &StashWithdrawnParams,
    ) -> Result<(), StoreError>;

    /// Undo Deposit, Withdrawal or StashWithdrawn of `account` at `block_number`.
    fn revert_liquidity(
        &mut self,
        vault_address: &Address,
        account: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError>;

    fn queue_withdrawal(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &WithdrawalQueuedParams,
    ) -> Result<(), StoreError>;

    fn revert_queued_withdrawal(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &WithdrawalQueuedParams,
    ) -> Result<(), StoreError>;
}

/// Option round rows and their lifecycle.
pub trait OptionRoundStore {
    fn option_round(&self, round_address: &Address) -> Result<Option<OptionRound>, StoreError>;

    fn deploy_round(&mut self, round: OptionRound) -> Result<(), StoreError>;

    fn delete_round(&mut self, round_address: &Address) -> Result<(), StoreError>;

    fn set_pricing(&mut self, round_address: &Address, pricing: PricingData)
        -> Result<(), StoreError>;

    /// Restore the pricing recorded at deployment.
    fn clear_pricing(&mut self, round_address: &Address) -> Result<(), StoreError>;

    /// Moves `starting_liquidity` from unlocked to locked.
    fn start_auction(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        start: AuctionStart,
    ) -> Result<(), StoreError>;

    fn revert_auction_start(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError>;

    /// Unlocks unsold liquidity and credits the premium.
    fn end_auction(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        outcome: AuctionOutcome,
    ) -> Result<(), StoreError>;

    fn revert_auction_end(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError>;

    /// Releases `sold_liquidity` from locked and credits what the payout leaves.
    fn settle_round(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        settlement: Settlement,
        sold_liquidity: U256,
    ) -> Result<(), StoreError>;

    fn revert_settlement(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError>;
}

/// The bid book.
pub trait BidStore {
    /// Insert the bid and make sure its buyer has a row in the round.
    fn insert_bid(&mut self, bid: Bid, block_number: BlockNumber) -> Result<(), StoreError>;

    /// Delete the bid, and the buyer row if this block created it and no bid
    /// of the buyer is left in the round.
    fn delete_bid(
        &mut self,
        round_address: &Address,
        bid_id: &Felt,
        block_number: BlockNumber,
    ) -> Result<(), StoreError>;

    fn update_bid(
        &mut self,
        round_address: &Address,
        bid_id: &Felt,
        price_increase: U256,
        tree_nonce_now: u64,
    ) -> Result<(), StoreError>;

    fn revert_bid_update(
        &mut self,
        round_address: &Address,
        bid_id: &Felt,
        price_increase: U256,
        tree_nonce_before: u64,
    ) -> Result<(), StoreError>;
}

/// Buyer flags.
pub trait OptionBuyerStore {
    fn option_buyer(
        &self,
        buyer: &Address,
        round_address: &Address,
    ) -> Result<Option<OptionBuyer>, StoreError>;

    /// Upsert the (buyer, round) row with the set fields of `update`.
    ///
    /// A missing row is only created when `update` sets a flag to `true`.
    fn update_option_buyer(
        &mut self,
        buyer: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        update: OptionBuyerUpdate,
    ) -> Result<(), StoreError>;
}

/// Source of change notifications.
#[async_trait]
pub trait NotificationSource: Send {
    /// Start receiving notifications on `channel`.
    async fn listen(&mut self, channel: &str) -> Result<(), SourceError>;

    /// Wait, without timeout, for the next notification.
    async fn wait_for_notification(&mut self) -> Result<Notification, SourceError>;
}
