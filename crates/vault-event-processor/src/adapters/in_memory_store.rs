//! # In-Memory Materialized Store
//!
//! Transactional in-memory implementation of the store ports.
//!
//! ## Transactions
//!
//! `begin` copies the committed view into the transaction. Writes go to the
//! copy; `commit` swaps it in if nobody committed in between, otherwise it
//! fails with `StoreError::Conflict`. Dropping a transaction discards it.
//!
//! ## Pre-block snapshots
//!
//! The first liquidity write to a vault or provider row at block B keeps the
//! row as it was before B. Liquidity reverts at B put that copy back and
//! drop it, so a second revert at B for the same row does nothing.
//! `queued_liquidity` is left out of the restore: only WithdrawalQueued
//! writes it, and its revert works from the event's own figures.
//!
//! Snapshots of blocks that are never reverted are dropped by
//! `MaterializedStore::prune_undo_state` once those blocks are final.

use crate::domain::{
    AuctionOutcome, AuctionStart, Bid, Event, LiquidityMovedParams, LiquidityProvider,
    OptionBuyer, OptionBuyerUpdate, OptionRound, PricingData, QueuedLiquidity, RoundState,
    Settlement, StashWithdrawnParams, StoreError, Vault, WithdrawalQueuedParams,
};
use crate::ports::{
    BidStore, EventStore, MaterializedStore, OptionBuyerStore, OptionRoundStore,
    StoreTransaction, VaultStore,
};
use parking_lot::RwLock;
use shared_types::{Address, BlockNumber, Felt, U256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use tracing::debug;

type ProviderKey = (Address, Address);
type QueuedKey = (Address, Address, Felt);
type BidKey = (Address, Felt);
type BuyerKey = (Address, Address);

/// Committed materialized view.
#[derive(Debug, Clone, Default)]
struct ViewState {
    version: u64,
    vaults: HashMap<Address, Vault>,
    /// (vault, account)
    providers: HashMap<ProviderKey, LiquidityProvider>,
    /// (vault, account, round id)
    queued: HashMap<QueuedKey, QueuedLiquidity>,
    rounds: HashMap<Address, OptionRound>,
    /// (round, bid id)
    bids: HashMap<BidKey, Bid>,
    /// (buyer, round)
    buyers: HashMap<BuyerKey, OptionBuyer>,
    /// Block that created each buyer row.
    buyer_origins: HashMap<BuyerKey, BlockNumber>,
    vault_snapshots: HashMap<(Address, BlockNumber), Vault>,
    provider_snapshots: HashMap<(Address, Address, BlockNumber), Option<LiquidityProvider>>,
}

fn checked_add(a: U256, b: U256, field: &'static str) -> Result<U256, StoreError> {
    a.checked_add(b).ok_or(StoreError::Overflow { field })
}

fn checked_sub(a: U256, b: U256, field: &'static str) -> Result<U256, StoreError> {
    a.checked_sub(b).ok_or(StoreError::Underflow { field })
}

impl ViewState {
    fn vault_mut(&mut self, address: &Address) -> Result<&mut Vault, StoreError> {
        self.vaults
            .get_mut(address)
            .ok_or_else(|| StoreError::not_found("vault", address))
    }

    fn provider_mut(&mut self, vault: &Address, account: &Address) -> &mut LiquidityProvider {
        self.providers
            .entry((*vault, *account))
            .or_insert_with(|| LiquidityProvider::new(*vault, *account))
    }

    fn round_mut(&mut self, address: &Address) -> Result<&mut OptionRound, StoreError> {
        self.rounds
            .get_mut(address)
            .ok_or_else(|| StoreError::not_found("option round", address))
    }

    fn round_in_stage(
        &mut self,
        address: &Address,
        expected: RoundState,
    ) -> Result<&mut OptionRound, StoreError> {
        let round = self.round_mut(address)?;
        if round.state != expected {
            return Err(StoreError::constraint(format!(
                "option round {address} is {:?}, expected {expected:?}",
                round.state
            )));
        }
        Ok(round)
    }

    fn bid_mut(&mut self, round: &Address, bid_id: &Felt) -> Result<&mut Bid, StoreError> {
        self.bids
            .get_mut(&(*round, *bid_id))
            .ok_or_else(|| StoreError::not_found("bid", bid_id))
    }

    fn snapshot_vault(&mut self, address: &Address, block: BlockNumber) -> Result<(), StoreError> {
        let current = self
            .vaults
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::not_found("vault", address))?;
        self.vault_snapshots
            .entry((*address, block))
            .or_insert(current);
        Ok(())
    }

    fn snapshot_provider(&mut self, vault: &Address, account: &Address, block: BlockNumber) {
        let current = self.providers.get(&(*vault, *account)).cloned();
        self.provider_snapshots
            .entry((*vault, *account, block))
            .or_insert(current);
    }

    fn restore_vault(&mut self, address: &Address, block: BlockNumber) {
        if let Some(mut previous) = self.vault_snapshots.remove(&(*address, block)) {
            if let Some(current) = self.vaults.get(address) {
                previous.queued_liquidity = current.queued_liquidity;
            }
            self.vaults.insert(*address, previous);
        }
    }

    fn restore_provider(&mut self, vault: &Address, account: &Address, block: BlockNumber) {
        match self.provider_snapshots.remove(&(*vault, *account, block)) {
            Some(Some(mut previous)) => {
                if let Some(current) = self.providers.get(&(*vault, *account)) {
                    previous.queued_liquidity = current.queued_liquidity;
                }
                self.providers.insert((*vault, *account), previous);
            }
            Some(None) => {
                self.providers.remove(&(*vault, *account));
            }
            None => {}
        }
    }

    fn move_liquidity(
        &mut self,
        vault: &Address,
        block: BlockNumber,
        params: &LiquidityMovedParams,
    ) -> Result<(), StoreError> {
        self.snapshot_vault(vault, block)?;
        self.snapshot_provider(vault, &params.account, block);

        self.vault_mut(vault)?.unlocked_balance = params.vault_unlocked_balance_now;
        self.provider_mut(vault, &params.account).unlocked_balance =
            params.account_unlocked_balance_now;
        Ok(())
    }

    /// Step a round back from `current` and restore the vault as it was before `block`.
    fn step_back(
        &mut self,
        vault: &Address,
        round_address: &Address,
        block: BlockNumber,
        current: RoundState,
    ) -> Result<(), StoreError> {
        let round = self.round_in_stage(round_address, current)?;
        match current {
            RoundState::Auctioning => round.auction = None,
            RoundState::Running => round.outcome = None,
            RoundState::Settled => round.settlement = None,
            RoundState::Open => {
                return Err(StoreError::constraint(format!(
                    "option round {round_address} has no earlier stage"
                )))
            }
        }
        round.state = current.previous().unwrap_or(RoundState::Open);
        self.restore_vault(vault, block);
        Ok(())
    }
}

/// In-memory store of events and the materialized view.
pub struct InMemoryStore {
    view: Arc<RwLock<ViewState>>,
    events: RwLock<BTreeMap<BlockNumber, Vec<Event>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            view: Arc::new(RwLock::new(ViewState::default())),
            events: RwLock::new(BTreeMap::new()),
        }
    }

    /// Append an ingested event to its block, after any already stored.
    pub fn insert_event(&self, event: Event) {
        self.events
            .write()
            .entry(event.block_number)
            .or_default()
            .push(event);
    }

    /// Create or replace a vault row. Vaults are created outside the event flow.
    pub fn seed_vault(&self, vault: Vault) {
        let mut view = self.view.write();
        view.vaults.insert(vault.address, vault);
        view.version += 1;
    }

    /// Snapshot entries currently held, vault and provider rows together.
    pub fn undo_snapshot_count(&self) -> usize {
        let view = self.view.read();
        view.vault_snapshots.len() + view.provider_snapshots.len()
    }

    /// Number of committed transactions (plus seeds).
    pub fn version(&self) -> u64 {
        self.view.read().version
    }

    pub fn vault(&self, address: &Address) -> Option<Vault> {
        self.view.read().vaults.get(address).cloned()
    }

    pub fn liquidity_provider(&self, vault: &Address, account: &Address) -> Option<LiquidityProvider> {
        self.view.read().providers.get(&(*vault, *account)).cloned()
    }

    pub fn queued_liquidity(
        &self,
        vault: &Address,
        account: &Address,
        round_id: &Felt,
    ) -> Option<QueuedLiquidity> {
        self.view
            .read()
            .queued
            .get(&(*vault, *account, *round_id))
            .cloned()
    }

    pub fn option_round(&self, address: &Address) -> Option<OptionRound> {
        self.view.read().rounds.get(address).cloned()
    }

    pub fn bid(&self, round: &Address, bid_id: &Felt) -> Option<Bid> {
        self.view.read().bids.get(&(*round, *bid_id)).cloned()
    }

    pub fn option_buyer(&self, buyer: &Address, round: &Address) -> Option<OptionBuyer> {
        self.view.read().buyers.get(&(*buyer, *round)).cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for InMemoryStore {
    fn events_by_block(&self, block_number: BlockNumber) -> Result<Vec<Event>, StoreError> {
        Ok(self
            .events
            .read()
            .get(&block_number)
            .cloned()
            .unwrap_or_default())
    }
}

impl MaterializedStore for InMemoryStore {
    type Transaction = InMemoryTransaction;

    fn prune_undo_state(&self, below: BlockNumber) -> Result<usize, StoreError> {
        let mut view = self.view.write();
        let held = view.vault_snapshots.len()
            + view.provider_snapshots.len()
            + view.buyer_origins.len();
        view.vault_snapshots.retain(|(_, block), _| *block >= below);
        view.provider_snapshots.retain(|(_, _, block), _| *block >= below);
        view.buyer_origins.retain(|_, block| *block >= below);
        let dropped = held
            - view.vault_snapshots.len()
            - view.provider_snapshots.len()
            - view.buyer_origins.len();
        if dropped > 0 {
            // Transactions opened before this must not commit the pruned state back
            view.version += 1;
            debug!(below, dropped, "Undo state pruned");
        }
        Ok(dropped)
    }

    fn begin(&self) -> Result<InMemoryTransaction, StoreError> {
        let working = self.view.read().clone();
        Ok(InMemoryTransaction {
            base_version: working.version,
            working,
            view: Arc::downgrade(&self.view),
        })
    }
}

/// A transaction over [`InMemoryStore`].
pub struct InMemoryTransaction {
    base_version: u64,
    working: ViewState,
    view: Weak<RwLock<ViewState>>,
}

impl StoreTransaction for InMemoryTransaction {
    fn commit(self) -> Result<(), StoreError> {
        let view = self.view.upgrade().ok_or(StoreError::TransactionClosed)?;
        let mut committed = view.write();
        if committed.version != self.base_version {
            return Err(StoreError::Conflict {
                expected: self.base_version,
                actual: committed.version,
            });
        }

        let mut working = self.working;
        working.version = self.base_version + 1;
        *committed = working;
        debug!(version = committed.version, "Transaction committed");
        Ok(())
    }

    fn rollback(self) {
        debug!(base_version = self.base_version, "Transaction rolled back");
    }
}

impl VaultStore for InMemoryTransaction {
    fn deposit(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &LiquidityMovedParams,
    ) -> Result<(), StoreError> {
        self.working
            .move_liquidity(vault_address, block_number, params)
    }

    fn withdraw(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &LiquidityMovedParams,
    ) -> Result<(), StoreError> {
        self.working
            .move_liquidity(vault_address, block_number, params)
    }

    fn withdraw_stash(
        &mut self,
        vault_address: &Address,
        block_number: BlockNumber,
        params: &StashWithdrawnParams,
    ) -> Result<(), StoreError> {
        let view = &mut self.working;
        view.snapshot_vault(vault_address, block_number)?;
        view.snapshot_provider(vault_address, &params.account, block_number);

        view.vault_mut(vault_address)?.stashed_balance = params.vault_stashed_balance_now;
        view.provider_mut(vault_address, &params.account)
            .stashed_balance = U256::zero();
        Ok(())
    }

    fn revert_liquidity(
        &mut self,
        vault_address: &Address,
        account: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError> {
        self.working
            .restore_provider(vault_address, account, block_number);
        self.working.restore_vault(vault_address, block_number);
        Ok(())
    }

    fn queue_withdrawal(
        &mut self,
        vault_address: &Address,
        _block_number: BlockNumber,
        params: &WithdrawalQueuedParams,
    ) -> Result<(), StoreError> {
        let view = &mut self.working;
        view.vault_mut(vault_address)?.queued_liquidity = params.vault_queued_liquidity_now;
        view.provider_mut(vault_address, &params.account)
            .queued_liquidity = params.account_queued_liquidity_now;
        view.queued.insert(
            (*vault_address, params.account, params.round_id),
            QueuedLiquidity {
                account: params.account,
                round_id: params.round_id,
                bps: params.bps,
                queued_liquidity: params.account_queued_liquidity_now,
            },
        );
        Ok(())
    }

    fn revert_queued_withdrawal(
        &mut self,
        vault_address: &Address,
        _block_number: BlockNumber,
        params: &WithdrawalQueuedParams,
    ) -> Result<(), StoreError> {
        let before = params.account_queued_liquidity_before;
        let now = params.account_queued_liquidity_now;
        // The event may have raised or lowered the account's queue
        let vault_queued = if now >= before {
            checked_sub(
                params.vault_queued_liquidity_now,
                now - before,
                "vault.queued_liquidity",
            )?
        } else {
            checked_add(
                params.vault_queued_liquidity_now,
                before - now,
                "vault.queued_liquidity",
            )?
        };

        let view = &mut self.working;
        view.vault_mut(vault_address)?.queued_liquidity = vault_queued;
        match view.providers.get_mut(&(*vault_address, params.account)) {
            Some(provider) => provider.queued_liquidity = before,
            // Already removed by a liquidity revert of the block that created it
            None if before.is_zero() => {}
            None => return Err(StoreError::not_found("liquidity provider", params.account)),
        }

        let key = (*vault_address, params.account, params.round_id);
        if params.account_queued_liquidity_before.is_zero() {
            view.queued.remove(&key);
        } else if let Some(row) = view.queued.get_mut(&key) {
            row.queued_liquidity = params.account_queued_liquidity_before;
        }
        Ok(())
    }
}

impl OptionRoundStore for InMemoryTransaction {
    fn option_round(&self, round_address: &Address) -> Result<Option<OptionRound>, StoreError> {
        Ok(self.working.rounds.get(round_address).cloned())
    }

    fn deploy_round(&mut self, round: OptionRound) -> Result<(), StoreError> {
        if self.working.rounds.contains_key(&round.address) {
            return Err(StoreError::constraint(format!(
                "option round {} already deployed",
                round.address
            )));
        }
        self.working.rounds.insert(round.address, round);
        Ok(())
    }

    fn delete_round(&mut self, round_address: &Address) -> Result<(), StoreError> {
        self.working
            .rounds
            .remove(round_address)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("option round", round_address))
    }

    fn set_pricing(
        &mut self,
        round_address: &Address,
        pricing: PricingData,
    ) -> Result<(), StoreError> {
        self.working
            .round_in_stage(round_address, RoundState::Open)?
            .pricing = Some(pricing);
        Ok(())
    }

    fn clear_pricing(&mut self, round_address: &Address) -> Result<(), StoreError> {
        let round = self.working.round_mut(round_address)?;
        round.pricing = round.initial_pricing.clone();
        Ok(())
    }

    fn start_auction(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        start: AuctionStart,
    ) -> Result<(), StoreError> {
        let view = &mut self.working;
        let owner = view.round_in_stage(round_address, RoundState::Open)?.vault_address;
        if owner != *vault_address {
            return Err(StoreError::constraint(format!(
                "option round {round_address} belongs to vault {owner}, not {vault_address}"
            )));
        }

        view.snapshot_vault(vault_address, block_number)?;
        let vault = view.vault_mut(vault_address)?;
        let unlocked = checked_sub(
            vault.unlocked_balance,
            start.starting_liquidity,
            "vault.unlocked_balance",
        )?;
        let locked = checked_add(
            vault.locked_balance,
            start.starting_liquidity,
            "vault.locked_balance",
        )?;
        vault.unlocked_balance = unlocked;
        vault.locked_balance = locked;

        let round = view.round_mut(round_address)?;
        round.state = RoundState::Auctioning;
        round.auction = Some(start);
        Ok(())
    }

    fn revert_auction_start(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError> {
        self.working.step_back(
            vault_address,
            round_address,
            block_number,
            RoundState::Auctioning,
        )
    }

    fn end_auction(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        outcome: AuctionOutcome,
    ) -> Result<(), StoreError> {
        let view = &mut self.working;
        view.round_in_stage(round_address, RoundState::Auctioning)?;

        view.snapshot_vault(vault_address, block_number)?;
        let vault = view.vault_mut(vault_address)?;
        let locked = checked_sub(
            vault.locked_balance,
            outcome.unsold_liquidity,
            "vault.locked_balance",
        )?;
        let credit = checked_add(outcome.unsold_liquidity, outcome.premium, "auction credit")?;
        let unlocked = checked_add(vault.unlocked_balance, credit, "vault.unlocked_balance")?;
        vault.locked_balance = locked;
        vault.unlocked_balance = unlocked;

        let round = view.round_mut(round_address)?;
        round.state = RoundState::Running;
        round.outcome = Some(outcome);
        Ok(())
    }

    fn revert_auction_end(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError> {
        self.working.step_back(
            vault_address,
            round_address,
            block_number,
            RoundState::Running,
        )
    }

    fn settle_round(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        settlement: Settlement,
        sold_liquidity: U256,
    ) -> Result<(), StoreError> {
        let view = &mut self.working;
        view.round_in_stage(round_address, RoundState::Running)?;

        view.snapshot_vault(vault_address, block_number)?;
        let vault = view.vault_mut(vault_address)?;
        let locked = checked_sub(vault.locked_balance, sold_liquidity, "vault.locked_balance")?;
        let credit = checked_sub(sold_liquidity, settlement.total_payout, "settlement credit")?;
        let unlocked = checked_add(vault.unlocked_balance, credit, "vault.unlocked_balance")?;
        vault.locked_balance = locked;
        vault.unlocked_balance = unlocked;

        let round = view.round_mut(round_address)?;
        round.state = RoundState::Settled;
        round.settlement = Some(settlement);
        Ok(())
    }

    fn revert_settlement(
        &mut self,
        vault_address: &Address,
        round_address: &Address,
        block_number: BlockNumber,
    ) -> Result<(), StoreError> {
        self.working.step_back(
            vault_address,
            round_address,
            block_number,
            RoundState::Settled,
        )
    }
}

impl BidStore for InMemoryTransaction {
    fn insert_bid(&mut self, bid: Bid, block_number: BlockNumber) -> Result<(), StoreError> {
        let view = &mut self.working;
        if !view.rounds.contains_key(&bid.round_address) {
            return Err(StoreError::not_found("option round", bid.round_address));
        }
        let key = (bid.round_address, bid.bid_id);
        if view.bids.contains_key(&key) {
            return Err(StoreError::constraint(format!(
                "bid {} already exists",
                bid.bid_id
            )));
        }

        let buyer_key = (bid.buyer, bid.round_address);
        if !view.buyers.contains_key(&buyer_key) {
            view.buyers
                .insert(buyer_key, OptionBuyer::new(bid.buyer, bid.round_address));
            view.buyer_origins.insert(buyer_key, block_number);
        }
        view.bids.insert(key, bid);
        Ok(())
    }

    fn delete_bid(
        &mut self,
        round_address: &Address,
        bid_id: &Felt,
        block_number: BlockNumber,
    ) -> Result<(), StoreError> {
        let view = &mut self.working;
        let bid = view
            .bids
            .remove(&(*round_address, *bid_id))
            .ok_or_else(|| StoreError::not_found("bid", bid_id))?;

        let buyer_key = (bid.buyer, *round_address);
        let has_other_bids = view
            .bids
            .values()
            .any(|b| b.round_address == *round_address && b.buyer == bid.buyer);
        let created_here = view.buyer_origins.get(&buyer_key) == Some(&block_number);
        if !has_other_bids && created_here {
            view.buyers.remove(&buyer_key);
            view.buyer_origins.remove(&buyer_key);
        }
        Ok(())
    }

    fn update_bid(
        &mut self,
        round_address: &Address,
        bid_id: &Felt,
        price_increase: U256,
        tree_nonce_now: u64,
    ) -> Result<(), StoreError> {
        let bid = self.working.bid_mut(round_address, bid_id)?;
        bid.price = checked_add(bid.price, price_increase, "bid.price")?;
        bid.tree_nonce = tree_nonce_now;
        Ok(())
    }

    fn revert_bid_update(
        &mut self,
        round_address: &Address,
        bid_id: &Felt,
        price_increase: U256,
        tree_nonce_before: u64,
    ) -> Result<(), StoreError> {
        let bid = self.working.bid_mut(round_address, bid_id)?;
        bid.price = checked_sub(bid.price, price_increase, "bid.price")?;
        bid.tree_nonce = tree_nonce_before;
        Ok(())
    }
}

impl OptionBuyerStore for InMemoryTransaction {
    fn option_buyer(
        &self,
        buyer: &Address,
        round_address: &Address,
    ) -> Result<Option<OptionBuyer>, StoreError> {
        Ok(self.working.buyers.get(&(*buyer, *round_address)).cloned())
    }

    fn update_option_buyer(
        &mut self,
        buyer: &Address,
        round_address: &Address,
        block_number: BlockNumber,
        update: OptionBuyerUpdate,
    ) -> Result<(), StoreError> {
        let view = &mut self.working;
        let key = (*buyer, *round_address);
        if !view.buyers.contains_key(&key) {
            // Clearing a flag on a missing row leaves nothing to clear
            if update.only_clears() {
                return Ok(());
            }
            view.buyer_origins.insert(key, block_number);
        }
        let row = view
            .buyers
            .entry(key)
            .or_insert_with(|| OptionBuyer::new(*buyer, *round_address));
        update.apply_to(row);
        Ok(())
    }
}
