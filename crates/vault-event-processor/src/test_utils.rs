use crate::domain::{
    AuctionEndedParams, AuctionStartedParams, Bid, DecodedEvent, Event, EventContext,
    LiquidityMovedParams, OptionRound, OptionRoundDeployedParams, OptionRoundSettledParams,
    OptionsExercisedParams, OptionsMintedParams, PricingDataSetParams, UnusedBidsRefundedParams,
};
use shared_types::{Address, BlockNumber, Felt, Timestamp, U256};

pub const GENESIS_TIMESTAMP: Timestamp = 1_700_000_000;

pub fn vault_address() -> Address {
    Felt::from(0x7a017)
}

pub fn round_address() -> Address {
    Felt::from(0x80a0d)
}

pub fn buyer() -> Address {
    Felt::from(0xb0b)
}

pub fn context(block_number: BlockNumber) -> EventContext {
    EventContext {
        block_number,
        vault_address: vault_address(),
        timestamp: GENESIS_TIMESTAMP + block_number,
    }
}

pub fn round(vault: Address, address: Address) -> OptionRound {
    OptionRound::deployed(vault, GENESIS_TIMESTAMP, &deployed_params(address))
}

pub fn bid(id: u64, price: u64, tree_nonce: u64) -> Bid {
    Bid {
        bid_id: Felt::from(id),
        round_address: round_address(),
        buyer: buyer(),
        amount: U256::from(1),
        price: U256::from(price),
        tree_nonce,
    }
}

pub fn stored_event(block_number: BlockNumber, name: &str, payload: serde_json::Value) -> Event {
    Event {
        block_number,
        event_name: name.to_string(),
        vault_address: vault_address(),
        timestamp: GENESIS_TIMESTAMP + block_number,
        payload,
    }
}

/// Deposit of `amount` by a fresh account, leaving the vault at `vault_now`.
pub fn deposit_event(block_number: BlockNumber, account: u64, amount: u64, vault_now: u64) -> Event {
    let params = LiquidityMovedParams {
        account: Felt::from(account),
        amount: U256::from(amount),
        account_unlocked_balance_now: U256::from(amount),
        vault_unlocked_balance_now: U256::from(vault_now),
    };
    stored_event(
        block_number,
        "Deposit",
        serde_json::to_value(params).unwrap(),
    )
}

fn deployed_params(address: Address) -> OptionRoundDeployedParams {
    OptionRoundDeployedParams {
        round_id: Felt::from(1),
        round_address: address,
        auction_start_date: GENESIS_TIMESTAMP + 100,
        auction_end_date: GENESIS_TIMESTAMP + 200,
        option_settlement_date: GENESIS_TIMESTAMP + 300,
        pricing: None,
    }
}

pub fn round_deployed(address: Address) -> DecodedEvent {
    DecodedEvent::OptionRoundDeployed(deployed_params(address))
}

pub fn pricing_data_set(address: Address, strike: u64) -> DecodedEvent {
    DecodedEvent::PricingDataSet(PricingDataSetParams {
        round_address: address,
        strike_price: U256::from(strike),
        cap_level: U256::from(5_000),
        reserve_price: U256::from(1),
    })
}

pub fn auction_started(address: Address, options_available: u64, starting: u64) -> DecodedEvent {
    DecodedEvent::AuctionStarted(AuctionStartedParams {
        round_address: address,
        options_available: U256::from(options_available),
        starting_liquidity: U256::from(starting),
    })
}

pub fn auction_ended(address: Address, options_sold: u64, unsold: u64, premium: u64) -> DecodedEvent {
    DecodedEvent::AuctionEnded(AuctionEndedParams {
        round_address: address,
        options_sold: U256::from(options_sold),
        clearing_price: U256::from(1),
        unsold_liquidity: U256::from(unsold),
        clearing_bid_tree_nonce: 1,
        premium: U256::from(premium),
    })
}

pub fn round_settled(address: Address, payout_per_option: u64) -> DecodedEvent {
    DecodedEvent::OptionRoundSettled(OptionRoundSettledParams {
        round_address: address,
        settlement_price: U256::from(100),
        payout_per_option: U256::from(payout_per_option),
    })
}

pub fn options_minted() -> DecodedEvent {
    DecodedEvent::OptionsMinted(OptionsMintedParams {
        account: buyer(),
        round_address: round_address(),
        minted_amount: U256::from(4),
    })
}

pub fn unused_bids_refunded() -> DecodedEvent {
    DecodedEvent::UnusedBidsRefunded(UnusedBidsRefundedParams {
        account: buyer(),
        round_address: round_address(),
        refunded_amount: U256::from(2),
    })
}

pub fn options_exercised(mintable: u64) -> DecodedEvent {
    DecodedEvent::OptionsExercised(OptionsExercisedParams {
        account: buyer(),
        round_address: round_address(),
        total_options_exercised: U256::from(mintable + 1),
        mintable_options_exercised: U256::from(mintable),
        exercised_amount: U256::from(10),
    })
}
