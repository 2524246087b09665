//! # Applier
//!
//! Forward state transition for each event kind.

use super::lookup_round;
use crate::domain::{
    AuctionOutcome, AuctionStart, Bid, DecodedEvent, EventContext, OptionBuyerUpdate,
    OptionRound, PricingData, ProcessingError, RoundState, Settlement,
};
use crate::ports::StoreTransaction;

/// Apply one decoded event through `tx`.
///
/// AuctionEnded and OptionRoundSettled read the round first: the owning vault
/// and the sold/starting figures are not carried by those events.
pub fn apply_event<T>(
    tx: &mut T,
    ctx: &EventContext,
    event: &DecodedEvent,
) -> Result<(), ProcessingError>
where
    T: StoreTransaction + ?Sized,
{
    let block = ctx.block_number;

    match event {
        DecodedEvent::ContractDeployed => {}

        DecodedEvent::Deposit(p) => tx.deposit(&ctx.vault_address, block, p)?,
        DecodedEvent::Withdrawal(p) => tx.withdraw(&ctx.vault_address, block, p)?,
        DecodedEvent::WithdrawalQueued(p) => tx.queue_withdrawal(&ctx.vault_address, block, p)?,
        DecodedEvent::StashWithdrawn(p) => tx.withdraw_stash(&ctx.vault_address, block, p)?,

        DecodedEvent::OptionRoundDeployed(p) => {
            tx.deploy_round(OptionRound::deployed(ctx.vault_address, ctx.timestamp, p))?
        }
        DecodedEvent::PricingDataSet(p) => tx.set_pricing(&p.round_address, PricingData::from(p))?,
        DecodedEvent::AuctionStarted(p) => tx.start_auction(
            &ctx.vault_address,
            &p.round_address,
            block,
            AuctionStart::from(p),
        )?,
        DecodedEvent::AuctionEnded(p) => {
            let round = lookup_round(&*tx, &p.round_address)?;
            tx.end_auction(
                &round.vault_address,
                &p.round_address,
                block,
                AuctionOutcome::from(p),
            )?
        }
        DecodedEvent::OptionRoundSettled(p) => {
            let round = lookup_round(&*tx, &p.round_address)?;
            let (Some(start), Some(outcome)) = (&round.auction, &round.outcome) else {
                return Err(ProcessingError::UnexpectedRoundState {
                    round_address: p.round_address,
                    state: round.state,
                    expected: RoundState::Running,
                });
            };

            let total_payout = outcome
                .options_sold
                .checked_mul(p.payout_per_option)
                .ok_or(ProcessingError::Arithmetic {
                    field: "total_payout",
                })?;
            let sold_liquidity = start
                .starting_liquidity
                .checked_sub(outcome.unsold_liquidity)
                .ok_or(ProcessingError::Arithmetic {
                    field: "sold_liquidity",
                })?;

            tx.settle_round(
                &round.vault_address,
                &p.round_address,
                block,
                Settlement {
                    settlement_price: p.settlement_price,
                    payout_per_option: p.payout_per_option,
                    total_payout,
                },
                sold_liquidity,
            )?
        }

        DecodedEvent::BidPlaced(p) => tx.insert_bid(Bid::from(p), block)?,
        DecodedEvent::BidUpdated(p) => tx.update_bid(
            &p.round_address,
            &p.bid_id,
            p.price_increase,
            p.bid_tree_nonce_now,
        )?,

        DecodedEvent::OptionsMinted(p) => tx.update_option_buyer(
            &p.account,
            &p.round_address,
            block,
            OptionBuyerUpdate::minted(true),
        )?,
        // Unconditional, unlike the revert
        DecodedEvent::OptionsExercised(p) => tx.update_option_buyer(
            &p.account,
            &p.round_address,
            block,
            OptionBuyerUpdate::minted(true),
        )?,
        DecodedEvent::UnusedBidsRefunded(p) => tx.update_option_buyer(
            &p.account,
            &p.round_address,
            block,
            OptionBuyerUpdate::refunded(true),
        )?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::*;
    use crate::ports::{MaterializedStore, OptionBuyerStore, OptionRoundStore};
    use crate::test_utils::*;
    use shared_types::{Felt, U256};

    #[test]
    fn test_round_lifecycle_moves_vault_liquidity() {
        let store = InMemoryStore::new();
        store.seed_vault(Vault {
            unlocked_balance: U256::from(1_000),
            ..Vault::new(vault_address())
        });
        let mut tx = store.begin().unwrap();

        for (block, event) in [
            (1, round_deployed(round_address())),
            (2, auction_started(round_address(), 10, 600)),
            (3, auction_ended(round_address(), 8, 100, 50)),
            (4, round_settled(round_address(), 20)),
        ] {
            apply_event(&mut tx, &context(block), &event).unwrap();
        }
        tx.commit().unwrap();

        // start: 400 / 600; end: 400 + 100 + 50 = 550 / 500;
        // settle: sold 500, payout 8 * 20 = 160, 550 + 340 = 890 / 0
        let vault = store.vault(&vault_address()).unwrap();
        assert_eq!(vault.unlocked_balance, U256::from(890));
        assert_eq!(vault.locked_balance, U256::zero());

        let round = store.option_round(&round_address()).unwrap();
        assert_eq!(round.state, RoundState::Settled);
        assert_eq!(round.deployment_date, context(1).timestamp);
        assert_eq!(round.settlement.unwrap().total_payout, U256::from(160));
    }

    #[test]
    fn test_auction_ended_on_unknown_round_is_lookup_failure() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();

        let result = apply_event(
            &mut tx,
            &context(1),
            &auction_ended(round_address(), 1, 1, 1),
        );
        assert_eq!(
            result,
            Err(ProcessingError::Lookup {
                round_address: round_address()
            })
        );
    }

    #[test]
    fn test_settlement_before_auction_end() {
        let store = InMemoryStore::new();
        store.seed_vault(Vault::new(vault_address()));
        let mut tx = store.begin().unwrap();
        apply_event(&mut tx, &context(1), &round_deployed(round_address())).unwrap();

        let result = apply_event(&mut tx, &context(2), &round_settled(round_address(), 1));
        assert!(matches!(
            result,
            Err(ProcessingError::UnexpectedRoundState {
                state: RoundState::Open,
                ..
            })
        ));
    }

    #[test]
    fn test_flag_events_set_flags() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();

        apply_event(&mut tx, &context(1), &options_minted()).unwrap();
        apply_event(&mut tx, &context(1), &unused_bids_refunded()).unwrap();

        let row = tx.option_buyer(&buyer(), &round_address()).unwrap().unwrap();
        assert!(row.has_minted);
        assert!(row.has_refunded);
    }

    #[test]
    fn test_options_exercised_sets_minted_even_with_zero_mintable() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();

        apply_event(&mut tx, &context(1), &options_exercised(0)).unwrap();

        let row = tx.option_buyer(&buyer(), &round_address()).unwrap().unwrap();
        assert!(row.has_minted);
    }

    #[test]
    fn test_contract_deployed_is_noop() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().unwrap();

        apply_event(&mut tx, &context(1), &DecodedEvent::ContractDeployed).unwrap();

        assert!(tx.option_round(&Felt::from(0)).unwrap().is_none());
        tx.commit().unwrap();
        assert!(store.vault(&vault_address()).is_none());
    }
}
