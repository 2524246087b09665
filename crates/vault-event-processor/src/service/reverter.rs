//! # Reverter
//!
//! Inverse state transition for each event kind.
//!
//! ## Ordering guarantee
//!
//! No undo log is kept. Compensation is computed from what the store holds
//! now: the round row gives back the owning vault, and liquidity rows are put
//! back from the store's pre-block copies. This is only correct when blocks
//! are reverted newest first, and each block is reverted at most once.
//! Reverting a round's deployment before its later stages surfaces as
//! `ProcessingError::Lookup` on the later stage, never as a silent no-op.

use super::lookup_round;
use crate::domain::{DecodedEvent, EventContext, OptionBuyerUpdate, ProcessingError};
use crate::ports::StoreTransaction;

/// Revert one decoded event through `tx`.
pub fn revert_event<T>(
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

        DecodedEvent::Deposit(p) | DecodedEvent::Withdrawal(p) => {
            tx.revert_liquidity(&ctx.vault_address, &p.account, block)?
        }
        DecodedEvent::StashWithdrawn(p) => {
            tx.revert_liquidity(&ctx.vault_address, &p.account, block)?
        }
        DecodedEvent::WithdrawalQueued(p) => {
            tx.revert_queued_withdrawal(&ctx.vault_address, block, p)?
        }

        DecodedEvent::OptionRoundDeployed(p) => tx.delete_round(&p.round_address)?,
        DecodedEvent::PricingDataSet(p) => tx.clear_pricing(&p.round_address)?,
        DecodedEvent::AuctionStarted(p) => {
            let round = lookup_round(&*tx, &p.round_address)?;
            tx.revert_auction_start(&round.vault_address, &p.round_address, block)?
        }
        DecodedEvent::AuctionEnded(p) => {
            let round = lookup_round(&*tx, &p.round_address)?;
            tx.revert_auction_end(&round.vault_address, &p.round_address, block)?
        }
        DecodedEvent::OptionRoundSettled(p) => {
            let round = lookup_round(&*tx, &p.round_address)?;
            tx.revert_settlement(&round.vault_address, &p.round_address, block)?
        }

        DecodedEvent::BidPlaced(p) => tx.delete_bid(&p.round_address, &p.bid_id, block)?,
        DecodedEvent::BidUpdated(p) => tx.revert_bid_update(
            &p.round_address,
            &p.bid_id,
            p.price_increase,
            p.bid_tree_nonce_before,
        )?,

        DecodedEvent::OptionsMinted(p) => tx.update_option_buyer(
            &p.account,
            &p.round_address,
            block,
            OptionBuyerUpdate::minted(false),
        )?,
        // Only clears the flag when mintable options were exercised.
        // Apply sets it unconditionally.
        DecodedEvent::OptionsExercised(p) => {
            if !p.mintable_options_exercised.is_zero() {
                tx.update_option_buyer(
                    &p.account,
                    &p.round_address,
                    block,
                    OptionBuyerUpdate::minted(false),
                )?
            }
        }
        DecodedEvent::UnusedBidsRefunded(p) => tx.update_option_buyer(
            &p.account,
            &p.round_address,
            block,
            OptionBuyerUpdate::refunded(false),
        )?,
    }

    Ok(())
}
