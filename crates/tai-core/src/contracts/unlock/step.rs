//! Step function for the unlock controller.

use super::command::Command;
use super::invariants::check_invariants;
use super::state::{BuybackEvent, PriceRecord, RoundRelease, State, WhitelistSale};
use crate::bus::{MsgContext, Outbound};
use crate::contracts::{only, Effects};
use crate::merkle::{whitelist_leaf, MerkleVerifier, Sha256Verifier};
use crate::types::{Amount, PRICE_SCALE};
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{ensure, math, ErrorCode, Funds, Result, TaiError};
use std::collections::BTreeMap;
use tracing::{debug, info};

fn ensure_running(state: &State) -> Result<()> {
    ensure(!state.paused, ErrorCode::UnlockPaused)
}

fn active_sale(next: &mut State) -> Result<&mut WhitelistSale> {
    next.sale
        .as_mut()
        .filter(|s| s.active)
        .ok_or(TaiError::Rejected(ErrorCode::SaleClosed))
}

fn sweep_proceeds(sale: &mut WhitelistSale, treasury: crate::Address, effects: &mut Effects) {
    if sale.proceeds > 0 {
        effects.push(Outbound::payout(
            treasury,
            Funds::native(sale.proceeds),
            PayoutReason::SaleProceeds,
        ));
        sale.proceeds = 0;
    }
}

/// Stop an active sale and sweep its proceeds. A cancelled sale may return its remainder
/// without waiting for the public sale grace period.
fn end_sale(next: &mut State, cancelled: bool, effects: &mut Effects) -> Result<()> {
    let treasury = next.treasury;
    let sale = active_sale(next)?;
    sale.active = false;
    sale.cancelled = cancelled;
    sweep_proceeds(sale, treasury, effects);
    Ok(())
}

/// Execute a transition with the default SHA-256 proof verifier.
pub fn step(state: &State, ctx: &MsgContext, cmd: Command) -> Result<(State, Effects)> {
    step_with(state, ctx, cmd, &Sha256Verifier)
}

pub fn step_with<V: MerkleVerifier + ?Sized>(
    state: &State,
    ctx: &MsgContext,
    cmd: Command,
    verifier: &V,
) -> Result<(State, Effects)> {
    check_invariants(state)?;

    let now = ctx.now;
    let mut next = state.clone();
    let mut effects = Effects::none();
    let mut consumed = Funds::ZERO;

    match cmd {
        Command::SetInitialPrice { price, timestamp } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure_running(state)?;
            ensure(state.initial_price.is_none(), ErrorCode::PriceAlreadySet)?;
            ensure(price > 0, ErrorCode::BadPrice)?;
            let record = PriceRecord {
                price,
                timestamp,
                round: 0,
            };
            next.initial_price = Some(record);
            next.last_price = Some(record);
        }
        Command::RecordPrice {
            price,
            timestamp,
            round,
        } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure_running(state)?;
            let last = state
                .last_price
                .ok_or(TaiError::Rejected(ErrorCode::PriceNotSet))?;
            ensure(!state.all_unlocked(), ErrorCode::AllUnlocked)?;
            ensure(round == state.current_round, ErrorCode::RoundMismatch)?;
            ensure(timestamp > last.timestamp, ErrorCode::NonMonotonic)?;
            ensure(price > 0, ErrorCode::BadPrice)?;
            let record = PriceRecord {
                price,
                timestamp,
                round,
            };
            next.pending_price = Some(record);
            next.last_price = Some(record);
        }
        Command::UnlockRound => {
            ensure_running(state)?;
            ensure(!state.all_unlocked(), ErrorCode::AllUnlocked)?;
            let pending = state
                .pending_price
                .ok_or(TaiError::Rejected(ErrorCode::NoPendingPrice))?;
            let reference = state
                .reference_price()
                .ok_or(TaiError::Rejected(ErrorCode::PriceNotSet))?;
            ensure(
                math::inflation_met(pending.price, reference, state.config.min_inflation_bps)?,
                ErrorCode::InflationNotMet,
            )?;
            let hold_start = state.hold_start().unwrap_or(now);
            ensure(
                now.saturating_sub(hold_start) >= state.config.min_hold_seconds,
                ErrorCode::HoldNotMet,
            )?;

            let round = state.current_round;
            let amount = state.round_share(round);
            next.remaining_locked = math::sub(state.remaining_locked, amount)?;
            next.current_round = round + 1;
            next.pending_price = None;
            next.last_unlock_at = Some(now);
            next.releases.push(RoundRelease {
                round,
                price: pending.price,
                amount,
                released_at: now,
            });
            effects.push(Outbound::payout(
                state.treasury,
                Funds::tai(amount),
                PayoutReason::UnlockRound { round },
            ));
            info!(round, amount = %amount, remaining = %next.remaining_locked, "unlock round released");
        }
        Command::PauseUnlock { paused } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            next.paused = paused;
        }
        Command::StartWhitelistSale {
            merkle_root,
            total_amount,
            baseline_price,
            current_price,
            window_end,
        } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            if let Some(sale) = &state.sale {
                ensure(sale.is_settled(), ErrorCode::SaleActive)?;
            }
            ensure(
                current_price > 0 && current_price <= baseline_price,
                ErrorCode::BadPrice,
            )?;
            ensure(total_amount > 0, ErrorCode::InvalidAmount)?;
            ensure(window_end > now, ErrorCode::InvalidClose)?;
            ensure(
                ctx.balance.tai >= math::add(state.remaining_locked, total_amount)?,
                ErrorCode::InsufficientInventory,
            )?;
            next.sale = Some(WhitelistSale {
                active: true,
                merkle_root,
                total_amount,
                sold_amount: 0,
                baseline_price,
                current_price,
                window_end,
                cancelled: false,
                proceeds: 0,
                remainder_refunded: false,
                purchased: BTreeMap::new(),
            });
            debug!(total = %total_amount, price = %current_price, window_end, "whitelist sale started");
        }
        Command::PurchaseWhitelist {
            amount,
            quota,
            proof,
            beneficiary,
        } => {
            let sale = active_sale(&mut next)?;
            ensure(now <= sale.window_end, ErrorCode::SaleExpired)?;
            ensure(amount > 0, ErrorCode::InvalidAmount)?;
            ensure(
                verifier.verify(&proof, &whitelist_leaf(&beneficiary, quota), &sale.merkle_root),
                ErrorCode::BadProof,
            )?;
            let bought = sale.purchased.get(&beneficiary).copied().unwrap_or(0);
            let after = math::add(bought, amount)?;
            ensure(after <= quota, ErrorCode::QuotaExceeded)?;
            let sold = math::add(sale.sold_amount, amount)?;
            ensure(sold <= sale.total_amount, ErrorCode::WlSoldOut)?;
            let cost = math::mul_div_ceil(amount, sale.current_price, PRICE_SCALE)?;
            ensure(ctx.value.native >= cost, ErrorCode::InsufficientPayment)?;

            sale.purchased.insert(beneficiary, after);
            sale.sold_amount = sold;
            sale.proceeds = math::add(sale.proceeds, cost)?;
            consumed = Funds::native(cost);
            effects.push(Outbound::payout(
                beneficiary,
                Funds::tai(amount),
                PayoutReason::WhitelistPurchase {
                    payer: ctx.sender,
                    cost,
                },
            ));
        }
        Command::CloseWhitelistSale => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            end_sale(&mut next, false, &mut effects)?;
        }
        Command::CancelWhitelistSale => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            end_sale(&mut next, true, &mut effects)?;
            debug!("whitelist sale cancelled");
        }
        Command::RefundSaleRemainder => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            let grace = state.config.public_sale_grace_seconds;
            let treasury = state.treasury;
            let sale = next
                .sale
                .as_mut()
                .ok_or(TaiError::Rejected(ErrorCode::SaleClosed))?;
            ensure(!sale.remainder_refunded, ErrorCode::RemainderRefunded)?;
            if !sale.cancelled {
                ensure(
                    now >= sale.window_end.saturating_add(grace),
                    ErrorCode::SaleNotEnded,
                )?;
            }
            let unsold = sale.unsold();
            sale.active = false;
            sale.remainder_refunded = true;
            sweep_proceeds(sale, treasury, &mut effects);
            if unsold > 0 {
                effects.push(Outbound::payout(
                    treasury,
                    Funds::tai(unsold),
                    PayoutReason::SaleRemainder,
                ));
            }
        }
        Command::TriggerEmergencyBuyback {
            price_now,
            price_prev,
        } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(price_now > 0 && price_prev > 0, ErrorCode::BadPrice)?;
            let drop = math::drop_bps(price_now, price_prev)?;
            ensure(
                drop >= state.config.buyback_drop_bps as u128,
                ErrorCode::DropNotMet,
            )?;
            let budget: Amount = match next.sale.as_mut() {
                Some(sale) => std::mem::take(&mut sale.proceeds),
                None => 0,
            };
            if budget > 0 {
                effects.push(Outbound::payout(
                    state.treasury,
                    Funds::native(budget),
                    PayoutReason::Buyback,
                ));
            }
            next.paused = true;
            next.buybacks.push(BuybackEvent {
                at: now,
                price_now,
                price_prev,
                drop_bps: drop,
                budget,
            });
            info!(drop_bps = %drop, budget = %budget, "emergency buyback triggered, unlocks paused");
        }
        Command::TransferAdmin { new_admin } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            next.admin = new_admin;
        }
    }

    let change = ctx.value.checked_sub(consumed)?;
    if !change.is_zero() {
        effects.push(Outbound::change(ctx.sender, change));
    }

    check_invariants(&next)?;
    Ok((next, effects))
}

/// A payout sent by the controller came back.
///
/// Native proceeds return to the sale's unswept balance and a returned remainder reopens
/// the refund. A returned purchase is unwound: the tokens go back to sale inventory, the
/// beneficiary's quota is restored and the payer gets the cost back out of unswept
/// proceeds. Unlocked rounds stay released; their value remains with the controller.
pub fn on_bounce(state: &State, ctx: &MsgContext, original: &[u8]) -> Result<(State, Effects)> {
    let mut next = state.clone();
    let mut effects = Effects::none();
    let Ok(payout) = Payout::decode(original) else {
        return Ok((next, effects));
    };
    match (payout.reason, next.sale.as_mut()) {
        (PayoutReason::SaleProceeds | PayoutReason::Buyback, Some(sale)) => {
            sale.proceeds = math::add(sale.proceeds, ctx.value.native)?;
        }
        (PayoutReason::SaleRemainder, Some(sale)) => {
            sale.remainder_refunded = false;
        }
        (PayoutReason::WhitelistPurchase { payer, cost }, Some(sale)) => {
            let amount = ctx.value.tai;
            let bought = sale.purchased.get(&ctx.sender).copied().unwrap_or(0);
            if amount > 0 && bought >= amount {
                let left = bought - amount;
                if left == 0 {
                    sale.purchased.remove(&ctx.sender);
                } else {
                    sale.purchased.insert(ctx.sender, left);
                }
                sale.sold_amount = math::sub(sale.sold_amount, amount)?;
                if !sale.active {
                    sale.remainder_refunded = false;
                }
                // Proceeds already swept to treasury cannot be returned from here.
                let refund = cost.min(sale.proceeds);
                sale.proceeds -= refund;
                if refund > 0 {
                    effects.push(Outbound::change(payer, Funds::native(refund)));
                }
                debug!(amount = %amount, refund = %refund, "whitelist purchase unwound");
            }
        }
        _ => {}
    }
    check_invariants(&next)?;
    Ok((next, effects))
}
