//! Step function for the vesting schedule.

use super::command::Command;
use super::invariants::check_invariants;
use super::state::State;
use crate::bus::{MsgContext, Outbound};
use crate::contracts::supply::Command as SupplyCommand;
use crate::contracts::{only, Effects};
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{ensure, math, ErrorCode, Funds, Result, TaiError};
use tracing::info;

pub fn step(state: &State, ctx: &MsgContext, cmd: Command) -> Result<(State, Effects)> {
    check_invariants(state)?;

    let mut next = state.clone();
    let mut effects = Effects::none();
    let mut consumed = Funds::ZERO;

    match cmd {
        Command::RequestFunding => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(!state.funded, ErrorCode::AlreadyFunded)?;
            effects.push(Outbound::new(
                state.master,
                Funds::ZERO,
                SupplyCommand::RequestLockedSupply.encode(),
            ));
        }
        Command::LockedSupplyTransfer { amount } => {
            only(&ctx.sender, &state.master, ErrorCode::NotMaster)?;
            ensure(!state.funded, ErrorCode::AlreadyFunded)?;
            ensure(ctx.value.tai >= amount, ErrorCode::InsufficientValue)?;
            next.funded = true;
            next.total_locked = amount;
            consumed = Funds::tai(amount);
            info!(amount = %amount, "vesting schedule funded");
        }
        Command::ConfigureRoundPrice { round, price } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(
                round >= 1
                    && round <= state.config.max_rounds
                    && round == state.last_configured_round.saturating_add(1),
                ErrorCode::InvalidRound,
            )?;
            ensure(price > 0, ErrorCode::BadPrice)?;
            if let Some(prev) = state.round_prices.values().next_back() {
                ensure(price > *prev, ErrorCode::PriceNotIncreasing)?;
            }
            next.round_prices.insert(round, price);
            next.last_configured_round = round;
        }
        Command::ReleaseRound {
            round,
            observed_price,
        } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(state.funded, ErrorCode::NotFunded)?;
            ensure(
                round >= 1 && round <= state.config.max_rounds,
                ErrorCode::InvalidRound,
            )?;
            let target = *state
                .round_prices
                .get(&round)
                .ok_or(TaiError::Rejected(ErrorCode::RoundNotConfigured))?;
            ensure(!state.is_released(round), ErrorCode::RoundReleased)?;
            ensure(
                round == 1 || state.is_released(round - 1),
                ErrorCode::PreviousRoundLocked,
            )?;
            ensure(observed_price >= target, ErrorCode::PriceTargetNotMet)?;

            let amount = state.round_amount(round)?;
            next.released = math::add(state.released, amount)?;
            next.releases.insert(round, amount);
            if amount > 0 {
                effects.push(Outbound::payout(
                    state.beneficiary,
                    Funds::tai(amount),
                    PayoutReason::VestingRelease { round },
                ));
            }
            info!(round, amount = %amount, "vesting round released");
        }
        Command::SetBeneficiary { beneficiary } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            next.beneficiary = beneficiary;
        }
        Command::ResendUndelivered => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(state.undelivered > 0, ErrorCode::NothingToRetry)?;
            next.undelivered = 0;
            effects.push(Outbound::payout(
                state.beneficiary,
                Funds::tai(state.undelivered),
                PayoutReason::VestingRelease { round: 0 },
            ));
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

/// A released allocation came back; hold it for `ResendUndelivered`.
pub fn on_bounce(state: &State, ctx: &MsgContext, original: &[u8]) -> Result<State> {
    let mut next = state.clone();
    if let Ok(Payout {
        reason: PayoutReason::VestingRelease { .. },
    }) = Payout::decode(original)
    {
        next.undelivered = math::add(next.undelivered, ctx.value.tai)?;
    }
    check_invariants(&next)?;
    Ok(next)
}
