//! Step function for the supply ledger.

use super::command::Command;
use super::invariants::check_invariants;
use super::state::State;
use crate::bus::{MsgContext, Outbound};
use crate::contracts::vesting::Command as VestingCommand;
use crate::contracts::{only, Effects};
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{ensure, math, ErrorCode, Funds, Result};
use tracing::info;

pub fn step(state: &State, ctx: &MsgContext, cmd: Command) -> Result<(State, Effects)> {
    check_invariants(state)?;

    let mut next = state.clone();
    let mut effects = Effects::none();

    match cmd {
        Command::Distribute { to, amount } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(amount > 0, ErrorCode::InvalidAmount)?;
            ensure(amount <= state.distributable()?, ErrorCode::InsufficientBalance)?;
            next.distributed = math::add(state.distributed, amount)?;
            effects.push(Outbound::payout(to, Funds::tai(amount), PayoutReason::Distribution));
        }
        Command::RequestLockedSupply => {
            only(&ctx.sender, &state.vesting, ErrorCode::NotVesting)?;
            ensure(!state.handoff_done, ErrorCode::HandoffDone)?;
            next.handoff_done = true;
            let amount = state.config.locked_supply;
            let body = VestingCommand::LockedSupplyTransfer { amount }.encode();
            effects.push(Outbound::new(state.vesting, Funds::tai(amount), body));
            info!(amount = %amount, "locked supply handed to vesting");
        }
        Command::TransferAdmin { new_admin } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            next.admin = new_admin;
        }
    }

    if !ctx.value.is_zero() {
        effects.push(Outbound::change(ctx.sender, ctx.value));
    }

    check_invariants(&next)?;
    Ok((next, effects))
}

/// A transfer sent by the ledger came back.
///
/// A returned distribution is distributable again; a returned handoff re-opens it unless the
/// vesting contract reports it is already funded (a duplicated transfer).
pub fn on_bounce(state: &State, ctx: &MsgContext, code: u16, original: &[u8]) -> Result<State> {
    let mut next = state.clone();
    if let Ok(payout) = Payout::decode(original) {
        if payout.reason == PayoutReason::Distribution {
            next.distributed = next.distributed.saturating_sub(ctx.value.tai);
        }
    } else if let Ok(VestingCommand::LockedSupplyTransfer { .. }) = VestingCommand::decode(original) {
        if code != ErrorCode::AlreadyFunded.code() {
            next.handoff_done = false;
        }
    }
    check_invariants(&next)?;
    Ok(next)
}
