//! Step function for the staking ledger.

use super::command::{Command, SettlementKind};
use super::invariants::check_invariants;
use super::state::{ChunkKey, State};
use crate::bus::{MsgContext, Outbound};
use crate::contracts::market::command::Command as MarketCommand;
use crate::contracts::{only, Effects};
use crate::types::Entry;
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{ensure, math, ErrorCode, Funds, Result, TaiError};

fn only_market(state: &State, ctx: &MsgContext) -> Result<()> {
    ensure(
        state.prediction_market == Some(ctx.sender),
        ErrorCode::NotPrediction,
    )
}

fn ack(ctx: &MsgContext, key: ChunkKey) -> Outbound {
    let body = MarketCommand::SettlementAck {
        market_id: key.market_id,
        kind: key.kind,
        seq: key.seq,
    }
    .encode();
    Outbound::non_bounceable(ctx.sender, Funds::ZERO, body)
}

fn credit_rewards(next: &mut State, ctx: &MsgContext, reward: u128, entries: &[Entry]) -> Result<Funds> {
    let total = math::sum(entries.iter().map(|e| e.amount))?;
    ensure(total == reward, ErrorCode::InvalidAmount)?;
    ensure(ctx.value.tai >= reward, ErrorCode::InsufficientValue)?;
    for e in entries {
        let info = next.stakers.entry(e.address).or_default();
        info.pending_reward = math::add(info.pending_reward, e.amount)?;
    }
    next.reward_reserve = math::add(next.reward_reserve, reward)?;
    Ok(Funds::tai(reward))
}

fn apply_slash(next: &mut State, now: u64, entries: &[Entry]) -> Result<()> {
    for e in entries {
        let Some(info) = next.stakers.get_mut(&e.address) else {
            continue;
        };
        info.accrue(now)?;
        let take = e.amount.min(info.amount);
        info.amount -= take;
        info.penalty_count = info.penalty_count.saturating_add(1);
        next.total_staked = math::sub(next.total_staked, take)?;
        next.slashed_pool = math::add(next.slashed_pool, take)?;
    }
    Ok(())
}

/// Execute a transition: (state, command) -> (new_state, effects).
///
/// Value attached to the message and not consumed by the transition is returned to the
/// sender as change.
pub fn step(state: &State, ctx: &MsgContext, cmd: Command) -> Result<(State, Effects)> {
    check_invariants(state)?;

    let now = ctx.now;
    let mut next = state.clone();
    let mut effects = Effects::none();
    let mut consumed = Funds::ZERO;

    match cmd {
        Command::Stake { amount } => {
            ensure(!state.emergency, ErrorCode::Emergency)?;
            ensure(
                amount >= state.config.min_stake_amount,
                ErrorCode::StakeTooSmall,
            )?;
            ensure(ctx.value.tai >= amount, ErrorCode::InsufficientValue)?;

            let info = next.stakers.entry(ctx.sender).or_default();
            ensure(!info.is_suspended(now), ErrorCode::Suspended)?;
            info.accrue(now)?;
            info.amount = math::add(info.amount, amount)?;
            next.total_staked = math::add(next.total_staked, amount)?;
            consumed = Funds::tai(amount);
        }
        Command::Unstake { amount } => {
            ensure(amount > 0, ErrorCode::InvalidAmount)?;
            let info = next
                .stakers
                .get_mut(&ctx.sender)
                .filter(|i| i.amount > 0)
                .ok_or(TaiError::Rejected(ErrorCode::NoStake))?;
            ensure(!info.is_suspended(now), ErrorCode::Suspended)?;
            ensure(amount <= info.amount, ErrorCode::InsufficientStake)?;

            info.accrue(now)?;
            info.amount -= amount;
            next.total_staked = math::sub(next.total_staked, amount)?;
            effects.push(Outbound::payout(
                ctx.sender,
                Funds::tai(amount),
                PayoutReason::Unstake { amount },
            ));
        }
        Command::ClaimReward => {
            ensure(!state.emergency, ErrorCode::Emergency)?;
            let info = next
                .stakers
                .get_mut(&ctx.sender)
                .filter(|i| i.pending_reward > 0)
                .ok_or(TaiError::Rejected(ErrorCode::NoReward))?;
            ensure(!info.is_suspended(now), ErrorCode::Suspended)?;
            let reward = info.pending_reward;
            info.pending_reward = 0;
            next.reward_reserve = math::sub(next.reward_reserve, reward)?;
            effects.push(Outbound::payout(
                ctx.sender,
                Funds::tai(reward),
                PayoutReason::StakingReward,
            ));
        }
        Command::PauseStaker { target, until } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            let info = next
                .stakers
                .get_mut(&target)
                .ok_or(TaiError::Rejected(ErrorCode::NoStake))?;
            info.accrue(now)?;
            info.paused_until = until;
        }
        Command::ToggleEmergency { enabled } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            next.emergency = enabled;
        }
        Command::SetPredictionMarket { market } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            next.prediction_market = Some(market);
        }
        Command::WithdrawSlashed => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(state.slashed_pool > 0, ErrorCode::NothingToClaim)?;
            next.slashed_pool = 0;
            effects.push(Outbound::payout(
                state.treasury,
                Funds::tai(state.slashed_pool),
                PayoutReason::SlashedSweep,
            ));
        }
        Command::TransferAdmin { new_admin } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            next.admin = new_admin;
        }
        Command::RecordParticipation { target, points } => {
            only_market(state, ctx)?;
            let info = next.stakers.entry(target).or_default();
            info.points = math::add_u64(info.points, points)?;
        }
        Command::CreditRewards {
            market_id,
            seq,
            reward,
            entries,
        } => {
            only_market(state, ctx)?;
            let key = ChunkKey {
                market_id,
                kind: SettlementKind::Reward,
                seq,
            };
            if next.applied_chunks.insert(key) {
                consumed = credit_rewards(&mut next, ctx, reward, &entries)?;
            }
            effects.push(ack(ctx, key));
        }
        Command::ApplySlash {
            market_id,
            seq,
            entries,
        } => {
            only_market(state, ctx)?;
            let key = ChunkKey {
                market_id,
                kind: SettlementKind::Slash,
                seq,
            };
            if next.applied_chunks.insert(key) {
                apply_slash(&mut next, now, &entries)?;
            }
            effects.push(ack(ctx, key));
        }
    }

    let change = ctx.value.checked_sub(consumed)?;
    if !change.is_zero() {
        effects.push(Outbound::change(ctx.sender, change));
    }

    check_invariants(&next)?;
    Ok((next, effects))
}

/// A payout sent by the ledger came back; restore the bookkeeping that went with it.
pub fn on_bounce(state: &State, ctx: &MsgContext, original: &[u8]) -> Result<State> {
    let mut next = state.clone();
    let returned = ctx.value.tai;
    match Payout::decode(original).map(|p| p.reason) {
        Ok(PayoutReason::StakingReward) => {
            let info = next.stakers.entry(ctx.sender).or_default();
            info.pending_reward = math::add(info.pending_reward, returned)?;
            next.reward_reserve = math::add(next.reward_reserve, returned)?;
        }
        Ok(PayoutReason::Unstake { .. }) => {
            let info = next.stakers.entry(ctx.sender).or_default();
            info.accrue(ctx.now)?;
            info.amount = math::add(info.amount, returned)?;
            next.total_staked = math::add(next.total_staked, returned)?;
        }
        Ok(PayoutReason::SlashedSweep) => {
            next.slashed_pool = math::add(next.slashed_pool, returned)?;
        }
        _ => {}
    }
    check_invariants(&next)?;
    Ok(next)
}
