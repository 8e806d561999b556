//! Step function for the prediction market.

use super::command::Command;
use super::invariants::check_touched;
use super::state::{BetPosition, ChunkStatus, Market, MarketStatus, SettlementChunk, State};
use crate::bus::{MsgContext, Outbound};
use crate::contracts::staking::{Command as StakingCommand, SettlementKind};
use crate::contracts::{only, Effects};
use crate::types::{Amount, Bps, Entry, Side};
use crate::wire::{Payout, PayoutReason, WireMessage, MAX_CHAIN_LEN};
use crate::{ensure, math, ErrorCode, Funds, Result, TaiError};
use tracing::debug;

fn market_mut(state: &mut State, id: u64) -> Result<&mut Market> {
    state
        .markets
        .get_mut(&id)
        .ok_or(TaiError::Rejected(ErrorCode::MarketNotFound))
}

fn chunk_message(staking: crate::Address, market_id: u64, chunk: &SettlementChunk) -> Result<Outbound> {
    let (cmd, value) = match chunk.kind {
        SettlementKind::Reward => {
            let reward = chunk.value()?;
            (
                StakingCommand::CreditRewards {
                    market_id,
                    seq: chunk.seq,
                    reward,
                    entries: chunk.entries.clone(),
                },
                Funds::tai(reward),
            )
        }
        SettlementKind::Slash => (
            StakingCommand::ApplySlash {
                market_id,
                seq: chunk.seq,
                entries: chunk.entries.clone(),
            },
            Funds::ZERO,
        ),
    };
    Ok(Outbound::new(staking, value, cmd.encode()))
}

fn chunk_list(kind: SettlementKind, entries: &[Entry], size: usize) -> Result<Vec<SettlementChunk>> {
    entries
        .chunks(size.max(1))
        .enumerate()
        .map(|(i, part)| {
            let seq = u16::try_from(i).map_err(|_| TaiError::Rejected(ErrorCode::TooManyEntries))?;
            Ok(SettlementChunk {
                kind,
                seq,
                entries: part.to_vec(),
                status: ChunkStatus::Sent,
            })
        })
        .collect()
}

/// Split the losing pool at resolution.
///
/// Returns `(platform_fees, reward_pool, payout_pool)`.
fn split_pools(
    market: &Market,
    outcome: Side,
    creator_penalty: Amount,
    assigned_reward: Amount,
) -> Result<(Amount, Amount, Amount)> {
    let winning = market.pool(outcome);
    let losing = market.pool(outcome.opposite());
    let fee = math::floor_bps(losing, Bps::new(market.fee_bps)?)?;
    let reward = math::floor_bps(losing, Bps::new(market.reward_bps)?)?;
    ensure(assigned_reward <= reward, ErrorCode::RewardExceedsPool)?;
    let distributable = math::sub(math::sub(losing, fee)?, reward)?;

    let mut fees = math::add(fee, creator_penalty)?;
    fees = math::add(fees, reward - assigned_reward)?;
    let payout_pool = if winning == 0 {
        fees = math::add(fees, distributable)?;
        0
    } else {
        math::add(winning, distributable)?
    };
    Ok((fees, assigned_reward, payout_pool))
}

/// Market a command reads or writes; `None` for market-independent commands.
fn touched_market(state: &State, cmd: &Command) -> Option<u64> {
    match cmd {
        Command::CreateMarket { .. } => Some(state.next_market_id),
        Command::PlaceBet { market_id, .. }
        | Command::LockMarket { market_id }
        | Command::ResolveMarket { market_id, .. }
        | Command::ClaimWinnings { market_id }
        | Command::ClaimCreatorStake { market_id }
        | Command::VoidMarket { market_id, .. }
        | Command::RetrySettlement { market_id }
        | Command::SettlementAck { market_id, .. } => Some(*market_id),
        Command::WithdrawFees | Command::UpdateConfig { .. } | Command::TransferAdmin { .. } => None,
    }
}

pub fn step(state: &State, ctx: &MsgContext, cmd: Command) -> Result<(State, Effects)> {
    let touched = touched_market(state, &cmd);
    check_touched(state, touched)?;

    let now = ctx.now;
    let mut next = state.clone();
    let mut effects = Effects::none();
    let mut consumed = Funds::ZERO;

    match cmd {
        Command::CreateMarket {
            close_time,
            creator_stake,
            fee_bps,
            metadata,
        } => {
            let cfg = &state.config;
            ensure(creator_stake >= cfg.min_creator_stake, ErrorCode::StakeTooLow)?;
            ensure(fee_bps <= cfg.max_fee_bps, ErrorCode::FeeTooHigh)?;
            ensure(close_time > now, ErrorCode::InvalidClose)?;
            ensure(
                metadata.len() <= cfg.max_metadata_len,
                ErrorCode::MetadataTooLong,
            )?;
            ensure(ctx.value.tai >= creator_stake, ErrorCode::InsufficientValue)?;

            let id = state.next_market_id;
            next.next_market_id = math::add_u64(id, 1)?;
            next.markets.insert(
                id,
                Market {
                    id,
                    creator: ctx.sender,
                    close_time,
                    status: MarketStatus::Open,
                    outcome: None,
                    creator_stake,
                    creator_penalty: 0,
                    creator_stake_claimed: false,
                    yes_pool: 0,
                    no_pool: 0,
                    fee_bps,
                    reward_bps: cfg.reward_bps,
                    platform_fees: 0,
                    reward_pool: 0,
                    payout_pool: 0,
                    paid_out: 0,
                    resolved_at: None,
                    metadata,
                    void_reason: None,
                    settlement: Vec::new(),
                },
            );
            consumed = Funds::tai(creator_stake);
            debug!(market_id = id, close_time, "market created");
        }
        Command::PlaceBet {
            market_id,
            side,
            amount,
        } => {
            let min_bet = state.config.min_bet_amount;
            let divisor = state.config.points_divisor;
            let market = market_mut(&mut next, market_id)?;
            ensure(market.status == MarketStatus::Open, ErrorCode::MarketNotOpen)?;
            ensure(now < market.close_time, ErrorCode::MarketClosed)?;
            let side = Side::try_from(side)?;
            ensure(amount >= min_bet, ErrorCode::BetTooSmall)?;
            ensure(ctx.value.tai >= amount, ErrorCode::InsufficientValue)?;

            match side {
                Side::Yes => market.yes_pool = math::add(market.yes_pool, amount)?,
                Side::No => market.no_pool = math::add(market.no_pool, amount)?,
            }
            let pos = next
                .positions
                .entry(market_id)
                .or_default()
                .entry(ctx.sender)
                .or_default();
            match side {
                Side::Yes => pos.yes_amount = math::add(pos.yes_amount, amount)?,
                Side::No => pos.no_amount = math::add(pos.no_amount, amount)?,
            }
            consumed = Funds::tai(amount);

            let points = amount / divisor;
            if points > 0 {
                let record = StakingCommand::RecordParticipation {
                    target: ctx.sender,
                    points: u64::try_from(points).unwrap_or(u64::MAX),
                };
                effects.push(Outbound::new(state.staking, Funds::ZERO, record.encode()));
            }
        }
        Command::LockMarket { market_id } => {
            let market = market_mut(&mut next, market_id)?;
            match market.status {
                MarketStatus::Open => {}
                MarketStatus::Locked => return Err(TaiError::Rejected(ErrorCode::AlreadyLocked)),
                _ => return Err(TaiError::Rejected(ErrorCode::MarketNotOpen)),
            }
            ensure(now >= market.close_time, ErrorCode::InvalidClose)?;
            market.status = MarketStatus::Locked;
        }
        Command::ResolveMarket {
            market_id,
            outcome,
            creator_penalty,
            reward_payouts,
            slash_list,
        } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            let chunk_size = state.config.max_entries_per_message;
            let staking = state.staking;
            let market = market_mut(&mut next, market_id)?;
            match market.status {
                MarketStatus::Locked => {}
                MarketStatus::Open => return Err(TaiError::Rejected(ErrorCode::MarketNotLocked)),
                _ => return Err(TaiError::Rejected(ErrorCode::AlreadyResolved)),
            }
            let outcome = Side::try_from(outcome)?;
            ensure(
                creator_penalty <= market.creator_stake,
                ErrorCode::PenaltyTooHigh,
            )?;
            ensure(
                reward_payouts.len() <= MAX_CHAIN_LEN && slash_list.len() <= MAX_CHAIN_LEN,
                ErrorCode::TooManyEntries,
            )?;

            let assigned = math::sum(reward_payouts.iter().map(|e| e.amount))?;
            let (fees, reward_pool, payout_pool) =
                split_pools(market, outcome, creator_penalty, assigned)?;

            let mut chunks = chunk_list(SettlementKind::Reward, &reward_payouts, chunk_size)?;
            chunks.extend(chunk_list(SettlementKind::Slash, &slash_list, chunk_size)?);
            for chunk in &chunks {
                effects.push(chunk_message(staking, market_id, chunk)?);
            }

            market.status = MarketStatus::Resolved;
            market.outcome = Some(outcome);
            market.creator_penalty = creator_penalty;
            market.platform_fees = fees;
            market.reward_pool = reward_pool;
            market.payout_pool = payout_pool;
            market.resolved_at = Some(now);
            market.settlement = chunks;
            next.fees_accrued = math::add(next.fees_accrued, fees)?;
            debug!(market_id, ?outcome, fees = %fees, payout_pool = %payout_pool, "market resolved");
        }
        Command::ClaimWinnings { market_id } => {
            let market = next
                .markets
                .get(&market_id)
                .ok_or(TaiError::Rejected(ErrorCode::MarketNotFound))?
                .clone();
            let pos: &mut BetPosition = next
                .positions
                .get_mut(&market_id)
                .and_then(|p| p.get_mut(&ctx.sender))
                .ok_or(TaiError::Rejected(ErrorCode::NothingToClaim))?;

            let (amount, reason) = match (market.status, market.outcome) {
                (MarketStatus::Resolved, Some(outcome)) => {
                    let stake = pos.amount(outcome);
                    ensure(stake > 0 && !pos.claimed(outcome), ErrorCode::NothingToClaim)?;
                    pos.set_claimed(outcome, true);
                    let payout = math::mul_div_floor(stake, market.payout_pool, market.pool(outcome))?;
                    (payout, PayoutReason::Winnings { market_id })
                }
                (MarketStatus::Void, _) => {
                    let mut refund = 0;
                    for side in [Side::Yes, Side::No] {
                        if !pos.claimed(side) && pos.amount(side) > 0 {
                            refund = math::add(refund, pos.amount(side))?;
                            pos.set_claimed(side, true);
                        }
                    }
                    ensure(refund > 0, ErrorCode::NothingToClaim)?;
                    (refund, PayoutReason::BetRefund { market_id })
                }
                _ => return Err(TaiError::Rejected(ErrorCode::MarketNotResolved)),
            };

            let m = market_mut(&mut next, market_id)?;
            m.paid_out = math::add(m.paid_out, amount)?;
            effects.push(Outbound::payout(ctx.sender, Funds::tai(amount), reason));
        }
        Command::ClaimCreatorStake { market_id } => {
            let market = market_mut(&mut next, market_id)?;
            ensure(market.creator == ctx.sender, ErrorCode::NotCreator)?;
            ensure(market.is_done(), ErrorCode::NotDone)?;
            let refundable = math::sub(market.creator_stake, market.creator_penalty)?;
            ensure(
                !market.creator_stake_claimed && refundable > 0,
                ErrorCode::NothingToClaim,
            )?;
            market.creator_stake_claimed = true;
            effects.push(Outbound::payout(
                ctx.sender,
                Funds::tai(refundable),
                PayoutReason::CreatorStake { market_id },
            ));
        }
        Command::VoidMarket { market_id, reason } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(
                reason.len() <= state.config.max_metadata_len,
                ErrorCode::MetadataTooLong,
            )?;
            let market = market_mut(&mut next, market_id)?;
            ensure(!market.is_done(), ErrorCode::AlreadyResolved)?;
            market.status = MarketStatus::Void;
            market.resolved_at = Some(now);
            market.void_reason = Some(reason);
        }
        Command::WithdrawFees => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            ensure(state.fees_accrued > 0, ErrorCode::NoFees)?;
            next.fees_accrued = 0;
            effects.push(Outbound::payout(
                state.treasury,
                Funds::tai(state.fees_accrued),
                PayoutReason::PlatformFees,
            ));
        }
        Command::RetrySettlement { market_id } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            let staking = state.staking;
            let market = market_mut(&mut next, market_id)?;
            let mut resent = 0usize;
            for chunk in market.settlement.iter_mut() {
                if chunk.status == ChunkStatus::Acked {
                    continue;
                }
                effects.push(chunk_message(staking, market_id, chunk)?);
                chunk.status = ChunkStatus::Sent;
                resent += 1;
            }
            ensure(resent > 0, ErrorCode::NothingToRetry)?;
            debug!(market_id, resent, "settlement chunks re-sent");
        }
        Command::SettlementAck {
            market_id,
            kind,
            seq,
        } => {
            only(&ctx.sender, &state.staking, ErrorCode::NotStaking)?;
            let market = market_mut(&mut next, market_id)?;
            if let Some(chunk) = market
                .settlement
                .iter_mut()
                .find(|c| c.kind == kind && c.seq == seq)
            {
                chunk.status = ChunkStatus::Acked;
            }
        }
        Command::UpdateConfig { treasury, staking } => {
            only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;
            if let Some(t) = treasury {
                next.treasury = t;
            }
            if let Some(s) = staking {
                next.staking = s;
            }
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

    check_touched(&next, touched)?;
    Ok((next, effects))
}

/// A message sent by the market came back; undo the bookkeeping that went with it.
pub fn on_bounce(state: &State, ctx: &MsgContext, original: &[u8]) -> Result<State> {
    let mut next = state.clone();
    let mut touched = None;

    if let Ok(payout) = Payout::decode(original) {
        let returned = ctx.value.tai;
        if let PayoutReason::Winnings { market_id }
        | PayoutReason::BetRefund { market_id }
        | PayoutReason::CreatorStake { market_id } = payout.reason
        {
            touched = Some(market_id);
        }
        match payout.reason {
            PayoutReason::Winnings { market_id } => {
                let outcome = state.market(market_id).and_then(|m| m.outcome);
                if let (Some(outcome), Some(pos)) = (
                    outcome,
                    next.positions
                        .get_mut(&market_id)
                        .and_then(|p| p.get_mut(&ctx.sender)),
                ) {
                    pos.set_claimed(outcome, false);
                }
                if let Some(m) = next.markets.get_mut(&market_id) {
                    m.paid_out = m.paid_out.saturating_sub(returned);
                }
            }
            PayoutReason::BetRefund { market_id } => {
                if let Some(pos) = next
                    .positions
                    .get_mut(&market_id)
                    .and_then(|p| p.get_mut(&ctx.sender))
                {
                    pos.claimed_yes = false;
                    pos.claimed_no = false;
                }
                if let Some(m) = next.markets.get_mut(&market_id) {
                    m.paid_out = m.paid_out.saturating_sub(returned);
                }
            }
            PayoutReason::CreatorStake { market_id } => {
                if let Some(m) = next.markets.get_mut(&market_id) {
                    m.creator_stake_claimed = false;
                }
            }
            PayoutReason::PlatformFees => {
                next.fees_accrued = math::add(next.fees_accrued, returned)?;
            }
            _ => {}
        }
    } else if let Ok(cmd) = StakingCommand::decode(original) {
        let target = match cmd {
            StakingCommand::CreditRewards { market_id, seq, .. } => {
                Some((market_id, SettlementKind::Reward, seq))
            }
            StakingCommand::ApplySlash { market_id, seq, .. } => {
                Some((market_id, SettlementKind::Slash, seq))
            }
            // Participation points are best-effort.
            _ => None,
        };
        if let Some((market_id, kind, seq)) = target {
            touched = Some(market_id);
            if let Some(chunk) = next
                .markets
                .get_mut(&market_id)
                .and_then(|m| m.settlement.iter_mut().find(|c| c.kind == kind && c.seq == seq))
            {
                if chunk.status != ChunkStatus::Acked {
                    chunk.status = ChunkStatus::Bounced;
                }
            }
        }
    }

    check_touched(&next, touched)?;
    Ok(next)
}
