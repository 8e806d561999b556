use super::state::{MarketStatus, State};
use crate::math;
use crate::{Result, TaiError};

/// Check every market. Cost grows with lifetime history; transitions use [`check_market`].
pub fn check_invariants(state: &State) -> Result<()> {
    for id in state.markets.keys() {
        check_market(state, *id)?;
    }

    if state.positions.keys().any(|id| !state.markets.contains_key(id)) {
        return Err(TaiError::InvariantViolation("position on unknown market"));
    }

    Ok(())
}

/// Check the invariants of one market.
pub fn check_market(state: &State, id: u64) -> Result<()> {
    let positions = state.positions.get(&id);
    let Some(market) = state.markets.get(&id) else {
        if positions.is_some() {
            return Err(TaiError::InvariantViolation("position on unknown market"));
        }
        return Ok(());
    };

    if id != market.id || id >= state.next_market_id {
        return Err(TaiError::InvariantViolation("market id out of sequence"));
    }

    // PoolSum
    let yes = math::sum(positions.into_iter().flat_map(|p| p.values().map(|b| b.yes_amount)))?;
    let no = math::sum(positions.into_iter().flat_map(|p| p.values().map(|b| b.no_amount)))?;
    if yes != market.yes_pool || no != market.no_pool {
        return Err(TaiError::InvariantViolation("side pool != Σ positions"));
    }

    if market.creator_penalty > market.creator_stake {
        return Err(TaiError::InvariantViolation("creator_penalty > creator_stake"));
    }

    let total = market.total_pool()?;
    match market.status {
        MarketStatus::Resolved => {
            if market.outcome.is_none() || market.resolved_at.is_none() {
                return Err(TaiError::InvariantViolation("resolved market without outcome"));
            }
            if market.payout_pool > total || market.paid_out > market.payout_pool {
                return Err(TaiError::InvariantViolation("payout exceeds pool"));
            }
        }
        MarketStatus::Void => {
            if market.paid_out > total {
                return Err(TaiError::InvariantViolation("refunds exceed pool"));
            }
        }
        MarketStatus::Open | MarketStatus::Locked => {
            if market.outcome.is_some() || !market.settlement.is_empty() || market.paid_out != 0 {
                return Err(TaiError::InvariantViolation("unsettled market carries settlement data"));
            }
        }
    }

    Ok(())
}

/// Check only the market a transition touched, if any.
pub fn check_touched(state: &State, touched: Option<u64>) -> Result<()> {
    match touched {
        Some(id) => check_market(state, id),
        None => Ok(()),
    }
}
