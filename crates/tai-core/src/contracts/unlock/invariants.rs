use super::state::State;
use crate::math;
use crate::{Result, TaiError};

/// Check all invariants. Returns Err if any violated.
pub fn check_invariants(state: &State) -> Result<()> {
    // LockedSupply
    let released = state.released_total()?;
    if math::add(state.remaining_locked, released)? != state.config.total_locked {
        return Err(TaiError::InvariantViolation("remaining_locked + released != total_locked"));
    }

    // RoundProgression
    if state.current_round == 0 || state.current_round as usize != state.releases.len() + 1 {
        return Err(TaiError::InvariantViolation("current_round out of step with releases"));
    }
    if state.current_round > state.config.rounds.saturating_add(1) {
        return Err(TaiError::InvariantViolation("current_round past final round"));
    }
    if state.all_unlocked() && state.remaining_locked != 0 {
        return Err(TaiError::InvariantViolation("all rounds released with supply still locked"));
    }
    let ordered = state
        .releases
        .iter()
        .enumerate()
        .all(|(i, r)| r.round as usize == i + 1);
    if !ordered {
        return Err(TaiError::InvariantViolation("release rounds not sequential"));
    }

    if state.pending_price.is_some() && state.initial_price.is_none() {
        return Err(TaiError::InvariantViolation("pending price without initial price"));
    }

    // Sale
    if let Some(sale) = &state.sale {
        if sale.sold_amount > sale.total_amount {
            return Err(TaiError::InvariantViolation("sold_amount > total_amount"));
        }
        if math::sum(sale.purchased.values().copied())? != sale.sold_amount {
            return Err(TaiError::InvariantViolation("sold_amount != Σ purchased"));
        }
        if sale.active && sale.remainder_refunded {
            return Err(TaiError::InvariantViolation("active sale with refunded remainder"));
        }
    }

    Ok(())
}
