use super::state::State;
use crate::math;
use crate::{Result, TaiError};

/// Check all invariants. Returns Err if any violated.
pub fn check_invariants(state: &State) -> Result<()> {
    if math::sum(state.releases.values().copied())? != state.released {
        return Err(TaiError::InvariantViolation("released != Σ round releases"));
    }
    if state.released > state.total_locked {
        return Err(TaiError::InvariantViolation("released > total_locked"));
    }
    if !state.funded && (state.total_locked != 0 || !state.releases.is_empty()) {
        return Err(TaiError::InvariantViolation("unfunded schedule holds allocation"));
    }

    // Configured rounds are 1..=last_configured_round with strictly increasing prices.
    let contiguous = state
        .round_prices
        .keys()
        .enumerate()
        .all(|(i, r)| *r as usize == i + 1);
    if !contiguous || state.round_prices.len() != state.last_configured_round as usize {
        return Err(TaiError::InvariantViolation("configured rounds not contiguous"));
    }
    let increasing = state
        .round_prices
        .values()
        .zip(state.round_prices.values().skip(1))
        .all(|(a, b)| b > a);
    if !increasing {
        return Err(TaiError::InvariantViolation("round prices not increasing"));
    }

    // Released rounds form a configured prefix.
    let released_prefix = state
        .releases
        .keys()
        .enumerate()
        .all(|(i, r)| *r as usize == i + 1 && state.round_prices.contains_key(r));
    if !released_prefix {
        return Err(TaiError::InvariantViolation("released rounds not a configured prefix"));
    }

    Ok(())
}
