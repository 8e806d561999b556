use super::state::State;
use crate::math;
use crate::{Result, TaiError};

/// Check all invariants. Returns Err if any violated.
pub fn check_invariants(state: &State) -> Result<()> {
    // StakeSum
    let staked = math::sum(state.stakers.values().map(|i| i.amount))?;
    if staked != state.total_staked {
        return Err(TaiError::InvariantViolation("total_staked != Σ stake"));
    }

    // RewardReserve
    let pending = math::sum(state.stakers.values().map(|i| i.pending_reward))?;
    if pending != state.reward_reserve {
        return Err(TaiError::InvariantViolation("reward_reserve != Σ pending_reward"));
    }

    Ok(())
}
