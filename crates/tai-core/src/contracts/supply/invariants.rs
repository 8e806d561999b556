use super::state::State;
use crate::math;
use crate::{Result, TaiError};

/// Check all invariants. Returns Err if any violated.
pub fn check_invariants(state: &State) -> Result<()> {
    let committed = math::add(state.distributed, state.config.locked_supply)?;
    if committed > state.config.total_supply {
        return Err(TaiError::InvariantViolation("distributed + locked > total_supply"));
    }
    Ok(())
}
