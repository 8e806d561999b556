use super::state::State;
use crate::types::day_index;
use crate::{Result, TaiError};

pub fn check_invariants(state: &State) -> Result<()> {
    if state.prices.len() > state.config.max_history_days {
        return Err(TaiError::InvariantViolation("oracle history over capacity"));
    }

    let mut prev_ts = None;
    for (day, entry) in &state.prices {
        if day_index(entry.timestamp) != *day {
            return Err(TaiError::InvariantViolation("oracle entry keyed under wrong day"));
        }
        if entry.price == 0 {
            return Err(TaiError::InvariantViolation("oracle stored zero price"));
        }
        if prev_ts.is_some_and(|p| entry.timestamp <= p) {
            return Err(TaiError::InvariantViolation("oracle timestamps not increasing"));
        }
        prev_ts = Some(entry.timestamp);
    }

    Ok(())
}
