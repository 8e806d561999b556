use super::command::{Command, PricePoint};
use super::invariants::check_invariants;
use super::state::{PriceEntry, State};
use crate::bus::MsgContext;
use crate::contracts::{only, Effects};
use crate::types::day_index;
use crate::{ensure, math, ErrorCode, Result};

/// Samples considered when screening a push for outliers.
pub const OUTLIER_WINDOW_DAYS: usize = 7;

fn push(state: &mut State, point: PricePoint) -> Result<()> {
    ensure(point.price > 0, ErrorCode::BadPrice)?;
    ensure(point.timestamp > state.latest_timestamp(), ErrorCode::NonMonotonic)?;

    if state.config.reject_outliers {
        if let Some(avg) = state.average(OUTLIER_WINDOW_DAYS)? {
            let dev = math::deviation_bps(point.price, avg)?;
            ensure(
                dev <= state.config.max_deviation_bps as u128,
                ErrorCode::PriceDeviation,
            )?;
        }
    }

    state.prices.insert(
        day_index(point.timestamp),
        PriceEntry {
            timestamp: point.timestamp,
            price: point.price,
        },
    );
    while state.prices.len() > state.config.max_history_days {
        state.prices.pop_first();
    }
    Ok(())
}

pub fn step(state: &State, ctx: &MsgContext, cmd: Command) -> Result<(State, Effects)> {
    check_invariants(state)?;
    only(&ctx.sender, &state.admin, ErrorCode::NotAdmin)?;

    let mut next = state.clone();
    match cmd {
        Command::PushPrice { timestamp, price } => {
            push(&mut next, PricePoint { timestamp, price })?;
        }
        Command::BatchPushPrice { points } => {
            ensure(!points.is_empty(), ErrorCode::InvalidAmount)?;
            ensure(
                points.len() <= state.config.max_batch_entries,
                ErrorCode::TooManyEntries,
            )?;
            for p in points {
                push(&mut next, p)?;
            }
        }
        Command::ResetPrice { timestamp, price } => {
            ensure(price > 0, ErrorCode::BadPrice)?;
            let day = day_index(timestamp);
            // Later days are discarded; earlier days are necessarily older than `timestamp`.
            let _ = next.prices.split_off(&day);
            next.prices.insert(day, PriceEntry { timestamp, price });
        }
        Command::TransferAdmin { new_admin } => {
            next.admin = new_admin;
        }
    }

    check_invariants(&next)?;
    Ok((next, Effects::none()))
}
