//! Juror staking ledger.
//!
//! Tracks per-address TAI stake with stake-seconds accrual, penalties and pending rewards.
//! Reward credits and slashes arrive from the prediction market in numbered chunks; each
//! chunk is applied at most once and acknowledged.

pub mod actor;
pub mod command;
pub mod invariants;
pub mod state;
pub mod step;

#[cfg(test)]
mod tests;

pub use actor::StakingActor;
pub use command::{Command, SettlementKind};
pub use state::{ChunkKey, StakeInfo, State};
pub use step::{on_bounce, step};
