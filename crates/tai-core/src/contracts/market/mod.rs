//! Binary prediction market.
//!
//! Creators open markets with a TAI stake, bettors take YES or NO, and the admin resolves
//! after the market is locked. Juror rewards and slashes are forwarded to the staking
//! ledger in bounded chunks that stay retryable until acknowledged.

pub mod actor;
pub mod command;
pub mod invariants;
pub mod state;
pub mod step;

#[cfg(test)]
mod tests;

pub use actor::MarketActor;
pub use command::Command;
pub use state::{BetPosition, ChunkStatus, Market, MarketStatus, SettlementChunk, State};
pub use step::{on_bounce, step};
