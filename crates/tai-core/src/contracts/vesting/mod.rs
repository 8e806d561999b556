//! Round-based vesting of the locked allocation.
//!
//! Funded once by the supply ledger. Each round has an admin-configured target price,
//! strictly above the previous round's, and is released in order once the observed price
//! reaches the target.

pub mod actor;
pub mod command;
pub mod invariants;
pub mod state;
pub mod step;

#[cfg(test)]
mod tests;

pub use actor::VestingActor;
pub use command::Command;
pub use state::State;
pub use step::{on_bounce, step};
