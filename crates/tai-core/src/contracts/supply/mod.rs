//! Fixed supply ledger.
//!
//! Holds the genesis supply, distributes the unlocked part on admin instruction, and hands
//! the locked allocation to the vesting contract exactly once.

pub mod actor;
pub mod command;
pub mod invariants;
pub mod state;
pub mod step;

#[cfg(test)]
mod tests;

pub use actor::SupplyActor;
pub use command::Command;
pub use state::State;
pub use step::{on_bounce, step};
