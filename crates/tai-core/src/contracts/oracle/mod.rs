//! Admin-fed TAI price oracle.
//!
//! One sample per UTC day, strictly increasing timestamps, bounded history. Reads are local
//! getters; nothing here sends messages.

pub mod actor;
pub mod command;
pub mod invariants;
pub mod state;
pub mod step;


pub use actor::OracleActor;
pub use command::{Command, PricePoint};
pub use state::State;
pub use step::step;
