//! Locked-supply unlock controller.
//!
//! Releases the locked supply to treasury in equal rounds, each gated on an admin-relayed
//! price fact showing enough inflation over the previous round and on a minimum hold time.
//! Also runs the merkle-gated whitelist sale and the emergency buyback circuit breaker.

pub mod actor;
pub mod command;
pub mod invariants;
pub mod state;
pub mod step;


pub use actor::UnlockActor;
pub use command::Command;
pub use state::{BuybackEvent, PriceRecord, RoundRelease, State, WhitelistSale};
pub use step::{on_bounce, step, step_with};
