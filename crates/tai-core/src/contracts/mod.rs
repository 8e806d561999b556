//! Contract actors.
//!
//! Each contract is laid out the same way:
//! - `command.rs`: inbound message enum and its wire codec
//! - `state.rs`: persisted root structure and read-only getters
//! - `step.rs`: `(state, context, command) -> (state, effects)`, the only mutation path
//! - `invariants.rs`: checked before and after every transition
//! - `actor.rs`: [`crate::bus::Actor`] adapter that commits a transition only on success

pub mod market;
pub mod oracle;
pub mod staking;
pub mod supply;
pub mod unlock;
pub mod vesting;

use crate::bus::Outbound;
use crate::{ensure, Address, ErrorCode, Result};

/// Effects produced by a transition (data, not side effects).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Effects {
    pub messages: Vec<Outbound>,
}

impl Effects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn one(msg: Outbound) -> Self {
        Self {
            messages: vec![msg],
        }
    }

    pub fn push(&mut self, msg: Outbound) {
        self.messages.push(msg);
    }
}

pub(crate) fn only(sender: &Address, expected: &Address, code: ErrorCode) -> Result<()> {
    ensure(sender == expected, code)
}
