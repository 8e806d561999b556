use super::command::Command;
use super::state::State;
use super::step::step;
use crate::bus::{ensure_affordable, Actor, MsgContext, Outbound};
use crate::config::OracleConfig;
use crate::wire::WireMessage;
use crate::{Address, Result};
use std::any::Any;
use tracing::debug;

pub struct OracleActor {
    address: Address,
    state: State,
}

impl OracleActor {
    pub fn new(address: Address, admin: Address, config: OracleConfig) -> Self {
        Self {
            address,
            state: State::init(admin, config),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

impl Actor for OracleActor {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "oracle"
    }

    fn opcodes(&self) -> Vec<&'static [u32]> {
        vec![Command::OPCODES]
    }

    fn receive(&mut self, ctx: &MsgContext, body: &[u8]) -> Result<Vec<Outbound>> {
        let cmd = Command::decode(body)?;
        let name = cmd.name();
        let (next, effects) = step(&self.state, ctx, cmd)?;
        ensure_affordable(ctx, &effects.messages)?;
        self.state = next;
        debug!(
            cmd = name,
            latest = ?self.state.latest().map(|e| e.price),
            days = self.state.prices.len(),
            "oracle updated"
        );
        Ok(effects.messages)
    }

    fn state_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
