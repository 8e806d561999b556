use super::command::Command;
use super::state::State;
use super::step::{on_bounce, step};
use crate::bus::{ensure_affordable, Actor, MsgContext, Outbound};
use crate::config::MarketConfig;
use crate::wire::WireMessage;
use crate::{Address, Result};
use std::any::Any;
use tracing::{debug, warn};

pub struct MarketActor {
    address: Address,
    state: State,
}

impl MarketActor {
    pub fn new(
        address: Address,
        admin: Address,
        treasury: Address,
        staking: Address,
        config: MarketConfig,
    ) -> Self {
        Self {
            address,
            state: State::init(admin, treasury, staking, config),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

impl Actor for MarketActor {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "market"
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
            sender = %ctx.sender.short(),
            markets = self.state.markets.len(),
            fees = %self.state.fees_accrued,
            "market transition committed"
        );
        Ok(effects.messages)
    }

    fn on_bounce(&mut self, ctx: &MsgContext, code: u16, original: &[u8]) -> Result<Vec<Outbound>> {
        warn!(code, from = %ctx.sender.short(), returned = %ctx.value.tai, "market message bounced");
        self.state = on_bounce(&self.state, ctx, original)?;
        Ok(Vec::new())
    }

    fn state_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
