use super::command::Command;
use super::state::State;
use super::step::{on_bounce, step};
use crate::bus::{ensure_affordable, Actor, MsgContext, Outbound};
use crate::config::SupplyConfig;
use crate::wire::WireMessage;
use crate::{ensure, Address, ErrorCode, Result};
use std::any::Any;
use tracing::{debug, warn};

pub struct SupplyActor {
    address: Address,
    state: State,
}

impl SupplyActor {
    pub fn new(address: Address, admin: Address, vesting: Address, config: SupplyConfig) -> Self {
        Self {
            address,
            state: State::init(admin, vesting, config),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

fn ensure_solvent(ctx: &MsgContext, next: &State, out: &[Outbound]) -> Result<()> {
    ensure_affordable(ctx, out)?;
    let outgoing: u128 = out.iter().map(|o| o.value.tai).sum();
    ensure(
        ctx.balance.tai - outgoing >= next.obligations()?,
        ErrorCode::InsufficientBalance,
    )
}

impl Actor for SupplyActor {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "supply"
    }

    fn opcodes(&self) -> Vec<&'static [u32]> {
        vec![Command::OPCODES]
    }

    fn receive(&mut self, ctx: &MsgContext, body: &[u8]) -> Result<Vec<Outbound>> {
        let cmd = Command::decode(body)?;
        let name = cmd.name();
        let (next, effects) = step(&self.state, ctx, cmd)?;
        ensure_solvent(ctx, &next, &effects.messages)?;
        self.state = next;
        debug!(
            cmd = name,
            sender = %ctx.sender.short(),
            distributed = %self.state.distributed,
            "supply transition committed"
        );
        Ok(effects.messages)
    }

    fn on_bounce(&mut self, ctx: &MsgContext, code: u16, original: &[u8]) -> Result<Vec<Outbound>> {
        warn!(code, from = %ctx.sender.short(), returned = %ctx.value.tai, "supply transfer bounced");
        self.state = on_bounce(&self.state, ctx, code, original)?;
        Ok(Vec::new())
    }

    fn state_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
