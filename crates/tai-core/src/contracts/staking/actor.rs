use super::command::Command;
use super::state::State;
use super::step::{on_bounce, step};
use crate::bus::{ensure_affordable, Actor, MsgContext, Outbound};
use crate::config::StakingConfig;
use crate::wire::WireMessage;
use crate::{ensure, Address, ErrorCode, Result};
use std::any::Any;
use tracing::{debug, warn};

pub struct StakingActor {
    address: Address,
    state: State,
}

impl StakingActor {
    pub fn new(address: Address, admin: Address, treasury: Address, config: StakingConfig) -> Self {
        Self {
            address,
            state: State::init(admin, treasury, config),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

fn ensure_solvent(ctx: &MsgContext, next: &State, out: &[Outbound]) -> Result<()> {
    ensure_affordable(ctx, out)?;
    let outgoing: u128 = out.iter().map(|o| o.value.tai).sum();
    let remaining = ctx.balance.tai - outgoing;
    ensure(
        remaining >= next.obligations()?,
        ErrorCode::InsufficientBalance,
    )
}

impl Actor for StakingActor {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "staking"
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
            total_staked = %self.state.total_staked,
            "staking transition committed"
        );
        Ok(effects.messages)
    }

    fn on_bounce(&mut self, ctx: &MsgContext, code: u16, original: &[u8]) -> Result<Vec<Outbound>> {
        warn!(code, from = %ctx.sender.short(), returned = %ctx.value.tai, "staking payout bounced");
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
