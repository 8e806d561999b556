use super::command::Command;
use super::state::State;
use super::step::{on_bounce, step_with};
use crate::bus::{ensure_affordable, Actor, MsgContext, Outbound};
use crate::config::UnlockConfig;
use crate::merkle::{MerkleVerifier, Sha256Verifier};
use crate::wire::WireMessage;
use crate::{ensure, Address, ErrorCode, Result};
use std::any::Any;
use tracing::{debug, warn};

pub struct UnlockActor<V = Sha256Verifier> {
    address: Address,
    state: State,
    verifier: V,
}

impl UnlockActor<Sha256Verifier> {
    pub fn new(address: Address, admin: Address, treasury: Address, config: UnlockConfig) -> Self {
        Self::with_verifier(address, admin, treasury, config, Sha256Verifier)
    }
}

impl<V: MerkleVerifier> UnlockActor<V> {
    pub fn with_verifier(
        address: Address,
        admin: Address,
        treasury: Address,
        config: UnlockConfig,
        verifier: V,
    ) -> Self {
        Self {
            address,
            state: State::init(admin, treasury, config),
            verifier,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

/// Outbound value must leave enough TAI for the locked supply and unsold sale inventory.
fn ensure_solvent(ctx: &MsgContext, next: &State, out: &[Outbound]) -> Result<()> {
    ensure_affordable(ctx, out)?;
    let outgoing: u128 = out.iter().map(|o| o.value.tai).sum();
    ensure(
        ctx.balance.tai - outgoing >= next.obligations()?,
        ErrorCode::InsufficientBalance,
    )
}

impl<V: MerkleVerifier + 'static> Actor for UnlockActor<V> {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "unlock"
    }

    fn opcodes(&self) -> Vec<&'static [u32]> {
        vec![Command::OPCODES]
    }

    fn receive(&mut self, ctx: &MsgContext, body: &[u8]) -> Result<Vec<Outbound>> {
        let cmd = Command::decode(body)?;
        let name = cmd.name();
        let (next, effects) = step_with(&self.state, ctx, cmd, &self.verifier)?;
        ensure_solvent(ctx, &next, &effects.messages)?;
        self.state = next;
        debug!(
            cmd = name,
            sender = %ctx.sender.short(),
            round = self.state.current_round,
            remaining = %self.state.remaining_locked,
            "unlock transition committed"
        );
        Ok(effects.messages)
    }

    fn on_bounce(&mut self, ctx: &MsgContext, code: u16, original: &[u8]) -> Result<Vec<Outbound>> {
        warn!(code, from = %ctx.sender.short(), "unlock payout bounced");
        let (next, effects) = on_bounce(&self.state, ctx, original)?;
        ensure_affordable(ctx, &effects.messages)?;
        self.state = next;
        Ok(effects.messages)
    }

    fn state_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.state).unwrap_or(serde_json::Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
