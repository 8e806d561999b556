use crate::config::SupplyConfig;
use crate::math;
use crate::types::Amount;
use crate::{Address, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub admin: Address,
    /// The only address allowed to request the locked allocation.
    pub vesting: Address,
    pub config: SupplyConfig,
    pub distributed: Amount,
    pub handoff_done: bool,
}

impl State {
    pub fn init(admin: Address, vesting: Address, config: SupplyConfig) -> Self {
        Self {
            admin,
            vesting,
            config,
            distributed: 0,
            handoff_done: false,
        }
    }

    /// Supply still free for `Distribute`; the locked allocation is never distributable.
    pub fn distributable(&self) -> Result<Amount> {
        let reserved = math::add(self.config.locked_supply, self.distributed)?;
        math::sub(self.config.total_supply, reserved)
    }

    /// TAI the ledger must still hold.
    pub fn obligations(&self) -> Result<Amount> {
        let mut held = self.distributable()?;
        if !self.handoff_done {
            held = math::add(held, self.config.locked_supply)?;
        }
        Ok(held)
    }
}
