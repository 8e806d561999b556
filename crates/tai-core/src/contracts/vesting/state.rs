use crate::config::VestingConfig;
use crate::math;
use crate::types::{Amount, Price};
use crate::{Address, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub admin: Address,
    /// Supply ledger that funds the schedule.
    pub master: Address,
    pub beneficiary: Address,
    pub config: VestingConfig,
    pub funded: bool,
    pub total_locked: Amount,
    pub released: Amount,
    /// Target price per configured round.
    pub round_prices: BTreeMap<u8, Price>,
    /// Amount released per round.
    pub releases: BTreeMap<u8, Amount>,
    pub last_configured_round: u8,
    /// Released value that bounced back and awaits `ResendUndelivered`.
    pub undelivered: Amount,
}

impl State {
    pub fn init(admin: Address, master: Address, beneficiary: Address, config: VestingConfig) -> Self {
        Self {
            admin,
            master,
            beneficiary,
            config,
            funded: false,
            total_locked: 0,
            released: 0,
            round_prices: BTreeMap::new(),
            releases: BTreeMap::new(),
            last_configured_round: 0,
            undelivered: 0,
        }
    }

    pub fn is_released(&self, round: u8) -> bool {
        self.releases.contains_key(&round)
    }

    /// Allocation of `round`; the final round takes whatever is left.
    pub fn round_amount(&self, round: u8) -> Result<Amount> {
        if round >= self.config.max_rounds {
            return math::sub(self.total_locked, self.released);
        }
        Ok(self.total_locked / self.config.max_rounds.max(1) as Amount)
    }

    /// TAI the contract must keep: unreleased allocation plus bounced releases.
    pub fn obligations(&self) -> Result<Amount> {
        math::add(math::sub(self.total_locked, self.released)?, self.undelivered)
    }
}
