use super::command::SettlementKind;
use crate::config::StakingConfig;
use crate::math;
use crate::types::{Amount, Timestamp, BPS_U128, SECONDS_PER_DAY};
use crate::{Address, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeInfo {
    pub amount: Amount,
    /// Σ amount × seconds while staked and not paused.
    pub accumulated_seconds: u128,
    pub last_update: Timestamp,
    pub penalty_count: u32,
    pub paused_until: Timestamp,
    pub pending_reward: Amount,
    pub points: u64,
}

impl StakeInfo {
    /// Stake-seconds accrued up to `now`, excluding any pause window.
    pub fn accrued_at(&self, now: Timestamp) -> Result<u128> {
        if self.amount == 0 || now <= self.last_update {
            return Ok(self.accumulated_seconds);
        }
        let start = self.last_update.max(self.paused_until.min(now));
        let elapsed = (now - start) as u128;
        math::add(self.accumulated_seconds, math::mul(self.amount, elapsed)?)
    }

    pub fn accrue(&mut self, now: Timestamp) -> Result<()> {
        self.accumulated_seconds = self.accrued_at(now)?;
        self.last_update = self.last_update.max(now);
        Ok(())
    }

    pub fn is_suspended(&self, now: Timestamp) -> bool {
        self.paused_until > now
    }
}

/// Dedupe key of an applied settlement chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub market_id: u64,
    pub kind: SettlementKind,
    pub seq: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub admin: Address,
    pub treasury: Address,
    pub prediction_market: Option<Address>,
    pub config: StakingConfig,
    pub emergency: bool,
    pub stakers: BTreeMap<Address, StakeInfo>,
    pub total_staked: Amount,
    pub slashed_pool: Amount,
    /// Σ pending_reward, held for claims.
    pub reward_reserve: Amount,
    pub applied_chunks: BTreeSet<ChunkKey>,
}

impl State {
    pub fn init(admin: Address, treasury: Address, config: StakingConfig) -> Self {
        Self {
            admin,
            treasury,
            prediction_market: None,
            config,
            emergency: false,
            stakers: BTreeMap::new(),
            total_staked: 0,
            slashed_pool: 0,
            reward_reserve: 0,
            applied_chunks: BTreeSet::new(),
        }
    }

    pub fn info(&self, addr: &Address) -> Option<&StakeInfo> {
        self.stakers.get(addr)
    }

    pub fn stake_of(&self, addr: &Address) -> Amount {
        self.info(addr).map_or(0, |i| i.amount)
    }

    /// Stake-days: accrued stake-seconds / 86400.
    pub fn stake_days(&self, addr: &Address, now: Timestamp) -> Result<u128> {
        match self.info(addr) {
            Some(info) => Ok(info.accrued_at(now)? / SECONDS_PER_DAY as u128),
            None => Ok(0),
        }
    }

    /// `min(amount × amount_ratio, stake_days × days_ratio)` capped at `cap_ratio × total_staked`.
    pub fn whitelist_quota(&self, addr: &Address, now: Timestamp) -> Result<Amount> {
        let amount = self.stake_of(addr);
        let by_amount = math::mul_div_floor(
            amount,
            self.config.quota_amount_ratio_bps as u128,
            BPS_U128,
        )?;
        let by_days = math::mul_div_floor(
            self.stake_days(addr, now)?,
            self.config.quota_days_ratio_bps as u128,
            BPS_U128,
        )?;
        let cap = math::mul_div_floor(
            self.total_staked,
            self.config.quota_cap_ratio_bps as u128,
            BPS_U128,
        )?;
        Ok(by_amount.min(by_days).min(cap))
    }

    /// TAI the ledger must hold to honor every stake, reward and slashed balance.
    pub fn obligations(&self) -> Result<Amount> {
        math::add(
            math::add(self.total_staked, self.reward_reserve)?,
            self.slashed_pool,
        )
    }
}
