use crate::config::MarketConfig;
use crate::contracts::staking::SettlementKind;
use crate::math;
use crate::types::{Amount, Entry, Side, Timestamp};
use crate::{Address, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Open,
    Locked,
    Resolved,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    Sent,
    Acked,
    /// Returned by the ledger; value is back with the market until retried.
    Bounced,
}

/// One settlement message sent to the staking ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementChunk {
    pub kind: SettlementKind,
    pub seq: u16,
    pub entries: Vec<Entry>,
    pub status: ChunkStatus,
}

impl SettlementChunk {
    /// TAI carried by the chunk (reward chunks only).
    pub fn value(&self) -> Result<Amount> {
        match self.kind {
            SettlementKind::Reward => math::sum(self.entries.iter().map(|e| e.amount)),
            SettlementKind::Slash => Ok(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: u64,
    pub creator: Address,
    pub close_time: Timestamp,
    pub status: MarketStatus,
    pub outcome: Option<Side>,
    pub creator_stake: Amount,
    pub creator_penalty: Amount,
    pub creator_stake_claimed: bool,
    pub yes_pool: Amount,
    pub no_pool: Amount,
    pub fee_bps: u16,
    pub reward_bps: u16,
    /// Fees taken at resolution (losing-pool fee, penalty, unassigned reward).
    pub platform_fees: Amount,
    /// Juror rewards forwarded to the staking ledger.
    pub reward_pool: Amount,
    /// Winners' pool: winning side plus the distributable share of the losing side.
    pub payout_pool: Amount,
    pub paid_out: Amount,
    pub resolved_at: Option<Timestamp>,
    pub metadata: String,
    pub void_reason: Option<String>,
    pub settlement: Vec<SettlementChunk>,
}

impl Market {
    pub fn pool(&self, side: Side) -> Amount {
        match side {
            Side::Yes => self.yes_pool,
            Side::No => self.no_pool,
        }
    }

    pub fn total_pool(&self) -> Result<Amount> {
        math::add(self.yes_pool, self.no_pool)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, MarketStatus::Resolved | MarketStatus::Void)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetPosition {
    pub yes_amount: Amount,
    pub no_amount: Amount,
    pub claimed_yes: bool,
    pub claimed_no: bool,
}

impl BetPosition {
    pub fn amount(&self, side: Side) -> Amount {
        match side {
            Side::Yes => self.yes_amount,
            Side::No => self.no_amount,
        }
    }

    pub fn claimed(&self, side: Side) -> bool {
        match side {
            Side::Yes => self.claimed_yes,
            Side::No => self.claimed_no,
        }
    }

    pub fn set_claimed(&mut self, side: Side, claimed: bool) {
        match side {
            Side::Yes => self.claimed_yes = claimed,
            Side::No => self.claimed_no = claimed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub admin: Address,
    pub treasury: Address,
    pub staking: Address,
    pub config: MarketConfig,
    pub next_market_id: u64,
    pub markets: BTreeMap<u64, Market>,
    pub positions: BTreeMap<u64, BTreeMap<Address, BetPosition>>,
    /// Fees accrued across markets and not yet withdrawn.
    pub fees_accrued: Amount,
}

impl State {
    pub fn init(admin: Address, treasury: Address, staking: Address, config: MarketConfig) -> Self {
        Self {
            admin,
            treasury,
            staking,
            config,
            next_market_id: 1,
            markets: BTreeMap::new(),
            positions: BTreeMap::new(),
            fees_accrued: 0,
        }
    }

    pub fn market(&self, id: u64) -> Option<&Market> {
        self.markets.get(&id)
    }

    pub fn position(&self, id: u64, who: &Address) -> BetPosition {
        self.positions
            .get(&id)
            .and_then(|p| p.get(who))
            .copied()
            .unwrap_or_default()
    }

    /// Winnings owed to `who` on a resolved market, ignoring claim flags.
    pub fn winnings_of(&self, id: u64, who: &Address) -> Result<Amount> {
        let Some(m) = self.market(id) else {
            return Ok(0);
        };
        let Some(outcome) = m.outcome else {
            return Ok(0);
        };
        let winning = m.pool(outcome);
        if m.status != MarketStatus::Resolved || winning == 0 {
            return Ok(0);
        }
        math::mul_div_floor(self.position(id, who).amount(outcome), m.payout_pool, winning)
    }
}
