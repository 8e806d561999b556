use crate::config::UnlockConfig;
use crate::math;
use crate::types::{Amount, Price, Timestamp};
use crate::{Address, Hash32, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A price fact relayed by the admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub price: Price,
    pub timestamp: Timestamp,
    pub round: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRelease {
    pub round: u8,
    pub price: Price,
    pub amount: Amount,
    pub released_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuybackEvent {
    pub at: Timestamp,
    pub price_now: Price,
    pub price_prev: Price,
    pub drop_bps: u128,
    /// Native sale proceeds forwarded to treasury for the buyback.
    pub budget: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistSale {
    pub active: bool,
    pub merkle_root: Hash32,
    pub total_amount: Amount,
    pub sold_amount: Amount,
    pub baseline_price: Price,
    pub current_price: Price,
    pub window_end: Timestamp,
    pub cancelled: bool,
    /// Native payments not yet swept to treasury.
    pub proceeds: Amount,
    pub remainder_refunded: bool,
    /// Cumulative purchases per beneficiary.
    pub purchased: BTreeMap<Address, Amount>,
}

impl WhitelistSale {
    pub fn unsold(&self) -> Amount {
        self.total_amount.saturating_sub(self.sold_amount)
    }

    /// Whitelist discount against the public baseline, in bps.
    pub fn discount_bps(&self) -> Result<Amount> {
        math::drop_bps(self.current_price, self.baseline_price)
    }

    /// Closed with no unsold inventory or unswept proceeds left.
    pub fn is_settled(&self) -> bool {
        !self.active && self.proceeds == 0 && (self.remainder_refunded || self.unsold() == 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub admin: Address,
    pub treasury: Address,
    pub config: UnlockConfig,
    pub remaining_locked: Amount,
    /// Next round to unlock, `1..=rounds`; `rounds + 1` once everything is released.
    pub current_round: u8,
    pub paused: bool,
    pub initial_price: Option<PriceRecord>,
    /// Latest accepted fact (initial price or a recorded round price).
    pub last_price: Option<PriceRecord>,
    pub pending_price: Option<PriceRecord>,
    pub last_unlock_at: Option<Timestamp>,
    pub releases: Vec<RoundRelease>,
    pub sale: Option<WhitelistSale>,
    pub buybacks: Vec<BuybackEvent>,
}

impl State {
    pub fn init(admin: Address, treasury: Address, config: UnlockConfig) -> Self {
        Self {
            admin,
            treasury,
            remaining_locked: config.total_locked,
            config,
            current_round: 1,
            paused: false,
            initial_price: None,
            last_price: None,
            pending_price: None,
            last_unlock_at: None,
            releases: Vec::new(),
            sale: None,
            buybacks: Vec::new(),
        }
    }

    pub fn all_unlocked(&self) -> bool {
        self.current_round > self.config.rounds
    }

    /// Amount released by `round`; the last round takes the division remainder.
    pub fn round_share(&self, round: u8) -> Amount {
        let share = self.config.total_locked / self.config.rounds.max(1) as Amount;
        if round >= self.config.rounds {
            self.remaining_locked
        } else {
            share.min(self.remaining_locked)
        }
    }

    /// Price the next unlock must beat: the last released round's, else the initial price.
    pub fn reference_price(&self) -> Option<Price> {
        self.releases
            .last()
            .map(|r| r.price)
            .or(self.initial_price.map(|p| p.price))
    }

    /// Start of the current hold window.
    pub fn hold_start(&self) -> Option<Timestamp> {
        self.last_unlock_at
            .or(self.initial_price.map(|p| p.timestamp))
    }

    pub fn released_total(&self) -> Result<Amount> {
        math::sum(self.releases.iter().map(|r| r.amount))
    }

    /// TAI the controller must keep: locked supply plus unsold sale inventory.
    pub fn obligations(&self) -> Result<Amount> {
        let inventory = match &self.sale {
            Some(sale) if !sale.remainder_refunded => sale.unsold(),
            _ => 0,
        };
        math::add(self.remaining_locked, inventory)
    }

    pub fn purchased_by(&self, beneficiary: &Address) -> Amount {
        self.sale
            .as_ref()
            .and_then(|s| s.purchased.get(beneficiary).copied())
            .unwrap_or(0)
    }
}
