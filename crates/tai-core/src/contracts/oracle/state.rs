use crate::config::OracleConfig;
use crate::math;
use crate::types::{day_index, Bps, Price, Timestamp};
use crate::{Address, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub timestamp: Timestamp,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub admin: Address,
    pub config: OracleConfig,
    /// Keyed by day index (`timestamp / 86400`).
    pub prices: BTreeMap<u64, PriceEntry>,
}

impl State {
    pub fn init(admin: Address, config: OracleConfig) -> Self {
        Self {
            admin,
            config,
            prices: BTreeMap::new(),
        }
    }

    pub fn latest(&self) -> Option<PriceEntry> {
        self.prices.values().next_back().copied()
    }

    pub fn latest_timestamp(&self) -> Timestamp {
        self.latest().map_or(0, |e| e.timestamp)
    }

    pub fn price_at(&self, day: u64) -> Option<Price> {
        self.prices.get(&day).map(|e| e.price)
    }

    pub fn price_on(&self, ts: Timestamp) -> Option<Price> {
        self.price_at(day_index(ts))
    }

    /// Outlier-filtered mean over the last `days` stored samples.
    ///
    /// The reference starts at the window median; samples are then walked oldest first and
    /// each one within `max_deviation_bps` of the current reference is folded into a running
    /// mean that becomes the new reference.
    pub fn average(&self, days: usize) -> Result<Option<Price>> {
        if days == 0 || self.prices.is_empty() {
            return Ok(None);
        }
        let window: Vec<Price> = self
            .prices
            .values()
            .rev()
            .take(days)
            .map(|e| e.price)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let mut sorted = window.clone();
        sorted.sort_unstable();
        let median = sorted[sorted.len() / 2];

        let limit = self.config.max_deviation_bps as u128;
        let mut reference = median;
        let mut sum: u128 = 0;
        let mut count: u128 = 0;
        for price in window {
            if math::deviation_bps(price, reference)? > limit {
                continue;
            }
            sum = math::add(sum, price)?;
            count += 1;
            reference = sum / count;
        }
        Ok(Some(if count == 0 { median } else { reference }))
    }

    /// Latest price has risen at least `required_bps` above `last_price`.
    pub fn can_unlock(&self, last_price: Price, required_bps: Bps) -> Result<bool> {
        match self.latest() {
            Some(e) => math::inflation_met(e.price, last_price, required_bps.get() as u32),
            None => Ok(false),
        }
    }
}
