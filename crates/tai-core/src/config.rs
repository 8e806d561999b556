//! Policy configuration for the TAI actors.
//!
//! Addresses (admins, treasuries, peer contracts) are deployment facts owned by each actor's
//! state; this module only carries the numeric policy every actor is parameterized by.
//!
//! # Configuration Sources
//!
//! - Environment variables (prefixed with `TAI_`)
//! - JSON files (loaded by the CLI)
//! - Programmatic defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use tai_core::config::TaiConfig;
//!
//! let config = TaiConfig::builder()
//!     .min_stake_amount(5_000)
//!     .max_fee_bps(500)
//!     .build()?;
//! ```

use crate::types::{Amount, BPS_U16, SECONDS_PER_DAY};
use crate::{Result, TaiError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number of unlock rounds in the locked-supply schedule.
pub const UNLOCK_ROUNDS: u8 = 19;

/// Complete TAI configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaiConfig {
    pub oracle: OracleConfig,
    pub unlock: UnlockConfig,
    pub staking: StakingConfig,
    pub market: MarketConfig,
    pub supply: SupplyConfig,
    pub vesting: VestingConfig,
    pub bus: BusConfig,
    pub logging: LoggingConfig,
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| TaiError::Config(format!("Invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl TaiConfig {
    /// Create a new configuration builder.
    pub fn builder() -> TaiConfigBuilder {
        TaiConfigBuilder::default()
    }

    /// Load configuration from environment variables on top of the defaults.
    ///
    /// Recognized variables:
    /// - `TAI_MIN_STAKE_AMOUNT`
    /// - `TAI_MIN_CREATOR_STAKE`
    /// - `TAI_MAX_FEE_BPS`
    /// - `TAI_MIN_BET_AMOUNT`
    /// - `TAI_MAX_ENTRIES_PER_MESSAGE`
    /// - `TAI_UNLOCK_HOLD_SECONDS`
    /// - `TAI_UNLOCK_INFLATION_BPS`
    /// - `TAI_UNLOCK_TOTAL_LOCKED`
    /// - `TAI_ORACLE_REJECT_OUTLIERS`
    /// - `TAI_ORACLE_MAX_HISTORY_DAYS`
    /// - `TAI_BUS_MAX_STEPS`
    /// - `TAI_LOG_LEVEL`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse("TAI_MIN_STAKE_AMOUNT")? {
            config.staking.min_stake_amount = v;
        }
        if let Some(v) = env_parse("TAI_MIN_CREATOR_STAKE")? {
            config.market.min_creator_stake = v;
        }
        if let Some(v) = env_parse("TAI_MAX_FEE_BPS")? {
            config.market.max_fee_bps = v;
        }
        if let Some(v) = env_parse("TAI_MIN_BET_AMOUNT")? {
            config.market.min_bet_amount = v;
        }
        if let Some(v) = env_parse("TAI_MAX_ENTRIES_PER_MESSAGE")? {
            config.market.max_entries_per_message = v;
        }
        if let Some(v) = env_parse("TAI_UNLOCK_HOLD_SECONDS")? {
            config.unlock.min_hold_seconds = v;
        }
        if let Some(v) = env_parse("TAI_UNLOCK_INFLATION_BPS")? {
            config.unlock.min_inflation_bps = v;
        }
        if let Some(v) = env_parse("TAI_UNLOCK_TOTAL_LOCKED")? {
            config.unlock.total_locked = v;
        }
        if let Some(v) = env_parse("TAI_ORACLE_REJECT_OUTLIERS")? {
            config.oracle.reject_outliers = v;
        }
        if let Some(v) = env_parse("TAI_ORACLE_MAX_HISTORY_DAYS")? {
            config.oracle.max_history_days = v;
        }
        if let Some(v) = env_parse("TAI_BUS_MAX_STEPS")? {
            config.bus.max_steps = v;
        }
        if let Ok(level) = std::env::var("TAI_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing sections and fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TaiConfig = serde_json::from_str(json)
            .map_err(|e| TaiError::Config(format!("invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        fn bps(name: &str, v: u16) -> Result<()> {
            if v > BPS_U16 {
                return Err(TaiError::Config(format!("{name} must be <= {BPS_U16}")));
            }
            Ok(())
        }

        // Oracle
        bps("oracle.max_deviation_bps", self.oracle.max_deviation_bps)?;
        if self.oracle.max_history_days == 0 {
            return Err(TaiError::Config("oracle.max_history_days must be > 0".into()));
        }
        if self.oracle.max_batch_entries == 0 {
            return Err(TaiError::Config("oracle.max_batch_entries must be > 0".into()));
        }

        // Unlock
        if self.unlock.rounds == 0 {
            return Err(TaiError::Config("unlock.rounds must be > 0".into()));
        }
        if self.unlock.total_locked < self.unlock.rounds as Amount {
            return Err(TaiError::Config(
                "unlock.total_locked must cover at least one unit per round".into(),
            ));
        }
        bps("unlock.buyback_drop_bps", self.unlock.buyback_drop_bps)?;
        if self.unlock.buyback_drop_bps == 0 {
            return Err(TaiError::Config("unlock.buyback_drop_bps must be > 0".into()));
        }

        // Staking
        bps("staking.quota_amount_ratio_bps", self.staking.quota_amount_ratio_bps)?;
        bps("staking.quota_days_ratio_bps", self.staking.quota_days_ratio_bps)?;
        bps("staking.quota_cap_ratio_bps", self.staking.quota_cap_ratio_bps)?;
        if self.staking.min_stake_amount == 0 {
            return Err(TaiError::Config("staking.min_stake_amount must be > 0".into()));
        }

        // Market
        bps("market.max_fee_bps", self.market.max_fee_bps)?;
        bps("market.reward_bps", self.market.reward_bps)?;
        if self.market.max_fee_bps as u32 + self.market.reward_bps as u32 > BPS_U16 as u32 {
            return Err(TaiError::Config(
                "market.max_fee_bps + market.reward_bps must be <= 10000".into(),
            ));
        }
        if self.market.max_entries_per_message == 0 || self.market.max_entries_per_message > 255 {
            return Err(TaiError::Config(
                "market.max_entries_per_message must be between 1 and 255".into(),
            ));
        }
        if self.market.min_bet_amount == 0 {
            return Err(TaiError::Config("market.min_bet_amount must be > 0".into()));
        }
        if self.market.points_divisor == 0 {
            return Err(TaiError::Config("market.points_divisor must be > 0".into()));
        }

        // Supply / vesting
        if self.supply.locked_supply > self.supply.total_supply {
            return Err(TaiError::Config(
                "supply.locked_supply must not exceed supply.total_supply".into(),
            ));
        }
        if self.vesting.max_rounds == 0 {
            return Err(TaiError::Config("vesting.max_rounds must be > 0".into()));
        }

        if self.bus.max_steps == 0 {
            return Err(TaiError::Config("bus.max_steps must be > 0".into()));
        }

        Ok(())
    }
}

/// Price oracle policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Samples deviating more than this from the running mean are ignored by `average`.
    pub max_deviation_bps: u16,

    /// Oldest day entries are evicted beyond this many stored days.
    pub max_history_days: usize,

    /// Reject pushes deviating from the recent average by more than `max_deviation_bps`.
    pub reject_outliers: bool,

    pub max_batch_entries: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_deviation_bps: 3_000,
            max_history_days: 365,
            reject_outliers: false,
            max_batch_entries: 64,
        }
    }
}

/// Locked-supply unlock schedule and whitelist sale policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockConfig {
    pub rounds: u8,
    pub total_locked: Amount,

    /// Minimum price rise versus the previous round, in bps.
    pub min_inflation_bps: u32,

    /// Minimum time between two unlocks (or since the initial price).
    pub min_hold_seconds: u64,

    /// Minimum price drop that arms the emergency buyback.
    pub buyback_drop_bps: u16,

    /// Delay after the whitelist window before unsold inventory may be returned.
    pub public_sale_grace_seconds: u64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            rounds: UNLOCK_ROUNDS,
            total_locked: 19_000_000_000,
            min_inflation_bps: 1_000,
            min_hold_seconds: 30 * SECONDS_PER_DAY,
            buyback_drop_bps: 2_000,
            public_sale_grace_seconds: 7 * SECONDS_PER_DAY,
        }
    }
}

/// Juror staking policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    pub min_stake_amount: Amount,
    pub quota_amount_ratio_bps: u16,
    pub quota_days_ratio_bps: u16,
    pub quota_cap_ratio_bps: u16,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            min_stake_amount: 1_000,
            quota_amount_ratio_bps: 10_000,
            quota_days_ratio_bps: 100,
            quota_cap_ratio_bps: 1_000,
        }
    }
}

/// Prediction market policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub min_creator_stake: Amount,
    pub max_fee_bps: u16,
    pub min_bet_amount: Amount,

    /// Share of the losing pool reserved for juror rewards.
    pub reward_bps: u16,

    /// Upper bound on entries per reward/slash message.
    pub max_entries_per_message: usize,

    pub max_metadata_len: usize,

    /// Participation points granted per bet = amount / points_divisor.
    pub points_divisor: Amount,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            min_creator_stake: 1_000,
            max_fee_bps: 1_000,
            min_bet_amount: 100,
            reward_bps: 100,
            max_entries_per_message: 32,
            max_metadata_len: 256,
            points_divisor: 100,
        }
    }
}

/// Fixed supply ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    pub total_supply: Amount,

    /// Amount handed to the vesting contract on its one-time request.
    pub locked_supply: Amount,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            total_supply: 100_000_000_000,
            locked_supply: 19_000_000_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VestingConfig {
    pub max_rounds: u8,
}

impl Default for VestingConfig {
    fn default() -> Self {
        Self {
            max_rounds: UNLOCK_ROUNDS,
        }
    }
}

/// Actor runtime configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Hard cap on deliveries per `run_until_idle` call.
    pub max_steps: usize,

    /// Logical clock at bus creation (unix seconds).
    pub start_time: u64,

    /// Keep the per-message delivery log.
    pub record_log: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            start_time: 1_700_000_000,
            record_log: true,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Emit one JSON object per log line.
    pub json_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json_output: false,
        }
    }
}

/// Builder for TaiConfig.
#[derive(Default)]
pub struct TaiConfigBuilder {
    config: TaiConfig,
}

impl TaiConfigBuilder {
    pub fn min_stake_amount(mut self, amount: Amount) -> Self {
        self.config.staking.min_stake_amount = amount;
        self
    }

    pub fn min_creator_stake(mut self, amount: Amount) -> Self {
        self.config.market.min_creator_stake = amount;
        self
    }

    pub fn max_fee_bps(mut self, bps: u16) -> Self {
        self.config.market.max_fee_bps = bps;
        self
    }

    pub fn reward_bps(mut self, bps: u16) -> Self {
        self.config.market.reward_bps = bps;
        self
    }

    pub fn min_bet_amount(mut self, amount: Amount) -> Self {
        self.config.market.min_bet_amount = amount;
        self
    }

    pub fn max_entries_per_message(mut self, n: usize) -> Self {
        self.config.market.max_entries_per_message = n;
        self
    }

    pub fn unlock_total_locked(mut self, amount: Amount) -> Self {
        self.config.unlock.total_locked = amount;
        self
    }

    pub fn unlock_rounds(mut self, rounds: u8) -> Self {
        self.config.unlock.rounds = rounds;
        self
    }

    pub fn min_inflation_bps(mut self, bps: u32) -> Self {
        self.config.unlock.min_inflation_bps = bps;
        self
    }

    pub fn min_hold_seconds(mut self, secs: u64) -> Self {
        self.config.unlock.min_hold_seconds = secs;
        self
    }

    pub fn reject_outliers(mut self, enabled: bool) -> Self {
        self.config.oracle.reject_outliers = enabled;
        self
    }

    pub fn max_history_days(mut self, days: usize) -> Self {
        self.config.oracle.max_history_days = days;
        self
    }

    pub fn supply(mut self, total: Amount, locked: Amount) -> Self {
        self.config.supply.total_supply = total;
        self.config.supply.locked_supply = locked;
        self
    }

    pub fn max_steps(mut self, steps: usize) -> Self {
        self.config.bus.max_steps = steps;
        self
    }

    pub fn start_time(mut self, ts: u64) -> Self {
        self.config.bus.start_time = ts;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<TaiConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
