//! TAI token economy core.
//!
//! Every contract in this crate is an independently addressed actor. Actors share no memory;
//! they exchange opcode-prefixed byte messages through the [`bus::Bus`], which models an
//! asynchronous ledger: messages may be delivered, bounced back to the sender, dropped, or
//! duplicated. Each contract handler is a pure transition `(state, message) -> (state, effects)`
//! so a rejected message never leaves a partial mutation behind.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod bus;
pub mod config;
pub mod contracts;
pub mod hash;
pub mod math;
pub mod merkle;
pub mod system;
pub mod types;
pub mod wire;

pub use bus::{Actor, Bus, Delivery, MessageId, MsgContext, Outbound};
pub use config::TaiConfig;
pub use system::{AnyCommand, Deployment};
pub use types::{Amount, Bps, Entry, Price, Side, Timestamp, PRICE_SCALE, SECONDS_PER_DAY};
pub use wire::WireError;

/// 32-byte hash newtype used for account ids, merkle nodes and roots.
///
/// Serialized as a 64-char hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| TaiError::Config(format!("invalid hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(TaiError::Config(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Hash32(out))
    }
}

impl Serialize for Hash32 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Account address: workchain id plus 32-byte account hash.
///
/// Textual form is `<workchain>:<64 hex chars>`, e.g. `0:ab12...`. Parsing also accepts
/// `@label` as shorthand for [`Address::from_label`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub workchain: i8,
    pub hash: Hash32,
}

impl Address {
    pub const BASECHAIN: i8 = 0;

    pub fn new(workchain: i8, hash: Hash32) -> Self {
        Self { workchain, hash }
    }

    /// Deterministic basechain address derived from a human label (tests, scenarios, CLI).
    pub fn from_label(label: &str) -> Self {
        Self {
            workchain: Self::BASECHAIN,
            hash: hash::sha256_domain(hash::ADDRESS_LABEL_DOMAIN_V1, label.as_bytes()),
        }
    }

    /// Short form for logs: first 8 hex chars of the hash.
    pub fn short(&self) -> String {
        format!("{}:{}", self.workchain, &self.hash.to_hex()[..8])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workchain, self.hash.to_hex())
    }
}

impl FromStr for Address {
    type Err = TaiError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(label) = s.strip_prefix('@') {
            return Ok(Self::from_label(label));
        }
        let (wc, h) = s
            .split_once(':')
            .ok_or_else(|| TaiError::Config(format!("address missing workchain: {s}")))?;
        let workchain = wc
            .parse::<i8>()
            .map_err(|e| TaiError::Config(format!("invalid workchain {wc}: {e}")))?;
        Ok(Self {
            workchain,
            hash: Hash32::from_hex(h)?,
        })
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Value attached to a message or held by an account.
///
/// `tai` is the economy token (stakes, bets, unlocks, rewards); `native` is the chain coin
/// used to pay for whitelist purchases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funds {
    pub native: Amount,
    pub tai: Amount,
}

impl Funds {
    pub const ZERO: Funds = Funds { native: 0, tai: 0 };

    pub fn tai(amount: Amount) -> Self {
        Self { native: 0, tai: amount }
    }

    pub fn native(amount: Amount) -> Self {
        Self { native: amount, tai: 0 }
    }

    pub fn is_zero(&self) -> bool {
        self.native == 0 && self.tai == 0
    }

    /// True when `self` holds at least `other` in both assets.
    pub fn covers(&self, other: &Funds) -> bool {
        self.native >= other.native && self.tai >= other.tai
    }

    pub fn checked_add(self, other: Funds) -> Result<Funds> {
        Ok(Funds {
            native: math::add(self.native, other.native)?,
            tai: math::add(self.tai, other.tai)?,
        })
    }

    pub fn checked_sub(self, other: Funds) -> Result<Funds> {
        if !self.covers(&other) {
            return Err(TaiError::Rejected(ErrorCode::InsufficientBalance));
        }
        Ok(Funds {
            native: self.native - other.native,
            tai: self.tai - other.tai,
        })
    }
}

/// Classification of rejection codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong sender for an admin- or trusted-contract-only operation.
    AccessControl,
    /// Operation attempted in the wrong lifecycle state.
    StateMachine,
    /// Amount or ratio outside policy.
    BusinessRule,
    /// Nothing to act on.
    ResourceExhaustion,
    /// Malformed message or runtime fault.
    Protocol,
}

/// Stable numeric rejection codes carried by bounces.
///
/// Codes are grouped by hundreds according to [`ErrorKind`] and never renumbered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    NotAdmin = 101,
    NotPrediction = 102,
    NotCreator = 103,
    NotOwner = 104,
    NotStaking = 105,
    NotMaster = 106,
    NotVesting = 107,

    MarketNotOpen = 201,
    AlreadyLocked = 202,
    SaleClosed = 203,
    PriceAlreadySet = 204,
    MarketClosed = 205,
    MarketNotLocked = 206,
    NotDone = 207,
    AlreadyResolved = 208,
    UnlockPaused = 209,
    AllUnlocked = 210,
    PriceNotSet = 211,
    SaleActive = 212,
    RoundMismatch = 213,
    NoPendingPrice = 214,
    AlreadyFunded = 215,
    NotFunded = 216,
    HandoffDone = 217,
    RoundNotConfigured = 218,
    PreviousRoundLocked = 219,
    RoundReleased = 220,
    SaleNotEnded = 221,
    RemainderRefunded = 222,
    MarketNotFound = 223,
    Emergency = 224,
    Suspended = 225,
    MarketNotResolved = 226,

    StakeTooSmall = 301,
    BetTooSmall = 302,
    QuotaExceeded = 303,
    InflationNotMet = 304,
    NonMonotonic = 305,
    BadPrice = 306,
    HoldNotMet = 307,
    WlSoldOut = 308,
    StakeTooLow = 309,
    FeeTooHigh = 310,
    InvalidSide = 311,
    InvalidClose = 312,
    InsufficientStake = 313,
    BadProof = 314,
    InsufficientPayment = 315,
    PriceDeviation = 316,
    DropNotMet = 317,
    PenaltyTooHigh = 318,
    RewardExceedsPool = 319,
    InvalidAmount = 320,
    InsufficientValue = 321,
    PriceNotIncreasing = 322,
    PriceTargetNotMet = 323,
    InvalidRound = 324,
    InsufficientInventory = 325,
    TooManyEntries = 326,
    MetadataTooLong = 327,
    SaleExpired = 328,

    NoReward = 401,
    NothingToClaim = 402,
    NoStake = 403,
    NoFees = 404,
    InsufficientBalance = 405,
    NoPriceData = 406,
    NothingToRetry = 407,

    InvalidMessage = 501,
    UnknownOpcode = 502,
    Overflow = 503,
    InvariantViolation = 504,
    UnknownActor = 505,
    ConfigError = 506,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn kind(self) -> ErrorKind {
        match self.code() / 100 {
            1 => ErrorKind::AccessControl,
            2 => ErrorKind::StateMachine,
            3 => ErrorKind::BusinessRule,
            4 => ErrorKind::ResourceExhaustion,
            _ => ErrorKind::Protocol,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotAdmin => "NOT_ADMIN",
            ErrorCode::NotPrediction => "NOT_PREDICTION",
            ErrorCode::NotCreator => "NOT_CREATOR",
            ErrorCode::NotOwner => "NOT_OWNER",
            ErrorCode::NotStaking => "NOT_STAKING",
            ErrorCode::NotMaster => "NOT_MASTER",
            ErrorCode::NotVesting => "NOT_VESTING",
            ErrorCode::MarketNotOpen => "MARKET_NOT_OPEN",
            ErrorCode::AlreadyLocked => "ALREADY_LOCKED",
            ErrorCode::SaleClosed => "SALE_CLOSED",
            ErrorCode::PriceAlreadySet => "PRICE_ALREADY_SET",
            ErrorCode::MarketClosed => "MARKET_CLOSED",
            ErrorCode::MarketNotLocked => "MARKET_NOT_LOCKED",
            ErrorCode::NotDone => "NOT_DONE",
            ErrorCode::AlreadyResolved => "ALREADY_RESOLVED",
            ErrorCode::UnlockPaused => "UNLOCK_PAUSED",
            ErrorCode::AllUnlocked => "ALL_UNLOCKED",
            ErrorCode::PriceNotSet => "PRICE_NOT_SET",
            ErrorCode::SaleActive => "SALE_ACTIVE",
            ErrorCode::RoundMismatch => "ROUND_MISMATCH",
            ErrorCode::NoPendingPrice => "NO_PENDING_PRICE",
            ErrorCode::AlreadyFunded => "ALREADY_FUNDED",
            ErrorCode::NotFunded => "NOT_FUNDED",
            ErrorCode::HandoffDone => "HANDOFF_DONE",
            ErrorCode::RoundNotConfigured => "ROUND_NOT_CONFIGURED",
            ErrorCode::PreviousRoundLocked => "PREVIOUS_ROUND_LOCKED",
            ErrorCode::RoundReleased => "ROUND_RELEASED",
            ErrorCode::SaleNotEnded => "SALE_NOT_ENDED",
            ErrorCode::RemainderRefunded => "REMAINDER_REFUNDED",
            ErrorCode::MarketNotFound => "MARKET_NOT_FOUND",
            ErrorCode::Emergency => "EMERGENCY",
            ErrorCode::Suspended => "SUSPENDED",
            ErrorCode::MarketNotResolved => "MARKET_NOT_RESOLVED",
            ErrorCode::StakeTooSmall => "STAKE_TOO_SMALL",
            ErrorCode::BetTooSmall => "BET_TOO_SMALL",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::InflationNotMet => "INFLATION_NOT_MET",
            ErrorCode::NonMonotonic => "NON_MONOTONIC",
            ErrorCode::BadPrice => "BAD_PRICE",
            ErrorCode::HoldNotMet => "HOLD_NOT_MET",
            ErrorCode::WlSoldOut => "WL_SOLD_OUT",
            ErrorCode::StakeTooLow => "STAKE_TOO_LOW",
            ErrorCode::FeeTooHigh => "FEE_TOO_HIGH",
            ErrorCode::InvalidSide => "INVALID_SIDE",
            ErrorCode::InvalidClose => "INVALID_CLOSE",
            ErrorCode::InsufficientStake => "INSUFFICIENT_STAKE",
            ErrorCode::BadProof => "BAD_PROOF",
            ErrorCode::InsufficientPayment => "INSUFFICIENT_PAYMENT",
            ErrorCode::PriceDeviation => "PRICE_DEVIATION",
            ErrorCode::DropNotMet => "DROP_NOT_MET",
            ErrorCode::PenaltyTooHigh => "PENALTY_TOO_HIGH",
            ErrorCode::RewardExceedsPool => "REWARD_EXCEEDS_POOL",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::InsufficientValue => "INSUFFICIENT_VALUE",
            ErrorCode::PriceNotIncreasing => "PRICE_NOT_INCREASING",
            ErrorCode::PriceTargetNotMet => "PRICE_TARGET_NOT_MET",
            ErrorCode::InvalidRound => "INVALID_ROUND",
            ErrorCode::InsufficientInventory => "INSUFFICIENT_INVENTORY",
            ErrorCode::TooManyEntries => "TOO_MANY_ENTRIES",
            ErrorCode::MetadataTooLong => "METADATA_TOO_LONG",
            ErrorCode::SaleExpired => "SALE_EXPIRED",
            ErrorCode::NoReward => "NO_REWARD",
            ErrorCode::NothingToClaim => "NOTHING_TO_CLAIM",
            ErrorCode::NoStake => "NO_STAKE",
            ErrorCode::NoFees => "NO_FEES",
            ErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorCode::NoPriceData => "NO_PRICE_DATA",
            ErrorCode::NothingToRetry => "NOTHING_TO_RETRY",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::UnknownOpcode => "UNKNOWN_OPCODE",
            ErrorCode::Overflow => "OVERFLOW",
            ErrorCode::InvariantViolation => "INVARIANT_VIOLATION",
            ErrorCode::UnknownActor => "UNKNOWN_ACTOR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
        }
    }

    /// Every code, in numeric order.
    pub const ALL: [ErrorCode; 74] = [
        ErrorCode::NotAdmin,
        ErrorCode::NotPrediction,
        ErrorCode::NotCreator,
        ErrorCode::NotOwner,
        ErrorCode::NotStaking,
        ErrorCode::NotMaster,
        ErrorCode::NotVesting,
        ErrorCode::MarketNotOpen,
        ErrorCode::AlreadyLocked,
        ErrorCode::SaleClosed,
        ErrorCode::PriceAlreadySet,
        ErrorCode::MarketClosed,
        ErrorCode::MarketNotLocked,
        ErrorCode::NotDone,
        ErrorCode::AlreadyResolved,
        ErrorCode::UnlockPaused,
        ErrorCode::AllUnlocked,
        ErrorCode::PriceNotSet,
        ErrorCode::SaleActive,
        ErrorCode::RoundMismatch,
        ErrorCode::NoPendingPrice,
        ErrorCode::AlreadyFunded,
        ErrorCode::NotFunded,
        ErrorCode::HandoffDone,
        ErrorCode::RoundNotConfigured,
        ErrorCode::PreviousRoundLocked,
        ErrorCode::RoundReleased,
        ErrorCode::SaleNotEnded,
        ErrorCode::RemainderRefunded,
        ErrorCode::MarketNotFound,
        ErrorCode::Emergency,
        ErrorCode::Suspended,
        ErrorCode::MarketNotResolved,
        ErrorCode::StakeTooSmall,
        ErrorCode::BetTooSmall,
        ErrorCode::QuotaExceeded,
        ErrorCode::InflationNotMet,
        ErrorCode::NonMonotonic,
        ErrorCode::BadPrice,
        ErrorCode::HoldNotMet,
        ErrorCode::WlSoldOut,
        ErrorCode::StakeTooLow,
        ErrorCode::FeeTooHigh,
        ErrorCode::InvalidSide,
        ErrorCode::InvalidClose,
        ErrorCode::InsufficientStake,
        ErrorCode::BadProof,
        ErrorCode::InsufficientPayment,
        ErrorCode::PriceDeviation,
        ErrorCode::DropNotMet,
        ErrorCode::PenaltyTooHigh,
        ErrorCode::RewardExceedsPool,
        ErrorCode::InvalidAmount,
        ErrorCode::InsufficientValue,
        ErrorCode::PriceNotIncreasing,
        ErrorCode::PriceTargetNotMet,
        ErrorCode::InvalidRound,
        ErrorCode::InsufficientInventory,
        ErrorCode::TooManyEntries,
        ErrorCode::MetadataTooLong,
        ErrorCode::SaleExpired,
        ErrorCode::NoReward,
        ErrorCode::NothingToClaim,
        ErrorCode::NoStake,
        ErrorCode::NoFees,
        ErrorCode::InsufficientBalance,
        ErrorCode::NoPriceData,
        ErrorCode::NothingToRetry,
        ErrorCode::InvalidMessage,
        ErrorCode::UnknownOpcode,
        ErrorCode::Overflow,
        ErrorCode::InvariantViolation,
        ErrorCode::UnknownActor,
        ErrorCode::ConfigError,
    ];

    pub fn from_u16(code: u16) -> Option<ErrorCode> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// Unified error type for the TAI core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaiError {
    /// A contract refused the message; storage is unchanged.
    #[error("rejected: {0}")]
    Rejected(ErrorCode),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),

    #[error("unknown actor: {0}")]
    UnknownActor(Address),
}

impl TaiError {
    /// Numeric code surfaced to the sender through a bounce.
    pub fn code(&self) -> ErrorCode {
        match self {
            TaiError::Rejected(code) => *code,
            TaiError::Wire(WireError::UnknownOpcode(_)) => ErrorCode::UnknownOpcode,
            TaiError::Wire(_) => ErrorCode::InvalidMessage,
            TaiError::Config(_) => ErrorCode::ConfigError,
            TaiError::Overflow(_) => ErrorCode::Overflow,
            TaiError::InvariantViolation(_) => ErrorCode::InvariantViolation,
            TaiError::UnknownActor(_) => ErrorCode::UnknownActor,
        }
    }
}

impl From<ErrorCode> for TaiError {
    fn from(code: ErrorCode) -> Self {
        TaiError::Rejected(code)
    }
}

pub type Result<T> = std::result::Result<T, TaiError>;

/// Shorthand used by contract guards: `ensure(cond, ErrorCode::X)?`.
pub fn ensure(cond: bool, code: ErrorCode) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(TaiError::Rejected(code))
    }
}
