use crate::{Address, ErrorCode, Result, TaiError};
use serde::{Deserialize, Serialize};

pub const BPS_U16: u16 = 10_000;
pub const BPS_U128: u128 = 10_000;

/// Token amounts in the smallest unit.
pub type Amount = u128;

/// Prices are fixed-point with [`PRICE_SCALE`] units per whole quote coin.
pub type Price = u128;

/// Unix seconds.
pub type Timestamp = u64;

pub const PRICE_SCALE: Price = 1_000_000_000;
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Basis points in `[0, 10_000]` (correct-by-construction).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Bps(u16);

impl Bps {
    pub const ZERO: Bps = Bps(0);
    pub const MAX: Bps = Bps(BPS_U16);

    pub fn new(v: u16) -> Result<Bps> {
        if v <= BPS_U16 {
            Ok(Bps(v))
        } else {
            Err(TaiError::Config(format!("bps out of range: {v} > {BPS_U16}")))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn as_u128(self) -> u128 {
        self.0 as u128
    }
}

impl TryFrom<u16> for Bps {
    type Error = TaiError;
    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        Bps::new(value)
    }
}

impl From<Bps> for u16 {
    fn from(b: Bps) -> u16 {
        b.0
    }
}

/// Binary market side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    Yes = 1,
    No = 2,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl TryFrom<u8> for Side {
    type Error = TaiError;
    fn try_from(v: u8) -> std::result::Result<Self, Self::Error> {
        match v {
            1 => Ok(Side::Yes),
            2 => Ok(Side::No),
            _ => Err(TaiError::Rejected(ErrorCode::InvalidSide)),
        }
    }
}

/// One `(address, amount)` element of a payout or slash list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub address: Address,
    pub amount: Amount,
}

impl Entry {
    pub fn new(address: Address, amount: Amount) -> Self {
        Self { address, amount }
    }
}

pub fn day_index(ts: Timestamp) -> u64 {
    ts / SECONDS_PER_DAY
}
