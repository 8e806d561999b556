//! Message body codec.
//!
//! Every inbound body starts with a 32-bit big-endian opcode followed by the message fields:
//! - integers are fixed-width big-endian (amounts are 16 bytes)
//! - addresses are `workchain: i8` followed by the 32-byte account hash
//! - optional values carry a presence byte
//! - `(address, amount)` lists are cons-cell chains: `1, entry, 1, entry, ..., 0`
//!
//! An empty body is a plain value transfer (top-ups, change). A bounce carries
//! [`BOUNCE_OPCODE`], the 16-bit rejection code, then the original body verbatim.

use crate::types::{Amount, Entry};
use crate::{Address, Hash32};
use std::collections::HashSet;
use thiserror::Error;

/// Reserved opcode prefixing bounced bodies.
pub const BOUNCE_OPCODE: u32 = 0xFFFF_FFFF;

/// Opcode of [`Payout`] bodies sent to wallets.
pub const PAYOUT_OPCODE: u32 = 0x5441_0001;

/// Upper bound on cons-cell chain length accepted by the decoder.
pub const MAX_CHAIN_LEN: usize = 1_024;

/// Upper bound on length-prefixed byte strings.
pub const MAX_BYTES_LEN: usize = 4_096;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("input too short")]
    TooShort,
    #[error("trailing bytes after message: {0}")]
    TrailingBytes(usize),
    #[error("unknown opcode: {0:#010x}")]
    UnknownOpcode(u32),
    #[error("invalid presence/bool byte: {0}")]
    InvalidFlag(u8),
    #[error("invalid enum tag {tag} for {field}")]
    InvalidTag { field: &'static str, tag: u8 },
    #[error("chain too long")]
    ChainTooLong,
    #[error("byte string too long: {0}")]
    BytesTooLong(usize),
    #[error("invalid utf-8 in text field")]
    InvalidUtf8,
    #[error("opcode {0:#010x} registered twice")]
    OpcodeCollision(u32),
    #[error("opcode {0:#010x} is reserved")]
    ReservedOpcode(u32),
}

/// Big-endian field writer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new(opcode: u32) -> Self {
        let mut w = Self { buf: Vec::with_capacity(64) };
        w.u32(opcode);
        w
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(v as u8)
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn amount(&mut self, v: Amount) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    pub fn hash(&mut self, h: &Hash32) -> &mut Self {
        self.buf.extend_from_slice(&h.0);
        self
    }

    pub fn address(&mut self, a: &Address) -> &mut Self {
        self.buf.push(a.workchain as u8);
        self.hash(&a.hash)
    }

    pub fn maybe_address(&mut self, a: Option<&Address>) -> &mut Self {
        match a {
            Some(a) => {
                self.u8(1);
                self.address(a)
            }
            None => self.u8(0),
        }
    }

    /// Length-prefixed (u16) byte string.
    pub fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.u16(b.len() as u16);
        self.buf.extend_from_slice(b);
        self
    }

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.bytes(s.as_bytes())
    }

    pub fn hashes(&mut self, hs: &[Hash32]) -> &mut Self {
        self.u8(hs.len() as u8);
        for h in hs {
            self.hash(h);
        }
        self
    }

    /// Cons-cell chain of `(address, amount)` entries.
    pub fn entries(&mut self, entries: &[Entry]) -> &mut Self {
        for e in entries {
            self.u8(1);
            self.address(&e.address);
            self.amount(e.amount);
        }
        self.u8(0)
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Big-endian field reader over a borrowed body.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        let end = self.pos.checked_add(n).ok_or(WireError::TooShort)?;
        if end > self.input.len() {
            return Err(WireError::TooShort);
        }
        let out = &self.input[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    pub fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, WireError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidFlag(other)),
        }
    }

    pub fn u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    pub fn amount(&mut self) -> Result<Amount, WireError> {
        Ok(u128::from_be_bytes(self.array()?))
    }

    pub fn hash(&mut self) -> Result<Hash32, WireError> {
        Ok(Hash32(self.array()?))
    }

    pub fn address(&mut self) -> Result<Address, WireError> {
        let workchain = self.u8()? as i8;
        Ok(Address::new(workchain, self.hash()?))
    }

    pub fn maybe_address(&mut self) -> Result<Option<Address>, WireError> {
        if self.bool()? {
            Ok(Some(self.address()?))
        } else {
            Ok(None)
        }
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.u16()? as usize;
        if len > MAX_BYTES_LEN {
            return Err(WireError::BytesTooLong(len));
        }
        self.take(len)
    }

    pub fn text(&mut self) -> Result<String, WireError> {
        let raw = self.bytes()?;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    pub fn hashes(&mut self) -> Result<Vec<Hash32>, WireError> {
        let n = self.u8()? as usize;
        (0..n).map(|_| self.hash()).collect()
    }

    pub fn entries(&mut self) -> Result<Vec<Entry>, WireError> {
        let mut out = Vec::new();
        while self.bool()? {
            if out.len() == MAX_CHAIN_LEN {
                return Err(WireError::ChainTooLong);
            }
            let address = self.address()?;
            let amount = self.amount()?;
            out.push(Entry { address, amount });
        }
        Ok(out)
    }

    /// Require that the whole body was consumed.
    pub fn finish(self) -> Result<(), WireError> {
        let rest = self.input.len() - self.pos;
        if rest != 0 {
            return Err(WireError::TrailingBytes(rest));
        }
        Ok(())
    }
}

/// A typed message with a fixed opcode per variant.
pub trait WireMessage: Sized {
    /// Every opcode this type can decode.
    const OPCODES: &'static [u32];

    fn opcode(&self) -> u32;

    /// Write fields after the opcode.
    fn encode_fields(&self, w: &mut Writer);

    /// Read fields after the opcode.
    fn decode_fields(opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError>;

    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new(self.opcode());
        self.encode_fields(&mut w);
        w.finish()
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        let opcode = r.u32()?;
        if !Self::OPCODES.contains(&opcode) {
            return Err(WireError::UnknownOpcode(opcode));
        }
        let msg = Self::decode_fields(opcode, &mut r)?;
        r.finish()?;
        Ok(msg)
    }
}

/// Leading opcode of a non-empty body.
pub fn peek_opcode(body: &[u8]) -> Option<u32> {
    let head: [u8; 4] = body.get(..4)?.try_into().ok()?;
    Some(u32::from_be_bytes(head))
}

/// Reject duplicate or reserved opcodes across the sets a single receiver accepts.
pub fn check_opcode_set(sets: &[&[u32]]) -> Result<(), WireError> {
    let mut seen = HashSet::new();
    for op in sets.iter().flat_map(|s| s.iter().copied()) {
        if op == 0 || op == BOUNCE_OPCODE {
            return Err(WireError::ReservedOpcode(op));
        }
        if !seen.insert(op) {
            return Err(WireError::OpcodeCollision(op));
        }
    }
    Ok(())
}

pub fn encode_bounce(code: u16, original: &[u8]) -> Vec<u8> {
    let mut w = Writer::new(BOUNCE_OPCODE);
    w.u16(code);
    let mut out = w.finish();
    out.extend_from_slice(original);
    out
}

/// Split a bounce body into `(code, original_body)`.
pub fn parse_bounce(body: &[u8]) -> Option<(u16, &[u8])> {
    if peek_opcode(body)? != BOUNCE_OPCODE || body.len() < 6 {
        return None;
    }
    Some((u16::from_be_bytes([body[4], body[5]]), &body[6..]))
}

/// Why value was sent to a wallet. Carried back verbatim in a bounce so the sender can
/// undo the bookkeeping that accompanied it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutReason {
    Winnings { market_id: u64 },
    BetRefund { market_id: u64 },
    CreatorStake { market_id: u64 },
    PlatformFees,
    StakingReward,
    Unstake { amount: Amount },
    SlashedSweep,
    UnlockRound { round: u8 },
    /// Sale delivery to the beneficiary; `payer` is refunded `cost` if it bounces.
    WhitelistPurchase { payer: Address, cost: Amount },
    SaleProceeds,
    SaleRemainder,
    Buyback,
    Distribution,
    VestingRelease { round: u8 },
}

impl PayoutReason {
    fn tag(&self) -> u8 {
        match self {
            PayoutReason::Winnings { .. } => 1,
            PayoutReason::BetRefund { .. } => 2,
            PayoutReason::CreatorStake { .. } => 3,
            PayoutReason::PlatformFees => 4,
            PayoutReason::StakingReward => 5,
            PayoutReason::Unstake { .. } => 6,
            PayoutReason::SlashedSweep => 7,
            PayoutReason::UnlockRound { .. } => 8,
            PayoutReason::WhitelistPurchase { .. } => 9,
            PayoutReason::SaleProceeds => 10,
            PayoutReason::SaleRemainder => 11,
            PayoutReason::Buyback => 12,
            PayoutReason::Distribution => 13,
            PayoutReason::VestingRelease { .. } => 14,
        }
    }
}

/// Value transfer to a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub reason: PayoutReason,
}

impl Payout {
    pub fn new(reason: PayoutReason) -> Self {
        Self { reason }
    }
}

impl WireMessage for Payout {
    const OPCODES: &'static [u32] = &[PAYOUT_OPCODE];

    fn opcode(&self) -> u32 {
        PAYOUT_OPCODE
    }

    fn encode_fields(&self, w: &mut Writer) {
        w.u8(self.reason.tag());
        match self.reason {
            PayoutReason::Winnings { market_id }
            | PayoutReason::BetRefund { market_id }
            | PayoutReason::CreatorStake { market_id } => {
                w.u64(market_id);
            }
            PayoutReason::Unstake { amount } => {
                w.amount(amount);
            }
            PayoutReason::UnlockRound { round } | PayoutReason::VestingRelease { round } => {
                w.u8(round);
            }
            PayoutReason::WhitelistPurchase { payer, cost } => {
                w.address(&payer).amount(cost);
            }
            _ => {}
        }
    }

    fn decode_fields(_opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError> {
        let reason = match r.u8()? {
            1 => PayoutReason::Winnings { market_id: r.u64()? },
            2 => PayoutReason::BetRefund { market_id: r.u64()? },
            3 => PayoutReason::CreatorStake { market_id: r.u64()? },
            4 => PayoutReason::PlatformFees,
            5 => PayoutReason::StakingReward,
            6 => PayoutReason::Unstake { amount: r.amount()? },
            7 => PayoutReason::SlashedSweep,
            8 => PayoutReason::UnlockRound { round: r.u8()? },
            9 => PayoutReason::WhitelistPurchase {
                payer: r.address()?,
                cost: r.amount()?,
            },
            10 => PayoutReason::SaleProceeds,
            11 => PayoutReason::SaleRemainder,
            12 => PayoutReason::Buyback,
            13 => PayoutReason::Distribution,
            14 => PayoutReason::VestingRelease { round: r.u8()? },
            tag => return Err(WireError::InvalidTag { field: "payout_reason", tag }),
        };
        Ok(Payout { reason })
    }
}
