use crate::contracts::staking::SettlementKind;
use crate::types::{Amount, Entry, Timestamp};
use crate::wire::{Reader, WireError, WireMessage, Writer};
use crate::Address;
use serde::{Deserialize, Serialize};

pub const OP_CREATE_MARKET: u32 = 0x5441_0401;
pub const OP_PLACE_BET: u32 = 0x5441_0402;
pub const OP_LOCK_MARKET: u32 = 0x5441_0403;
pub const OP_RESOLVE_MARKET: u32 = 0x5441_0404;
pub const OP_CLAIM_WINNINGS: u32 = 0x5441_0405;
pub const OP_CLAIM_CREATOR_STAKE: u32 = 0x5441_0406;
pub const OP_VOID_MARKET: u32 = 0x5441_0407;
pub const OP_WITHDRAW_FEES: u32 = 0x5441_0408;
pub const OP_RETRY_SETTLEMENT: u32 = 0x5441_0409;
pub const OP_SETTLEMENT_ACK: u32 = 0x5441_040A;
pub const OP_UPDATE_CONFIG: u32 = 0x5441_040B;
pub const OP_TRANSFER_ADMIN: u32 = 0x5441_040C;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Attach at least `creator_stake` TAI.
    CreateMarket {
        close_time: Timestamp,
        creator_stake: Amount,
        fee_bps: u16,
        metadata: String,
    },
    /// `side` is 1 (yes) or 2 (no); attach at least `amount` TAI.
    PlaceBet {
        market_id: u64,
        side: u8,
        amount: Amount,
    },
    LockMarket { market_id: u64 },
    ResolveMarket {
        market_id: u64,
        outcome: u8,
        creator_penalty: Amount,
        reward_payouts: Vec<Entry>,
        slash_list: Vec<Entry>,
    },
    ClaimWinnings { market_id: u64 },
    ClaimCreatorStake { market_id: u64 },
    VoidMarket { market_id: u64, reason: String },
    WithdrawFees,
    /// Re-send every settlement chunk the staking ledger has not acknowledged.
    RetrySettlement { market_id: u64 },
    SettlementAck {
        market_id: u64,
        kind: SettlementKind,
        seq: u16,
    },
    UpdateConfig {
        treasury: Option<Address>,
        staking: Option<Address>,
    },
    TransferAdmin { new_admin: Address },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateMarket { .. } => "create_market",
            Command::PlaceBet { .. } => "place_bet",
            Command::LockMarket { .. } => "lock_market",
            Command::ResolveMarket { .. } => "resolve_market",
            Command::ClaimWinnings { .. } => "claim_winnings",
            Command::ClaimCreatorStake { .. } => "claim_creator_stake",
            Command::VoidMarket { .. } => "void_market",
            Command::WithdrawFees => "withdraw_fees",
            Command::RetrySettlement { .. } => "retry_settlement",
            Command::SettlementAck { .. } => "settlement_ack",
            Command::UpdateConfig { .. } => "update_config",
            Command::TransferAdmin { .. } => "transfer_admin",
        }
    }
}

impl WireMessage for Command {
    const OPCODES: &'static [u32] = &[
        OP_CREATE_MARKET,
        OP_PLACE_BET,
        OP_LOCK_MARKET,
        OP_RESOLVE_MARKET,
        OP_CLAIM_WINNINGS,
        OP_CLAIM_CREATOR_STAKE,
        OP_VOID_MARKET,
        OP_WITHDRAW_FEES,
        OP_RETRY_SETTLEMENT,
        OP_SETTLEMENT_ACK,
        OP_UPDATE_CONFIG,
        OP_TRANSFER_ADMIN,
    ];

    fn opcode(&self) -> u32 {
        match self {
            Command::CreateMarket { .. } => OP_CREATE_MARKET,
            Command::PlaceBet { .. } => OP_PLACE_BET,
            Command::LockMarket { .. } => OP_LOCK_MARKET,
            Command::ResolveMarket { .. } => OP_RESOLVE_MARKET,
            Command::ClaimWinnings { .. } => OP_CLAIM_WINNINGS,
            Command::ClaimCreatorStake { .. } => OP_CLAIM_CREATOR_STAKE,
            Command::VoidMarket { .. } => OP_VOID_MARKET,
            Command::WithdrawFees => OP_WITHDRAW_FEES,
            Command::RetrySettlement { .. } => OP_RETRY_SETTLEMENT,
            Command::SettlementAck { .. } => OP_SETTLEMENT_ACK,
            Command::UpdateConfig { .. } => OP_UPDATE_CONFIG,
            Command::TransferAdmin { .. } => OP_TRANSFER_ADMIN,
        }
    }

    fn encode_fields(&self, w: &mut Writer) {
        match self {
            Command::CreateMarket {
                close_time,
                creator_stake,
                fee_bps,
                metadata,
            } => {
                w.u64(*close_time).amount(*creator_stake).u16(*fee_bps).text(metadata);
            }
            Command::PlaceBet {
                market_id,
                side,
                amount,
            } => {
                w.u64(*market_id).u8(*side).amount(*amount);
            }
            Command::LockMarket { market_id }
            | Command::ClaimWinnings { market_id }
            | Command::ClaimCreatorStake { market_id }
            | Command::RetrySettlement { market_id } => {
                w.u64(*market_id);
            }
            Command::ResolveMarket {
                market_id,
                outcome,
                creator_penalty,
                reward_payouts,
                slash_list,
            } => {
                w.u64(*market_id)
                    .u8(*outcome)
                    .amount(*creator_penalty)
                    .entries(reward_payouts)
                    .entries(slash_list);
            }
            Command::VoidMarket { market_id, reason } => {
                w.u64(*market_id).text(reason);
            }
            Command::WithdrawFees => {}
            Command::SettlementAck {
                market_id,
                kind,
                seq,
            } => {
                w.u64(*market_id).u8(*kind as u8).u16(*seq);
            }
            Command::UpdateConfig { treasury, staking } => {
                w.maybe_address(treasury.as_ref())
                    .maybe_address(staking.as_ref());
            }
            Command::TransferAdmin { new_admin } => {
                w.address(new_admin);
            }
        }
    }

    fn decode_fields(opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(match opcode {
            OP_CREATE_MARKET => Command::CreateMarket {
                close_time: r.u64()?,
                creator_stake: r.amount()?,
                fee_bps: r.u16()?,
                metadata: r.text()?,
            },
            OP_PLACE_BET => Command::PlaceBet {
                market_id: r.u64()?,
                side: r.u8()?,
                amount: r.amount()?,
            },
            OP_LOCK_MARKET => Command::LockMarket { market_id: r.u64()? },
            OP_RESOLVE_MARKET => Command::ResolveMarket {
                market_id: r.u64()?,
                outcome: r.u8()?,
                creator_penalty: r.amount()?,
                reward_payouts: r.entries()?,
                slash_list: r.entries()?,
            },
            OP_CLAIM_WINNINGS => Command::ClaimWinnings { market_id: r.u64()? },
            OP_CLAIM_CREATOR_STAKE => Command::ClaimCreatorStake { market_id: r.u64()? },
            OP_VOID_MARKET => Command::VoidMarket {
                market_id: r.u64()?,
                reason: r.text()?,
            },
            OP_WITHDRAW_FEES => Command::WithdrawFees,
            OP_RETRY_SETTLEMENT => Command::RetrySettlement { market_id: r.u64()? },
            OP_SETTLEMENT_ACK => Command::SettlementAck {
                market_id: r.u64()?,
                kind: SettlementKind::from_u8(r.u8()?)?,
                seq: r.u16()?,
            },
            OP_UPDATE_CONFIG => Command::UpdateConfig {
                treasury: r.maybe_address()?,
                staking: r.maybe_address()?,
            },
            OP_TRANSFER_ADMIN => Command::TransferAdmin {
                new_admin: r.address()?,
            },
            other => return Err(WireError::UnknownOpcode(other)),
        })
    }
}
