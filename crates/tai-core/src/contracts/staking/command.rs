use crate::types::{Amount, Entry, Timestamp};
use crate::wire::{Reader, WireError, WireMessage, Writer};
use crate::Address;
use serde::{Deserialize, Serialize};

pub const OP_STAKE: u32 = 0x5441_0301;
pub const OP_UNSTAKE: u32 = 0x5441_0302;
pub const OP_CLAIM_REWARD: u32 = 0x5441_0303;
pub const OP_PAUSE_STAKER: u32 = 0x5441_0304;
pub const OP_TOGGLE_EMERGENCY: u32 = 0x5441_0305;
pub const OP_SET_PREDICTION_MARKET: u32 = 0x5441_0306;
pub const OP_WITHDRAW_SLASHED: u32 = 0x5441_0307;
pub const OP_TRANSFER_ADMIN: u32 = 0x5441_0308;
pub const OP_RECORD_PARTICIPATION: u32 = 0x5441_0309;
pub const OP_CREDIT_REWARDS: u32 = 0x5441_030A;
pub const OP_APPLY_SLASH: u32 = 0x5441_030B;

/// Which settlement list a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SettlementKind {
    Reward = 1,
    Slash = 2,
}

impl SettlementKind {
    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            1 => Ok(SettlementKind::Reward),
            2 => Ok(SettlementKind::Slash),
            tag => Err(WireError::InvalidTag {
                field: "settlement_kind",
                tag,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Attach at least `amount` TAI; any excess is returned.
    Stake { amount: Amount },
    Unstake { amount: Amount },
    ClaimReward,
    PauseStaker { target: Address, until: Timestamp },
    ToggleEmergency { enabled: bool },
    SetPredictionMarket { market: Address },
    /// Sweep the slashed pool to the treasury.
    WithdrawSlashed,
    TransferAdmin { new_admin: Address },
    RecordParticipation { target: Address, points: u64 },
    /// Credit `entries` as pending rewards; the message carries `reward` TAI.
    CreditRewards {
        market_id: u64,
        seq: u16,
        reward: Amount,
        entries: Vec<Entry>,
    },
    ApplySlash {
        market_id: u64,
        seq: u16,
        entries: Vec<Entry>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Stake { .. } => "stake",
            Command::Unstake { .. } => "unstake",
            Command::ClaimReward => "claim_reward",
            Command::PauseStaker { .. } => "pause_staker",
            Command::ToggleEmergency { .. } => "toggle_emergency",
            Command::SetPredictionMarket { .. } => "set_prediction_market",
            Command::WithdrawSlashed => "withdraw_slashed",
            Command::TransferAdmin { .. } => "transfer_admin",
            Command::RecordParticipation { .. } => "record_participation",
            Command::CreditRewards { .. } => "credit_rewards",
            Command::ApplySlash { .. } => "apply_slash",
        }
    }
}

impl WireMessage for Command {
    const OPCODES: &'static [u32] = &[
        OP_STAKE,
        OP_UNSTAKE,
        OP_CLAIM_REWARD,
        OP_PAUSE_STAKER,
        OP_TOGGLE_EMERGENCY,
        OP_SET_PREDICTION_MARKET,
        OP_WITHDRAW_SLASHED,
        OP_TRANSFER_ADMIN,
        OP_RECORD_PARTICIPATION,
        OP_CREDIT_REWARDS,
        OP_APPLY_SLASH,
    ];

    fn opcode(&self) -> u32 {
        match self {
            Command::Stake { .. } => OP_STAKE,
            Command::Unstake { .. } => OP_UNSTAKE,
            Command::ClaimReward => OP_CLAIM_REWARD,
            Command::PauseStaker { .. } => OP_PAUSE_STAKER,
            Command::ToggleEmergency { .. } => OP_TOGGLE_EMERGENCY,
            Command::SetPredictionMarket { .. } => OP_SET_PREDICTION_MARKET,
            Command::WithdrawSlashed => OP_WITHDRAW_SLASHED,
            Command::TransferAdmin { .. } => OP_TRANSFER_ADMIN,
            Command::RecordParticipation { .. } => OP_RECORD_PARTICIPATION,
            Command::CreditRewards { .. } => OP_CREDIT_REWARDS,
            Command::ApplySlash { .. } => OP_APPLY_SLASH,
        }
    }

    fn encode_fields(&self, w: &mut Writer) {
        match self {
            Command::Stake { amount } | Command::Unstake { amount } => {
                w.amount(*amount);
            }
            Command::ClaimReward | Command::WithdrawSlashed => {}
            Command::PauseStaker { target, until } => {
                w.address(target).u64(*until);
            }
            Command::ToggleEmergency { enabled } => {
                w.bool(*enabled);
            }
            Command::SetPredictionMarket { market } => {
                w.address(market);
            }
            Command::TransferAdmin { new_admin } => {
                w.address(new_admin);
            }
            Command::RecordParticipation { target, points } => {
                w.address(target).u64(*points);
            }
            Command::CreditRewards {
                market_id,
                seq,
                reward,
                entries,
            } => {
                w.u64(*market_id).u16(*seq).amount(*reward).entries(entries);
            }
            Command::ApplySlash {
                market_id,
                seq,
                entries,
            } => {
                w.u64(*market_id).u16(*seq).entries(entries);
            }
        }
    }

    fn decode_fields(opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(match opcode {
            OP_STAKE => Command::Stake { amount: r.amount()? },
            OP_UNSTAKE => Command::Unstake { amount: r.amount()? },
            OP_CLAIM_REWARD => Command::ClaimReward,
            OP_PAUSE_STAKER => Command::PauseStaker {
                target: r.address()?,
                until: r.u64()?,
            },
            OP_TOGGLE_EMERGENCY => Command::ToggleEmergency { enabled: r.bool()? },
            OP_SET_PREDICTION_MARKET => Command::SetPredictionMarket {
                market: r.address()?,
            },
            OP_WITHDRAW_SLASHED => Command::WithdrawSlashed,
            OP_TRANSFER_ADMIN => Command::TransferAdmin {
                new_admin: r.address()?,
            },
            OP_RECORD_PARTICIPATION => Command::RecordParticipation {
                target: r.address()?,
                points: r.u64()?,
            },
            OP_CREDIT_REWARDS => Command::CreditRewards {
                market_id: r.u64()?,
                seq: r.u16()?,
                reward: r.amount()?,
                entries: r.entries()?,
            },
            OP_APPLY_SLASH => Command::ApplySlash {
                market_id: r.u64()?,
                seq: r.u16()?,
                entries: r.entries()?,
            },
            other => return Err(WireError::UnknownOpcode(other)),
        })
    }
}
