use crate::merkle::MerkleProof;
use crate::types::{Amount, Price, Timestamp};
use crate::wire::{Reader, WireError, WireMessage, Writer};
use crate::{Address, Hash32};
use serde::{Deserialize, Serialize};

pub const OP_SET_INITIAL_PRICE: u32 = 0x5441_0201;
pub const OP_RECORD_PRICE: u32 = 0x5441_0202;
pub const OP_UNLOCK_ROUND: u32 = 0x5441_0203;
pub const OP_PAUSE_UNLOCK: u32 = 0x5441_0204;
pub const OP_START_WHITELIST_SALE: u32 = 0x5441_0205;
pub const OP_PURCHASE_WHITELIST: u32 = 0x5441_0206;
pub const OP_CLOSE_WHITELIST_SALE: u32 = 0x5441_0207;
pub const OP_CANCEL_WHITELIST_SALE: u32 = 0x5441_0208;
pub const OP_REFUND_SALE_REMAINDER: u32 = 0x5441_0209;
pub const OP_TRIGGER_EMERGENCY_BUYBACK: u32 = 0x5441_020A;
pub const OP_TRANSFER_ADMIN: u32 = 0x5441_020B;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    SetInitialPrice {
        price: Price,
        timestamp: Timestamp,
    },
    /// Admin-relayed price fact for `round`, consumed by the next `UnlockRound`.
    RecordPrice {
        price: Price,
        timestamp: Timestamp,
        round: u8,
    },
    UnlockRound,
    PauseUnlock { paused: bool },
    StartWhitelistSale {
        merkle_root: Hash32,
        total_amount: Amount,
        /// Public reference price, native units per `PRICE_SCALE` TAI.
        baseline_price: Price,
        /// Price whitelisted buyers pay; at most `baseline_price`.
        current_price: Price,
        window_end: Timestamp,
    },
    /// Attach the native payment. `quota` is the amount committed in the merkle leaf.
    PurchaseWhitelist {
        amount: Amount,
        quota: Amount,
        proof: MerkleProof,
        beneficiary: Address,
    },
    CloseWhitelistSale,
    CancelWhitelistSale,
    RefundSaleRemainder,
    TriggerEmergencyBuyback {
        price_now: Price,
        price_prev: Price,
    },
    TransferAdmin { new_admin: Address },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetInitialPrice { .. } => "set_initial_price",
            Command::RecordPrice { .. } => "record_price",
            Command::UnlockRound => "unlock_round",
            Command::PauseUnlock { .. } => "pause_unlock",
            Command::StartWhitelistSale { .. } => "start_whitelist_sale",
            Command::PurchaseWhitelist { .. } => "purchase_whitelist",
            Command::CloseWhitelistSale => "close_whitelist_sale",
            Command::CancelWhitelistSale => "cancel_whitelist_sale",
            Command::RefundSaleRemainder => "refund_sale_remainder",
            Command::TriggerEmergencyBuyback { .. } => "trigger_emergency_buyback",
            Command::TransferAdmin { .. } => "transfer_admin",
        }
    }
}

impl WireMessage for Command {
    const OPCODES: &'static [u32] = &[
        OP_SET_INITIAL_PRICE,
        OP_RECORD_PRICE,
        OP_UNLOCK_ROUND,
        OP_PAUSE_UNLOCK,
        OP_START_WHITELIST_SALE,
        OP_PURCHASE_WHITELIST,
        OP_CLOSE_WHITELIST_SALE,
        OP_CANCEL_WHITELIST_SALE,
        OP_REFUND_SALE_REMAINDER,
        OP_TRIGGER_EMERGENCY_BUYBACK,
        OP_TRANSFER_ADMIN,
    ];

    fn opcode(&self) -> u32 {
        match self {
            Command::SetInitialPrice { .. } => OP_SET_INITIAL_PRICE,
            Command::RecordPrice { .. } => OP_RECORD_PRICE,
            Command::UnlockRound => OP_UNLOCK_ROUND,
            Command::PauseUnlock { .. } => OP_PAUSE_UNLOCK,
            Command::StartWhitelistSale { .. } => OP_START_WHITELIST_SALE,
            Command::PurchaseWhitelist { .. } => OP_PURCHASE_WHITELIST,
            Command::CloseWhitelistSale => OP_CLOSE_WHITELIST_SALE,
            Command::CancelWhitelistSale => OP_CANCEL_WHITELIST_SALE,
            Command::RefundSaleRemainder => OP_REFUND_SALE_REMAINDER,
            Command::TriggerEmergencyBuyback { .. } => OP_TRIGGER_EMERGENCY_BUYBACK,
            Command::TransferAdmin { .. } => OP_TRANSFER_ADMIN,
        }
    }

    fn encode_fields(&self, w: &mut Writer) {
        match self {
            Command::SetInitialPrice { price, timestamp } => {
                w.amount(*price).u64(*timestamp);
            }
            Command::RecordPrice {
                price,
                timestamp,
                round,
            } => {
                w.amount(*price).u64(*timestamp).u8(*round);
            }
            Command::PauseUnlock { paused } => {
                w.bool(*paused);
            }
            Command::StartWhitelistSale {
                merkle_root,
                total_amount,
                baseline_price,
                current_price,
                window_end,
            } => {
                w.hash(merkle_root)
                    .amount(*total_amount)
                    .amount(*baseline_price)
                    .amount(*current_price)
                    .u64(*window_end);
            }
            Command::PurchaseWhitelist {
                amount,
                quota,
                proof,
                beneficiary,
            } => {
                w.amount(*amount)
                    .amount(*quota)
                    .u64(proof.index)
                    .hashes(&proof.siblings)
                    .address(beneficiary);
            }
            Command::TriggerEmergencyBuyback {
                price_now,
                price_prev,
            } => {
                w.amount(*price_now).amount(*price_prev);
            }
            Command::TransferAdmin { new_admin } => {
                w.address(new_admin);
            }
            Command::UnlockRound
            | Command::CloseWhitelistSale
            | Command::CancelWhitelistSale
            | Command::RefundSaleRemainder => {}
        }
    }

    fn decode_fields(opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(match opcode {
            OP_SET_INITIAL_PRICE => Command::SetInitialPrice {
                price: r.amount()?,
                timestamp: r.u64()?,
            },
            OP_RECORD_PRICE => Command::RecordPrice {
                price: r.amount()?,
                timestamp: r.u64()?,
                round: r.u8()?,
            },
            OP_UNLOCK_ROUND => Command::UnlockRound,
            OP_PAUSE_UNLOCK => Command::PauseUnlock { paused: r.bool()? },
            OP_START_WHITELIST_SALE => Command::StartWhitelistSale {
                merkle_root: r.hash()?,
                total_amount: r.amount()?,
                baseline_price: r.amount()?,
                current_price: r.amount()?,
                window_end: r.u64()?,
            },
            OP_PURCHASE_WHITELIST => {
                let amount = r.amount()?;
                let quota = r.amount()?;
                let index = r.u64()?;
                let siblings = r.hashes()?;
                Command::PurchaseWhitelist {
                    amount,
                    quota,
                    proof: MerkleProof { siblings, index },
                    beneficiary: r.address()?,
                }
            }
            OP_CLOSE_WHITELIST_SALE => Command::CloseWhitelistSale,
            OP_CANCEL_WHITELIST_SALE => Command::CancelWhitelistSale,
            OP_REFUND_SALE_REMAINDER => Command::RefundSaleRemainder,
            OP_TRIGGER_EMERGENCY_BUYBACK => Command::TriggerEmergencyBuyback {
                price_now: r.amount()?,
                price_prev: r.amount()?,
            },
            OP_TRANSFER_ADMIN => Command::TransferAdmin {
                new_admin: r.address()?,
            },
            other => return Err(WireError::UnknownOpcode(other)),
        })
    }
}
