use crate::types::{Price, Timestamp};
use crate::wire::{Reader, WireError, WireMessage, Writer};
use crate::Address;
use serde::{Deserialize, Serialize};

pub const OP_PUSH_PRICE: u32 = 0x5441_0101;
pub const OP_BATCH_PUSH_PRICE: u32 = 0x5441_0102;
pub const OP_RESET_PRICE: u32 = 0x5441_0103;
pub const OP_TRANSFER_ADMIN: u32 = 0x5441_0104;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: Timestamp,
    pub price: Price,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    PushPrice { timestamp: Timestamp, price: Price },
    /// All-or-nothing: one bad point rejects the batch.
    BatchPushPrice { points: Vec<PricePoint> },
    /// Overwrite the sample at `timestamp`, dropping any later days.
    ResetPrice { timestamp: Timestamp, price: Price },
    TransferAdmin { new_admin: Address },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::PushPrice { .. } => "push_price",
            Command::BatchPushPrice { .. } => "batch_push_price",
            Command::ResetPrice { .. } => "reset_price",
            Command::TransferAdmin { .. } => "transfer_admin",
        }
    }
}

impl WireMessage for Command {
    const OPCODES: &'static [u32] = &[
        OP_PUSH_PRICE,
        OP_BATCH_PUSH_PRICE,
        OP_RESET_PRICE,
        OP_TRANSFER_ADMIN,
    ];

    fn opcode(&self) -> u32 {
        match self {
            Command::PushPrice { .. } => OP_PUSH_PRICE,
            Command::BatchPushPrice { .. } => OP_BATCH_PUSH_PRICE,
            Command::ResetPrice { .. } => OP_RESET_PRICE,
            Command::TransferAdmin { .. } => OP_TRANSFER_ADMIN,
        }
    }

    fn encode_fields(&self, w: &mut Writer) {
        match self {
            Command::PushPrice { timestamp, price } | Command::ResetPrice { timestamp, price } => {
                w.u64(*timestamp).amount(*price);
            }
            Command::BatchPushPrice { points } => {
                w.u16(points.len() as u16);
                for p in points {
                    w.u64(p.timestamp).amount(p.price);
                }
            }
            Command::TransferAdmin { new_admin } => {
                w.address(new_admin);
            }
        }
    }

    fn decode_fields(opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(match opcode {
            OP_PUSH_PRICE => Command::PushPrice {
                timestamp: r.u64()?,
                price: r.amount()?,
            },
            OP_RESET_PRICE => Command::ResetPrice {
                timestamp: r.u64()?,
                price: r.amount()?,
            },
            OP_BATCH_PUSH_PRICE => {
                let n = r.u16()? as usize;
                let mut points = Vec::with_capacity(n.min(256));
                for _ in 0..n {
                    points.push(PricePoint {
                        timestamp: r.u64()?,
                        price: r.amount()?,
                    });
                }
                Command::BatchPushPrice { points }
            }
            OP_TRANSFER_ADMIN => Command::TransferAdmin {
                new_admin: r.address()?,
            },
            other => return Err(WireError::UnknownOpcode(other)),
        })
    }
}
