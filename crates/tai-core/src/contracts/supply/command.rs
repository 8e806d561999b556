use crate::types::Amount;
use crate::wire::{Reader, WireError, WireMessage, Writer};
use crate::Address;
use serde::{Deserialize, Serialize};

pub const OP_DISTRIBUTE: u32 = 0x5441_0501;
pub const OP_REQUEST_LOCKED_SUPPLY: u32 = 0x5441_0502;
pub const OP_TRANSFER_ADMIN: u32 = 0x5441_0503;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Distribute { to: Address, amount: Amount },
    /// One-time request from the vesting contract for the locked allocation.
    RequestLockedSupply,
    TransferAdmin { new_admin: Address },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Distribute { .. } => "distribute",
            Command::RequestLockedSupply => "request_locked_supply",
            Command::TransferAdmin { .. } => "transfer_admin",
        }
    }
}

impl WireMessage for Command {
    const OPCODES: &'static [u32] = &[OP_DISTRIBUTE, OP_REQUEST_LOCKED_SUPPLY, OP_TRANSFER_ADMIN];

    fn opcode(&self) -> u32 {
        match self {
            Command::Distribute { .. } => OP_DISTRIBUTE,
            Command::RequestLockedSupply => OP_REQUEST_LOCKED_SUPPLY,
            Command::TransferAdmin { .. } => OP_TRANSFER_ADMIN,
        }
    }

    fn encode_fields(&self, w: &mut Writer) {
        match self {
            Command::Distribute { to, amount } => {
                w.address(to).amount(*amount);
            }
            Command::RequestLockedSupply => {}
            Command::TransferAdmin { new_admin } => {
                w.address(new_admin);
            }
        }
    }

    fn decode_fields(opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(match opcode {
            OP_DISTRIBUTE => Command::Distribute {
                to: r.address()?,
                amount: r.amount()?,
            },
            OP_REQUEST_LOCKED_SUPPLY => Command::RequestLockedSupply,
            OP_TRANSFER_ADMIN => Command::TransferAdmin {
                new_admin: r.address()?,
            },
            other => return Err(WireError::UnknownOpcode(other)),
        })
    }
}
