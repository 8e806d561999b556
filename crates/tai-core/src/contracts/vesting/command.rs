use crate::types::{Amount, Price};
use crate::wire::{Reader, WireError, WireMessage, Writer};
use crate::Address;
use serde::{Deserialize, Serialize};

pub const OP_REQUEST_FUNDING: u32 = 0x5441_0601;
pub const OP_LOCKED_SUPPLY_TRANSFER: u32 = 0x5441_0602;
pub const OP_CONFIGURE_ROUND_PRICE: u32 = 0x5441_0603;
pub const OP_RELEASE_ROUND: u32 = 0x5441_0604;
pub const OP_SET_BENEFICIARY: u32 = 0x5441_0605;
pub const OP_RESEND_UNDELIVERED: u32 = 0x5441_0606;
pub const OP_TRANSFER_ADMIN: u32 = 0x5441_0607;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Ask the supply ledger for the locked allocation.
    RequestFunding,
    /// Reply from the supply ledger carrying `amount` TAI.
    LockedSupplyTransfer { amount: Amount },
    ConfigureRoundPrice { round: u8, price: Price },
    ReleaseRound { round: u8, observed_price: Price },
    SetBeneficiary { beneficiary: Address },
    /// Re-send releases that bounced back to the current beneficiary.
    ResendUndelivered,
    TransferAdmin { new_admin: Address },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::RequestFunding => "request_funding",
            Command::LockedSupplyTransfer { .. } => "locked_supply_transfer",
            Command::ConfigureRoundPrice { .. } => "configure_round_price",
            Command::ReleaseRound { .. } => "release_round",
            Command::SetBeneficiary { .. } => "set_beneficiary",
            Command::ResendUndelivered => "resend_undelivered",
            Command::TransferAdmin { .. } => "transfer_admin",
        }
    }
}

impl WireMessage for Command {
    const OPCODES: &'static [u32] = &[
        OP_REQUEST_FUNDING,
        OP_LOCKED_SUPPLY_TRANSFER,
        OP_CONFIGURE_ROUND_PRICE,
        OP_RELEASE_ROUND,
        OP_SET_BENEFICIARY,
        OP_RESEND_UNDELIVERED,
        OP_TRANSFER_ADMIN,
    ];

    fn opcode(&self) -> u32 {
        match self {
            Command::RequestFunding => OP_REQUEST_FUNDING,
            Command::LockedSupplyTransfer { .. } => OP_LOCKED_SUPPLY_TRANSFER,
            Command::ConfigureRoundPrice { .. } => OP_CONFIGURE_ROUND_PRICE,
            Command::ReleaseRound { .. } => OP_RELEASE_ROUND,
            Command::SetBeneficiary { .. } => OP_SET_BENEFICIARY,
            Command::ResendUndelivered => OP_RESEND_UNDELIVERED,
            Command::TransferAdmin { .. } => OP_TRANSFER_ADMIN,
        }
    }

    fn encode_fields(&self, w: &mut Writer) {
        match self {
            Command::RequestFunding | Command::ResendUndelivered => {}
            Command::LockedSupplyTransfer { amount } => {
                w.amount(*amount);
            }
            Command::ConfigureRoundPrice { round, price } => {
                w.u8(*round).amount(*price);
            }
            Command::ReleaseRound {
                round,
                observed_price,
            } => {
                w.u8(*round).amount(*observed_price);
            }
            Command::SetBeneficiary { beneficiary } => {
                w.address(beneficiary);
            }
            Command::TransferAdmin { new_admin } => {
                w.address(new_admin);
            }
        }
    }

    fn decode_fields(opcode: u32, r: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(match opcode {
            OP_REQUEST_FUNDING => Command::RequestFunding,
            OP_LOCKED_SUPPLY_TRANSFER => Command::LockedSupplyTransfer { amount: r.amount()? },
            OP_CONFIGURE_ROUND_PRICE => Command::ConfigureRoundPrice {
                round: r.u8()?,
                price: r.amount()?,
            },
            OP_RELEASE_ROUND => Command::ReleaseRound {
                round: r.u8()?,
                observed_price: r.amount()?,
            },
            OP_SET_BENEFICIARY => Command::SetBeneficiary {
                beneficiary: r.address()?,
            },
            OP_RESEND_UNDELIVERED => Command::ResendUndelivered,
            OP_TRANSFER_ADMIN => Command::TransferAdmin {
                new_admin: r.address()?,
            },
            other => return Err(WireError::UnknownOpcode(other)),
        })
    }
}
