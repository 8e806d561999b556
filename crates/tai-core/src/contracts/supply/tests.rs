use super::command::Command;
use super::invariants::check_invariants;
use super::state::State;
use super::step::{on_bounce, step};
use crate::bus::MsgContext;
use crate::config::SupplyConfig;
use crate::contracts::vesting::Command as VestingCommand;
use crate::contracts::Effects;
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{Address, ErrorCode, Funds, TaiError};

const T0: u64 = 1_700_000_000;

fn admin() -> Address {
    Address::from_label("supply-admin")
}

fn vesting() -> Address {
    Address::from_label("vesting")
}

fn alice() -> Address {
    Address::from_label("alice")
}

fn ctx(sender: Address) -> MsgContext {
    MsgContext {
        now: T0,
        sender,
        value: Funds::ZERO,
        balance: Funds::tai(1_000),
    }
}

fn valued(sender: Address, tai: u128) -> MsgContext {
    MsgContext {
        value: Funds::tai(tai),
        ..ctx(sender)
    }
}

fn base() -> State {
    State::init(
        admin(),
        vesting(),
        SupplyConfig {
            total_supply: 1_000,
            locked_supply: 190,
        },
    )
}

fn rejected(res: Result<(State, Effects), TaiError>) -> ErrorCode {
    res.map(|_| ()).unwrap_err().code()
}

#[test]
fn init_satisfies_invariants() {
    let s = base();
    assert!(check_invariants(&s).is_ok());
    assert_eq!(s.distributable().unwrap(), 810);
    assert_eq!(s.obligations().unwrap(), 1_000);
}

#[test]
fn distribute_is_admin_only_and_bounded() {
    let s = base();
    let cmd = |amount| Command::Distribute { to: alice(), amount };
    assert_eq!(rejected(step(&s, &ctx(alice()), cmd(10))), ErrorCode::NotAdmin);
    assert_eq!(rejected(step(&s, &ctx(admin()), cmd(0))), ErrorCode::InvalidAmount);
    assert_eq!(
        rejected(step(&s, &ctx(admin()), cmd(811))),
        ErrorCode::InsufficientBalance
    );

    let (s, fx) = step(&s, &ctx(admin()), cmd(810)).unwrap();
    assert_eq!(s.distributed, 810);
    assert_eq!(fx.messages[0].value, Funds::tai(810));
    assert_eq!(
        Payout::decode(&fx.messages[0].body).unwrap().reason,
        PayoutReason::Distribution
    );

    let s = on_bounce(&s, &valued(alice(), 810), ErrorCode::UnknownOpcode.code(), &fx.messages[0].body).unwrap();
    assert_eq!(s.distributed, 0);
}

#[test]
fn locked_supply_handoff_happens_once() {
    let s = base();
    assert_eq!(
        rejected(step(&s, &ctx(alice()), Command::RequestLockedSupply)),
        ErrorCode::NotVesting
    );
    let (s, fx) = step(&s, &ctx(vesting()), Command::RequestLockedSupply).unwrap();
    assert!(s.handoff_done);
    assert_eq!(fx.messages[0].to, vesting());
    assert_eq!(fx.messages[0].value, Funds::tai(190));
    assert!(fx.messages[0].bounceable);
    assert_eq!(
        VestingCommand::decode(&fx.messages[0].body).unwrap(),
        VestingCommand::LockedSupplyTransfer { amount: 190 }
    );
    assert_eq!(
        rejected(step(&s, &ctx(vesting()), Command::RequestLockedSupply)),
        ErrorCode::HandoffDone
    );

    // A bounced handoff can be requested again.
    let reopened = on_bounce(
        &s,
        &valued(vesting(), 190),
        ErrorCode::NotMaster.code(),
        &fx.messages[0].body,
    )
    .unwrap();
    assert!(!reopened.handoff_done);
    assert!(step(&reopened, &ctx(vesting()), Command::RequestLockedSupply).is_ok());

    // A duplicate refused by an already funded vesting contract keeps the handoff closed.
    let duplicate = on_bounce(
        &s,
        &valued(vesting(), 190),
        ErrorCode::AlreadyFunded.code(),
        &fx.messages[0].body,
    )
    .unwrap();
    assert!(duplicate.handoff_done);
    assert_eq!(
        rejected(step(&duplicate, &ctx(vesting()), Command::RequestLockedSupply)),
        ErrorCode::HandoffDone
    );
}

#[test]
fn transfer_admin() {
    let s = base();
    assert_eq!(
        rejected(step(&s, &ctx(alice()), Command::TransferAdmin { new_admin: alice() })),
        ErrorCode::NotAdmin
    );
    let (s, _) = step(&s, &ctx(admin()), Command::TransferAdmin { new_admin: alice() }).unwrap();
    assert_eq!(s.admin, alice());
}
