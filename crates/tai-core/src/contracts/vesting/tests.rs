use super::command::Command;
use super::invariants::check_invariants;
use super::state::State;
use super::step::{on_bounce, step};
use crate::bus::MsgContext;
use crate::config::VestingConfig;
use crate::contracts::supply::Command as SupplyCommand;
use crate::contracts::Effects;
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{Address, ErrorCode, Funds, TaiError};

const T0: u64 = 1_700_000_000;

fn admin() -> Address {
    Address::from_label("vesting-admin")
}

fn master() -> Address {
    Address::from_label("master")
}

fn beneficiary() -> Address {
    Address::from_label("team")
}

fn ctx(sender: Address, value: u128) -> MsgContext {
    MsgContext {
        now: T0,
        sender,
        value: Funds::tai(value),
        balance: Funds::tai(value),
    }
}

fn rejected(res: Result<(State, Effects), TaiError>) -> ErrorCode {
    res.map(|_| ()).unwrap_err().code()
}

fn base() -> State {
    State::init(admin(), master(), beneficiary(), VestingConfig { max_rounds: 3 })
}

fn funded() -> State {
    step(&base(), &ctx(master(), 100), Command::LockedSupplyTransfer { amount: 100 })
        .unwrap()
        .0
}

fn configured(prices: &[u128]) -> State {
    let mut s = funded();
    for (i, p) in prices.iter().enumerate() {
        let cmd = Command::ConfigureRoundPrice {
            round: i as u8 + 1,
            price: *p,
        };
        s = step(&s, &ctx(admin(), 0), cmd).unwrap().0;
    }
    s
}

fn release(round: u8, observed_price: u128) -> Command {
    Command::ReleaseRound {
        round,
        observed_price,
    }
}

#[test]
fn init_satisfies_invariants() {
    assert!(check_invariants(&base()).is_ok());
}

#[test]
fn request_funding_asks_master() {
    let (_, fx) = step(&base(), &ctx(admin(), 0), Command::RequestFunding).unwrap();
    assert_eq!(fx.messages[0].to, master());
    assert_eq!(
        SupplyCommand::decode(&fx.messages[0].body).unwrap(),
        SupplyCommand::RequestLockedSupply
    );
    assert_eq!(
        rejected(step(&funded(), &ctx(admin(), 0), Command::RequestFunding)),
        ErrorCode::AlreadyFunded
    );
}

#[test]
fn funding_only_from_master_and_once() {
    let cmd = Command::LockedSupplyTransfer { amount: 100 };
    assert_eq!(
        rejected(step(&base(), &ctx(admin(), 100), cmd.clone())),
        ErrorCode::NotMaster
    );
    assert_eq!(
        rejected(step(&base(), &ctx(master(), 99), cmd.clone())),
        ErrorCode::InsufficientValue
    );
    let s = funded();
    assert!(s.funded);
    assert_eq!(s.total_locked, 100);
    assert_eq!(
        rejected(step(&s, &ctx(master(), 100), cmd)),
        ErrorCode::AlreadyFunded
    );
}

#[test]
fn round_prices_must_be_sequential_and_increasing() {
    let s = configured(&[10]);
    let cfg = |round, price| Command::ConfigureRoundPrice { round, price };
    assert_eq!(rejected(step(&s, &ctx(admin(), 0), cfg(3, 30))), ErrorCode::InvalidRound);
    assert_eq!(rejected(step(&s, &ctx(admin(), 0), cfg(1, 30))), ErrorCode::InvalidRound);
    assert_eq!(
        rejected(step(&s, &ctx(admin(), 0), cfg(2, 10))),
        ErrorCode::PriceNotIncreasing
    );
    assert_eq!(rejected(step(&s, &ctx(master(), 0), cfg(2, 20))), ErrorCode::NotAdmin);

    let s = configured(&[10, 20, 30]);
    assert_eq!(rejected(step(&s, &ctx(admin(), 0), cfg(4, 40))), ErrorCode::InvalidRound);
}

#[test]
fn release_checks() {
    let unfunded = base();
    assert_eq!(
        rejected(step(&unfunded, &ctx(admin(), 0), release(1, 10))),
        ErrorCode::NotFunded
    );
    let s = configured(&[10, 20]);
    assert_eq!(
        rejected(step(&s, &ctx(admin(), 0), release(3, 99))),
        ErrorCode::RoundNotConfigured
    );
    assert_eq!(
        rejected(step(&s, &ctx(admin(), 0), release(2, 20))),
        ErrorCode::PreviousRoundLocked
    );
    assert_eq!(
        rejected(step(&s, &ctx(admin(), 0), release(1, 9))),
        ErrorCode::PriceTargetNotMet
    );
    let (s, fx) = step(&s, &ctx(admin(), 0), release(1, 10)).unwrap();
    assert_eq!(fx.messages[0].to, beneficiary());
    assert_eq!(fx.messages[0].value, Funds::tai(33));
    assert_eq!(
        rejected(step(&s, &ctx(admin(), 0), release(1, 10))),
        ErrorCode::RoundReleased
    );
}

#[test]
fn all_rounds_release_the_full_allocation() {
    let mut s = configured(&[10, 20, 30]);
    let mut paid = Vec::new();
    for round in 1..=3u8 {
        let (next, fx) = step(&s, &ctx(admin(), 0), release(round, 1_000)).unwrap();
        paid.push(fx.messages[0].value.tai);
        assert_eq!(
            Payout::decode(&fx.messages[0].body).unwrap().reason,
            PayoutReason::VestingRelease { round }
        );
        s = next;
    }
    assert_eq!(paid, vec![33, 33, 34]);
    assert_eq!(s.released, 100);
}

#[test]
fn bounced_release_is_resent() {
    let s = configured(&[10]);
    let (s, fx) = step(&s, &ctx(admin(), 0), release(1, 10)).unwrap();
    assert_eq!(
        rejected(step(&s, &ctx(admin(), 0), Command::ResendUndelivered)),
        ErrorCode::NothingToRetry
    );
    let s = on_bounce(&s, &ctx(beneficiary(), 33), &fx.messages[0].body).unwrap();
    assert_eq!(s.undelivered, 33);

    let other = Address::from_label("team-2");
    let (s, _) = step(&s, &ctx(admin(), 0), Command::SetBeneficiary { beneficiary: other }).unwrap();
    let (s, fx) = step(&s, &ctx(admin(), 0), Command::ResendUndelivered).unwrap();
    assert_eq!(s.undelivered, 0);
    assert_eq!(fx.messages[0].to, other);
    assert_eq!(fx.messages[0].value, Funds::tai(33));
}
