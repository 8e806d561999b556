use super::command::{Command, SettlementKind};
use super::invariants::check_invariants;
use super::state::{ChunkKey, State};
use super::step::{on_bounce, step};
use crate::bus::MsgContext;
use crate::config::StakingConfig;
use crate::contracts::market::command::Command as MarketCommand;
use crate::types::{Entry, SECONDS_PER_DAY};
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{Address, ErrorCode, Funds, TaiError};
use proptest::prelude::*;

const T0: u64 = 1_700_000_000;

fn admin() -> Address {
    Address::from_label("staking-admin")
}

fn market() -> Address {
    Address::from_label("market")
}

fn alice() -> Address {
    Address::from_label("alice")
}

fn bob() -> Address {
    Address::from_label("bob")
}

fn ctx(sender: Address, now: u64, value: Funds) -> MsgContext {
    MsgContext {
        now,
        sender,
        value,
        balance: value,
    }
}

fn base() -> State {
    let mut s = State::init(admin(), Address::from_label("treasury"), StakingConfig::default());
    s.prediction_market = Some(market());
    s
}

fn staked(who: Address, amount: u128, at: u64) -> State {
    let (s, _) = step(&base(), &ctx(who, at, Funds::tai(amount)), Command::Stake { amount }).unwrap();
    s
}

fn rejected(res: Result<(State, crate::contracts::Effects), TaiError>) -> ErrorCode {
    res.map(|_| ()).unwrap_err().code()
}

#[test]
fn init_satisfies_invariants() {
    assert!(check_invariants(&base()).is_ok());
}

#[test]
fn stake_below_minimum_rejected() {
    let res = step(&base(), &ctx(alice(), T0, Funds::tai(999)), Command::Stake { amount: 999 });
    assert_eq!(rejected(res), ErrorCode::StakeTooSmall);
}

#[test]
fn stake_requires_attached_value_and_refunds_excess() {
    let res = step(&base(), &ctx(alice(), T0, Funds::tai(500)), Command::Stake { amount: 1_000 });
    assert_eq!(rejected(res), ErrorCode::InsufficientValue);

    let (s, fx) = step(
        &base(),
        &ctx(alice(), T0, Funds { native: 3, tai: 1_200 }),
        Command::Stake { amount: 1_000 },
    )
    .unwrap();
    assert_eq!(s.stake_of(&alice()), 1_000);
    assert_eq!(fx.messages.len(), 1);
    assert_eq!(fx.messages[0].value, Funds { native: 3, tai: 200 });
    assert!(!fx.messages[0].bounceable);
}

#[test]
fn stake_time_weights_prior_amount() {
    let s = staked(alice(), 1_000, T0);
    let later = T0 + 2 * SECONDS_PER_DAY;
    let (s, _) = step(&s, &ctx(alice(), later, Funds::tai(1_000)), Command::Stake { amount: 1_000 }).unwrap();
    let info = s.info(&alice()).unwrap();
    assert_eq!(info.accumulated_seconds, 1_000 * 2 * SECONDS_PER_DAY as u128);
    assert_eq!(info.amount, 2_000);
    assert_eq!(s.stake_days(&alice(), later).unwrap(), 2_000);
}

#[test]
fn unstake_errors() {
    let s = staked(alice(), 1_000, T0);
    assert_eq!(
        rejected(step(&s, &ctx(bob(), T0, Funds::ZERO), Command::Unstake { amount: 1 })),
        ErrorCode::NoStake
    );
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0, Funds::ZERO), Command::Unstake { amount: 0 })),
        ErrorCode::InvalidAmount
    );
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0, Funds::ZERO), Command::Unstake { amount: 1_001 })),
        ErrorCode::InsufficientStake
    );
}

#[test]
fn unstake_pays_back_tai() {
    let s = staked(alice(), 1_500, T0);
    let (s, fx) = step(&s, &ctx(alice(), T0 + 10, Funds::ZERO), Command::Unstake { amount: 500 }).unwrap();
    assert_eq!(s.stake_of(&alice()), 1_000);
    assert_eq!(s.total_staked, 1_000);
    assert_eq!(fx.messages[0].value, Funds::tai(500));
    assert_eq!(
        Payout::decode(&fx.messages[0].body).unwrap().reason,
        PayoutReason::Unstake { amount: 500 }
    );
}

#[test]
fn emergency_blocks_stake_but_not_unstake() {
    let s = staked(alice(), 1_000, T0);
    let (s, _) = step(&s, &ctx(admin(), T0, Funds::ZERO), Command::ToggleEmergency { enabled: true }).unwrap();
    assert_eq!(
        rejected(step(&s, &ctx(bob(), T0, Funds::tai(1_000)), Command::Stake { amount: 1_000 })),
        ErrorCode::Emergency
    );
    assert!(step(&s, &ctx(alice(), T0, Funds::ZERO), Command::Unstake { amount: 1_000 }).is_ok());
}

#[test]
fn paused_staker_is_suspended_and_stops_accruing() {
    let s = staked(alice(), 1_000, T0);
    let until = T0 + 5 * SECONDS_PER_DAY;
    let (s, _) = step(
        &s,
        &ctx(admin(), T0 + SECONDS_PER_DAY, Funds::ZERO),
        Command::PauseStaker { target: alice(), until },
    )
    .unwrap();
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0 + 2 * SECONDS_PER_DAY, Funds::ZERO), Command::Unstake { amount: 1 })),
        ErrorCode::Suspended
    );
    // One day before the pause, one day after it ends.
    assert_eq!(s.stake_days(&alice(), until + SECONDS_PER_DAY).unwrap(), 2_000);
}

fn with_reward(who: Address, reward: u128) -> State {
    let s = staked(who, 1_000, T0);
    let (s, _) = step(
        &s,
        &ctx(market(), T0, Funds::tai(reward)),
        Command::CreditRewards {
            market_id: 1,
            seq: 0,
            reward,
            entries: vec![Entry::new(who, reward)],
        },
    )
    .unwrap();
    s
}

#[test]
fn emergency_blocks_reward_claims() {
    let s = with_reward(alice(), 50);
    let (s, _) = step(&s, &ctx(admin(), T0, Funds::ZERO), Command::ToggleEmergency { enabled: true }).unwrap();
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0 + 4, Funds::ZERO), Command::ClaimReward)),
        ErrorCode::Emergency
    );
    assert_eq!(s.info(&alice()).unwrap().pending_reward, 50);

    let (s, _) = step(&s, &ctx(admin(), T0, Funds::ZERO), Command::ToggleEmergency { enabled: false }).unwrap();
    assert!(step(&s, &ctx(alice(), T0 + 4, Funds::ZERO), Command::ClaimReward).is_ok());
}

#[test]
fn suspended_staker_cannot_claim_until_pause_ends() {
    let s = with_reward(alice(), 50);
    let until = T0 + 1_000;
    let (s, _) = step(
        &s,
        &ctx(admin(), T0, Funds::ZERO),
        Command::PauseStaker { target: alice(), until },
    )
    .unwrap();
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0 + 4, Funds::ZERO), Command::ClaimReward)),
        ErrorCode::Suspended
    );
    let (claimed, fx) = step(&s, &ctx(alice(), until + 1, Funds::ZERO), Command::ClaimReward).unwrap();
    assert_eq!(claimed.info(&alice()).unwrap().pending_reward, 0);
    assert_eq!(fx.messages[0].value, Funds::tai(50));
}

#[test]
fn admin_only_operations() {
    let s = staked(alice(), 1_000, T0);
    for cmd in [
        Command::ToggleEmergency { enabled: true },
        Command::SetPredictionMarket { market: bob() },
        Command::WithdrawSlashed,
        Command::TransferAdmin { new_admin: bob() },
        Command::PauseStaker { target: alice(), until: T0 + 1 },
    ] {
        assert_eq!(rejected(step(&s, &ctx(bob(), T0, Funds::ZERO), cmd)), ErrorCode::NotAdmin);
    }
}

#[test]
fn market_only_operations_reject_others_and_leave_state() {
    let s = staked(alice(), 1_000, T0);
    let cmds = [
        Command::RecordParticipation { target: alice(), points: 5 },
        Command::CreditRewards {
            market_id: 1,
            seq: 0,
            reward: 10,
            entries: vec![Entry::new(alice(), 10)],
        },
        Command::ApplySlash {
            market_id: 1,
            seq: 0,
            entries: vec![Entry::new(alice(), 10)],
        },
    ];
    for cmd in cmds {
        assert_eq!(
            rejected(step(&s, &ctx(admin(), T0, Funds::tai(10)), cmd)),
            ErrorCode::NotPrediction
        );
    }
    assert_eq!(s.stake_of(&alice()), 1_000);
}

#[test]
fn credit_rewards_is_applied_once_and_acked() {
    let s = staked(alice(), 1_000, T0);
    let cmd = Command::CreditRewards {
        market_id: 4,
        seq: 0,
        reward: 30,
        entries: vec![Entry::new(alice(), 20), Entry::new(bob(), 10)],
    };
    let (s, fx) = step(&s, &ctx(market(), T0, Funds::tai(30)), cmd.clone()).unwrap();
    assert_eq!(s.info(&alice()).unwrap().pending_reward, 20);
    assert_eq!(s.info(&bob()).unwrap().pending_reward, 10);
    assert_eq!(s.reward_reserve, 30);
    assert_eq!(fx.messages.len(), 1);
    assert_eq!(
        MarketCommand::decode(&fx.messages[0].body).unwrap(),
        MarketCommand::SettlementAck {
            market_id: 4,
            kind: SettlementKind::Reward,
            seq: 0
        }
    );

    // Duplicate delivery: no second credit, value refunded, ack repeated.
    let (s2, fx2) = step(&s, &ctx(market(), T0, Funds::tai(30)), cmd).unwrap();
    assert_eq!(s2, s);
    assert_eq!(fx2.messages.len(), 2);
    assert_eq!(fx2.messages[1].value, Funds::tai(30));
}

#[test]
fn credit_rewards_checks_value_and_total() {
    let s = base();
    let short = Command::CreditRewards {
        market_id: 1,
        seq: 0,
        reward: 30,
        entries: vec![Entry::new(alice(), 30)],
    };
    assert_eq!(
        rejected(step(&s, &ctx(market(), T0, Funds::tai(29)), short)),
        ErrorCode::InsufficientValue
    );
    let mismatched = Command::CreditRewards {
        market_id: 1,
        seq: 0,
        reward: 30,
        entries: vec![Entry::new(alice(), 31)],
    };
    assert_eq!(
        rejected(step(&s, &ctx(market(), T0, Funds::tai(30)), mismatched)),
        ErrorCode::InvalidAmount
    );
}

#[test]
fn slash_caps_at_stake_and_counts_penalty() {
    let s = staked(alice(), 1_000, T0);
    let cmd = Command::ApplySlash {
        market_id: 2,
        seq: 0,
        entries: vec![Entry::new(alice(), 300), Entry::new(alice(), 5_000), Entry::new(bob(), 7)],
    };
    let (s, _) = step(&s, &ctx(market(), T0, Funds::ZERO), cmd.clone()).unwrap();
    let info = s.info(&alice()).unwrap();
    assert_eq!(info.amount, 0);
    assert_eq!(info.penalty_count, 2);
    assert_eq!(s.slashed_pool, 1_000);
    assert_eq!(s.total_staked, 0);
    assert!(s.applied_chunks.contains(&ChunkKey {
        market_id: 2,
        kind: SettlementKind::Slash,
        seq: 0
    }));

    let (again, _) = step(&s, &ctx(market(), T0, Funds::ZERO), cmd).unwrap();
    assert_eq!(again, s);
}

#[test]
fn claim_reward_zeroes_and_bounce_recredits() {
    let s = staked(alice(), 1_000, T0);
    let (s, _) = step(
        &s,
        &ctx(market(), T0, Funds::tai(50)),
        Command::CreditRewards {
            market_id: 1,
            seq: 0,
            reward: 50,
            entries: vec![Entry::new(alice(), 50)],
        },
    )
    .unwrap();
    let (claimed, fx) = step(&s, &ctx(alice(), T0, Funds::ZERO), Command::ClaimReward).unwrap();
    assert_eq!(claimed.info(&alice()).unwrap().pending_reward, 0);
    assert_eq!(fx.messages[0].value, Funds::tai(50));
    assert_eq!(
        rejected(step(&claimed, &ctx(alice(), T0, Funds::ZERO), Command::ClaimReward)),
        ErrorCode::NoReward
    );

    let restored = on_bounce(&claimed, &ctx(alice(), T0, Funds::tai(50)), &fx.messages[0].body).unwrap();
    assert_eq!(restored.info(&alice()).unwrap().pending_reward, 50);
    assert_eq!(restored.reward_reserve, 50);
}

#[test]
fn bounced_unstake_restores_stake() {
    let s = staked(alice(), 2_000, T0);
    let (s, fx) = step(&s, &ctx(alice(), T0, Funds::ZERO), Command::Unstake { amount: 2_000 }).unwrap();
    assert_eq!(s.total_staked, 0);
    let s = on_bounce(&s, &ctx(alice(), T0 + 5, Funds::tai(2_000)), &fx.messages[0].body).unwrap();
    assert_eq!(s.stake_of(&alice()), 2_000);
    assert_eq!(s.total_staked, 2_000);
}

#[test]
fn withdraw_slashed_sweeps_to_treasury() {
    let s = staked(alice(), 1_000, T0);
    let (s, _) = step(
        &s,
        &ctx(market(), T0, Funds::ZERO),
        Command::ApplySlash {
            market_id: 1,
            seq: 0,
            entries: vec![Entry::new(alice(), 100)],
        },
    )
    .unwrap();
    let (s, fx) = step(&s, &ctx(admin(), T0, Funds::ZERO), Command::WithdrawSlashed).unwrap();
    assert_eq!(s.slashed_pool, 0);
    assert_eq!(fx.messages[0].to, Address::from_label("treasury"));
    assert_eq!(fx.messages[0].value, Funds::tai(100));
    assert_eq!(
        rejected(step(&s, &ctx(admin(), T0, Funds::ZERO), Command::WithdrawSlashed)),
        ErrorCode::NothingToClaim
    );
}

#[test]
fn quota_takes_minimum_and_cap() {
    let mut s = staked(alice(), 10_000, T0);
    let (next, _) = step(&s, &ctx(bob(), T0, Funds::tai(90_000)), Command::Stake { amount: 90_000 }).unwrap();
    s = next;
    let later = T0 + 30 * SECONDS_PER_DAY;
    // stake-days = 300_000 → 1% = 3_000; amount ratio 100% = 10_000; cap 10% of 100_000.
    assert_eq!(s.whitelist_quota(&alice(), later).unwrap(), 3_000);
    // bob: stake-days 2_700_000 → 27_000; amount 90_000; cap 10_000.
    assert_eq!(s.whitelist_quota(&bob(), later).unwrap(), 10_000);
    assert_eq!(s.whitelist_quota(&Address::from_label("nobody"), later).unwrap(), 0);
}

#[test]
fn record_participation_accumulates_points() {
    let s = base();
    let (s, _) = step(
        &s,
        &ctx(market(), T0, Funds::ZERO),
        Command::RecordParticipation { target: alice(), points: 7 },
    )
    .unwrap();
    let (s, _) = step(
        &s,
        &ctx(market(), T0, Funds::ZERO),
        Command::RecordParticipation { target: alice(), points: 3 },
    )
    .unwrap();
    assert_eq!(s.info(&alice()).unwrap().points, 10);
}

#[derive(Debug, Clone)]
enum Op {
    Stake(u128),
    Unstake(u128),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u128..5_000).prop_map(Op::Stake),
        (0u128..5_000).prop_map(Op::Unstake),
    ]
}

proptest! {
    #[test]
    fn stake_never_exceeds_net_deposits(ops in proptest::collection::vec(op(), 1..60)) {
        let mut s = base();
        let mut deposited: u128 = 0;
        let mut withdrawn: u128 = 0;
        let mut now = T0;
        for op in ops {
            now += 3_600;
            match op {
                Op::Stake(a) => {
                    if let Ok((next, _)) = step(&s, &ctx(alice(), now, Funds::tai(a)), Command::Stake { amount: a }) {
                        deposited += a;
                        s = next;
                    }
                }
                Op::Unstake(a) => {
                    if let Ok((next, _)) = step(&s, &ctx(alice(), now, Funds::ZERO), Command::Unstake { amount: a }) {
                        withdrawn += a;
                        s = next;
                    }
                }
            }
            prop_assert!(check_invariants(&s).is_ok());
            prop_assert_eq!(s.stake_of(&alice()), deposited - withdrawn);
        }
    }
}
