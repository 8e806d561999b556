use super::command::Command;
use super::invariants::{check_invariants, check_market};
use super::state::{ChunkStatus, MarketStatus, State};
use super::step::{on_bounce, step};
use crate::bus::MsgContext;
use crate::config::MarketConfig;
use crate::contracts::staking::{Command as StakingCommand, SettlementKind};
use crate::contracts::Effects;
use crate::types::{Entry, Side};
use crate::wire::{Payout, PayoutReason, WireMessage};
use crate::{Address, ErrorCode, Funds, TaiError};
use proptest::prelude::*;

const T0: u64 = 1_700_000_000;
const CLOSE: u64 = T0 + 1_000;

fn admin() -> Address {
    Address::from_label("market-admin")
}

fn treasury() -> Address {
    Address::from_label("treasury")
}

fn staking() -> Address {
    Address::from_label("staking")
}

fn creator() -> Address {
    Address::from_label("creator")
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
    State::init(admin(), treasury(), staking(), MarketConfig::default())
}

fn rejected(res: Result<(State, Effects), TaiError>) -> ErrorCode {
    res.map(|_| ()).unwrap_err().code()
}

fn apply(s: &State, sender: Address, now: u64, value: Funds, cmd: Command) -> (State, Effects) {
    step(s, &ctx(sender, now, value), cmd).unwrap()
}

fn created(fee_bps: u16) -> State {
    let cmd = Command::CreateMarket {
        close_time: CLOSE,
        creator_stake: 5_000,
        fee_bps,
        metadata: "will it rain".into(),
    };
    apply(&base(), creator(), T0, Funds::tai(5_000), cmd).0
}

fn bet(s: &State, who: Address, side: Side, amount: u128) -> State {
    let cmd = Command::PlaceBet {
        market_id: 1,
        side: side as u8,
        amount,
    };
    apply(s, who, T0 + 10, Funds::tai(amount), cmd).0
}

fn locked(s: &State) -> State {
    apply(s, bob(), CLOSE, Funds::ZERO, Command::LockMarket { market_id: 1 }).0
}

fn resolve_cmd(outcome: Side) -> Command {
    Command::ResolveMarket {
        market_id: 1,
        outcome: outcome as u8,
        creator_penalty: 0,
        reward_payouts: Vec::new(),
        slash_list: Vec::new(),
    }
}

/// Market 1 with 1_000_000 on YES from alice and 800_000 on NO from bob, resolved YES.
fn resolved_yes() -> State {
    let s = created(200);
    let s = bet(&s, alice(), Side::Yes, 1_000_000);
    let s = bet(&s, bob(), Side::No, 800_000);
    let s = locked(&s);
    apply(&s, admin(), CLOSE + 1, Funds::ZERO, resolve_cmd(Side::Yes)).0
}

#[test]
fn init_satisfies_invariants() {
    assert!(check_invariants(&base()).is_ok());
}

#[test]
fn transitions_check_only_the_market_they_touch() {
    let s = bet(&created(200), alice(), Side::Yes, 1_000);
    let cmd = Command::CreateMarket {
        close_time: CLOSE,
        creator_stake: 5_000,
        fee_bps: 100,
        metadata: "second".into(),
    };
    let (mut s, _) = apply(&s, creator(), T0, Funds::tai(5_000), cmd);
    assert_eq!(s.next_market_id, 3);

    // Corrupt market 1's pool bookkeeping.
    s.markets.get_mut(&1).unwrap().yes_pool += 1;
    assert!(check_invariants(&s).is_err());
    assert!(check_market(&s, 2).is_ok());

    let on_second = Command::PlaceBet {
        market_id: 2,
        side: Side::No as u8,
        amount: 500,
    };
    assert!(step(&s, &ctx(bob(), T0 + 10, Funds::tai(500)), on_second).is_ok());
    let on_first = Command::PlaceBet {
        market_id: 1,
        side: Side::No as u8,
        amount: 500,
    };
    assert_eq!(
        rejected(step(&s, &ctx(bob(), T0 + 10, Funds::tai(500)), on_first)),
        ErrorCode::InvariantViolation
    );
}

#[test]
fn create_market_validates_inputs() {
    let s = base();
    let mk = |stake, fee, close| Command::CreateMarket {
        close_time: close,
        creator_stake: stake,
        fee_bps: fee,
        metadata: String::new(),
    };
    assert_eq!(
        rejected(step(&s, &ctx(creator(), T0, Funds::tai(999)), mk(999, 100, CLOSE))),
        ErrorCode::StakeTooLow
    );
    assert_eq!(
        rejected(step(&s, &ctx(creator(), T0, Funds::tai(5_000)), mk(5_000, 1_001, CLOSE))),
        ErrorCode::FeeTooHigh
    );
    assert_eq!(
        rejected(step(&s, &ctx(creator(), T0, Funds::tai(5_000)), mk(5_000, 100, T0))),
        ErrorCode::InvalidClose
    );
    assert_eq!(
        rejected(step(&s, &ctx(creator(), T0, Funds::tai(4_000)), mk(5_000, 100, CLOSE))),
        ErrorCode::InsufficientValue
    );
}

#[test]
fn create_market_assigns_sequential_ids() {
    let s = created(100);
    assert_eq!(s.next_market_id, 2);
    let m = s.market(1).unwrap();
    assert_eq!(m.status, MarketStatus::Open);
    assert_eq!(m.creator, creator());
    assert_eq!(m.creator_stake, 5_000);
    assert_eq!(m.reward_bps, 100);
}

#[test]
fn place_bet_records_position_and_participation() {
    let s = created(100);
    let (s, fx) = apply(
        &s,
        alice(),
        T0 + 1,
        Funds::tai(1_500),
        Command::PlaceBet {
            market_id: 1,
            side: 1,
            amount: 1_000,
        },
    );
    assert_eq!(s.market(1).unwrap().yes_pool, 1_000);
    assert_eq!(s.position(1, &alice()).yes_amount, 1_000);

    assert_eq!(fx.messages.len(), 2);
    assert_eq!(fx.messages[0].to, staking());
    assert_eq!(
        StakingCommand::decode(&fx.messages[0].body).unwrap(),
        StakingCommand::RecordParticipation {
            target: alice(),
            points: 10
        }
    );
    assert_eq!(fx.messages[1].to, alice());
    assert_eq!(fx.messages[1].value, Funds::tai(500));
}

#[test]
fn place_bet_errors() {
    let s = created(100);
    let bet = |market_id, side, amount| Command::PlaceBet {
        market_id,
        side,
        amount,
    };
    let v = Funds::tai(1_000);
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0, v), bet(9, 1, 1_000))),
        ErrorCode::MarketNotFound
    );
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0, v), bet(1, 3, 1_000))),
        ErrorCode::InvalidSide
    );
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0, v), bet(1, 1, 99))),
        ErrorCode::BetTooSmall
    );
    assert_eq!(
        rejected(step(&s, &ctx(alice(), CLOSE, v), bet(1, 1, 1_000))),
        ErrorCode::MarketClosed
    );
    let s = locked(&s);
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0, v), bet(1, 1, 1_000))),
        ErrorCode::MarketNotOpen
    );
}

#[test]
fn lock_requires_close_time_and_is_single_shot() {
    let s = created(100);
    assert_eq!(
        rejected(step(&s, &ctx(bob(), CLOSE - 1, Funds::ZERO), Command::LockMarket { market_id: 1 })),
        ErrorCode::InvalidClose
    );
    let s = locked(&s);
    assert_eq!(
        rejected(step(&s, &ctx(bob(), CLOSE, Funds::ZERO), Command::LockMarket { market_id: 1 })),
        ErrorCode::AlreadyLocked
    );
}

#[test]
fn resolve_requires_admin_and_lock() {
    let s = bet(&created(100), alice(), Side::Yes, 1_000);
    assert_eq!(
        rejected(step(&s, &ctx(admin(), CLOSE, Funds::ZERO), resolve_cmd(Side::Yes))),
        ErrorCode::MarketNotLocked
    );
    let s = locked(&s);
    assert_eq!(
        rejected(step(&s, &ctx(bob(), CLOSE, Funds::ZERO), resolve_cmd(Side::Yes))),
        ErrorCode::NotAdmin
    );
    let bad_side = Command::ResolveMarket {
        market_id: 1,
        outcome: 0,
        creator_penalty: 0,
        reward_payouts: Vec::new(),
        slash_list: Vec::new(),
    };
    assert_eq!(
        rejected(step(&s, &ctx(admin(), CLOSE, Funds::ZERO), bad_side)),
        ErrorCode::InvalidSide
    );
    let s = apply(&s, admin(), CLOSE, Funds::ZERO, resolve_cmd(Side::Yes)).0;
    assert_eq!(
        rejected(step(&s, &ctx(admin(), CLOSE, Funds::ZERO), resolve_cmd(Side::No))),
        ErrorCode::AlreadyResolved
    );
}

#[test]
fn resolve_splits_losing_pool() {
    let s = resolved_yes();
    let m = s.market(1).unwrap();
    // losing 800_000: fee 2% = 16_000, reward 1% = 8_000 (unassigned, so to fees).
    assert_eq!(m.platform_fees, 24_000);
    assert_eq!(m.reward_pool, 0);
    assert_eq!(m.payout_pool, 1_776_000);
    assert_eq!(s.fees_accrued, 24_000);
    assert_eq!(m.outcome, Some(Side::Yes));
}

#[test]
fn winner_is_paid_once() {
    let s = resolved_yes();
    let (s, fx) = apply(&s, alice(), CLOSE + 2, Funds::ZERO, Command::ClaimWinnings { market_id: 1 });
    assert_eq!(fx.messages.len(), 1);
    assert_eq!(fx.messages[0].value, Funds::tai(1_776_000));
    assert!(fx.messages[0].value.tai > 1_000_000);
    assert_eq!(
        Payout::decode(&fx.messages[0].body).unwrap().reason,
        PayoutReason::Winnings { market_id: 1 }
    );
    assert_eq!(
        rejected(step(&s, &ctx(alice(), CLOSE + 3, Funds::ZERO), Command::ClaimWinnings { market_id: 1 })),
        ErrorCode::NothingToClaim
    );
    // The losing side has nothing to claim.
    assert_eq!(
        rejected(step(&s, &ctx(bob(), CLOSE + 3, Funds::ZERO), Command::ClaimWinnings { market_id: 1 })),
        ErrorCode::NothingToClaim
    );
}

#[test]
fn claim_before_resolution_is_rejected() {
    let s = locked(&bet(&created(100), alice(), Side::Yes, 1_000));
    assert_eq!(
        rejected(step(&s, &ctx(alice(), CLOSE, Funds::ZERO), Command::ClaimWinnings { market_id: 1 })),
        ErrorCode::MarketNotResolved
    );
}

#[test]
fn bounced_winnings_reopen_claim() {
    let s = resolved_yes();
    let (claimed, fx) = apply(&s, alice(), CLOSE + 2, Funds::ZERO, Command::ClaimWinnings { market_id: 1 });
    let reopened = on_bounce(
        &claimed,
        &ctx(alice(), CLOSE + 3, Funds::tai(1_776_000)),
        &fx.messages[0].body,
    )
    .unwrap();
    assert!(!reopened.position(1, &alice()).claimed_yes);
    assert_eq!(reopened.market(1).unwrap().paid_out, 0);
    assert!(step(&reopened, &ctx(alice(), CLOSE + 4, Funds::ZERO), Command::ClaimWinnings { market_id: 1 }).is_ok());
}

#[test]
fn empty_winning_side_sends_remainder_to_fees() {
    let s = bet(&created(200), bob(), Side::No, 10_000);
    let s = locked(&s);
    let (s, _) = apply(&s, admin(), CLOSE, Funds::ZERO, resolve_cmd(Side::Yes));
    let m = s.market(1).unwrap();
    assert_eq!(m.payout_pool, 0);
    assert_eq!(m.platform_fees, 10_000);
}

#[test]
fn penalty_and_creator_stake() {
    let s = bet(&created(100), alice(), Side::Yes, 1_000);
    let s = locked(&s);
    let resolve = |penalty| Command::ResolveMarket {
        market_id: 1,
        outcome: 1,
        creator_penalty: penalty,
        reward_payouts: Vec::new(),
        slash_list: Vec::new(),
    };
    assert_eq!(
        rejected(step(&s, &ctx(admin(), CLOSE, Funds::ZERO), resolve(5_001))),
        ErrorCode::PenaltyTooHigh
    );
    assert_eq!(
        rejected(step(&s, &ctx(creator(), CLOSE, Funds::ZERO), Command::ClaimCreatorStake { market_id: 1 })),
        ErrorCode::NotDone
    );
    let (s, _) = apply(&s, admin(), CLOSE, Funds::ZERO, resolve(2_000));
    assert_eq!(s.fees_accrued, 2_000);

    assert_eq!(
        rejected(step(&s, &ctx(alice(), CLOSE, Funds::ZERO), Command::ClaimCreatorStake { market_id: 1 })),
        ErrorCode::NotCreator
    );
    let (s, fx) = apply(&s, creator(), CLOSE, Funds::ZERO, Command::ClaimCreatorStake { market_id: 1 });
    assert_eq!(fx.messages[0].value, Funds::tai(3_000));
    assert_eq!(
        rejected(step(&s, &ctx(creator(), CLOSE, Funds::ZERO), Command::ClaimCreatorStake { market_id: 1 })),
        ErrorCode::NothingToClaim
    );
}

#[test]
fn void_refunds_both_sides() {
    let s = created(100);
    let s = bet(&s, alice(), Side::Yes, 1_000);
    let s = bet(&s, alice(), Side::No, 400);
    assert_eq!(
        rejected(step(
            &s,
            &ctx(bob(), T0, Funds::ZERO),
            Command::VoidMarket {
                market_id: 1,
                reason: "dup".into()
            }
        )),
        ErrorCode::NotAdmin
    );
    let (s, _) = apply(
        &s,
        admin(),
        T0 + 20,
        Funds::ZERO,
        Command::VoidMarket {
            market_id: 1,
            reason: "duplicate question".into(),
        },
    );
    assert_eq!(s.market(1).unwrap().status, MarketStatus::Void);

    let (s, fx) = apply(&s, alice(), T0 + 30, Funds::ZERO, Command::ClaimWinnings { market_id: 1 });
    assert_eq!(fx.messages[0].value, Funds::tai(1_400));
    assert_eq!(
        Payout::decode(&fx.messages[0].body).unwrap().reason,
        PayoutReason::BetRefund { market_id: 1 }
    );
    assert_eq!(
        rejected(step(&s, &ctx(alice(), T0 + 31, Funds::ZERO), Command::ClaimWinnings { market_id: 1 })),
        ErrorCode::NothingToClaim
    );

    // The creator takes the full stake back.
    let (_, fx) = apply(&s, creator(), T0 + 40, Funds::ZERO, Command::ClaimCreatorStake { market_id: 1 });
    assert_eq!(fx.messages[0].value, Funds::tai(5_000));

    assert_eq!(
        rejected(step(
            &s,
            &ctx(admin(), T0, Funds::ZERO),
            Command::VoidMarket {
                market_id: 1,
                reason: String::new()
            }
        )),
        ErrorCode::AlreadyResolved
    );
}

#[test]
fn withdraw_fees_and_bounce_restores() {
    let s = resolved_yes();
    assert_eq!(
        rejected(step(&s, &ctx(bob(), CLOSE, Funds::ZERO), Command::WithdrawFees)),
        ErrorCode::NotAdmin
    );
    let (s, fx) = apply(&s, admin(), CLOSE, Funds::ZERO, Command::WithdrawFees);
    assert_eq!(fx.messages[0].to, treasury());
    assert_eq!(fx.messages[0].value, Funds::tai(24_000));
    assert_eq!(
        rejected(step(&s, &ctx(admin(), CLOSE, Funds::ZERO), Command::WithdrawFees)),
        ErrorCode::NoFees
    );
    let s = on_bounce(&s, &ctx(treasury(), CLOSE, Funds::tai(24_000)), &fx.messages[0].body).unwrap();
    assert_eq!(s.fees_accrued, 24_000);
}

fn resolved_with_settlement(chunk: usize) -> (State, Effects) {
    let mut cfg = MarketConfig::default();
    cfg.max_entries_per_message = chunk;
    let s = State::init(admin(), treasury(), staking(), cfg);
    let (s, _) = apply(
        &s,
        creator(),
        T0,
        Funds::tai(5_000),
        Command::CreateMarket {
            close_time: CLOSE,
            creator_stake: 5_000,
            fee_bps: 100,
            metadata: String::new(),
        },
    );
    let s = bet(&s, alice(), Side::Yes, 10_000);
    let s = bet(&s, bob(), Side::No, 100_000);
    let s = locked(&s);
    let jurors: Vec<Entry> = (0..5)
        .map(|i| Entry::new(Address::from_label(&format!("juror-{i}")), 100))
        .collect();
    let cmd = Command::ResolveMarket {
        market_id: 1,
        outcome: Side::Yes as u8,
        creator_penalty: 0,
        reward_payouts: jurors.clone(),
        slash_list: jurors[..3].to_vec(),
    };
    apply(&s, admin(), CLOSE, Funds::ZERO, cmd)
}

#[test]
fn settlement_is_chunked_and_tracked() {
    let (s, fx) = resolved_with_settlement(2);
    let m = s.market(1).unwrap();
    // reward pool 1% of 100_000 = 1_000, 500 assigned; remainder to fees.
    assert_eq!(m.reward_pool, 500);
    assert_eq!(m.platform_fees, 1_000 + 500);
    assert_eq!(m.settlement.len(), 5);
    assert!(m.settlement.iter().all(|c| c.status == ChunkStatus::Sent));

    let rewards: Vec<_> = fx
        .messages
        .iter()
        .filter_map(|o| match StakingCommand::decode(&o.body) {
            Ok(StakingCommand::CreditRewards { seq, reward, entries, .. }) => {
                assert_eq!(o.value, Funds::tai(reward));
                Some((seq, entries.len()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(rewards, vec![(0, 2), (1, 2), (2, 1)]);
}

#[test]
fn reward_payouts_cannot_exceed_pool() {
    let s = bet(&created(100), alice(), Side::Yes, 1_000);
    let s = bet(&s, bob(), Side::No, 1_000);
    let s = locked(&s);
    let cmd = Command::ResolveMarket {
        market_id: 1,
        outcome: 1,
        creator_penalty: 0,
        reward_payouts: vec![Entry::new(bob(), 11)],
        slash_list: Vec::new(),
    };
    assert_eq!(
        rejected(step(&s, &ctx(admin(), CLOSE, Funds::ZERO), cmd)),
        ErrorCode::RewardExceedsPool
    );
}

#[test]
fn acks_and_retry() {
    let (s, _) = resolved_with_settlement(2);
    let ack = |kind, seq| Command::SettlementAck {
        market_id: 1,
        kind,
        seq,
    };
    assert_eq!(
        rejected(step(&s, &ctx(bob(), CLOSE, Funds::ZERO), ack(SettlementKind::Reward, 0))),
        ErrorCode::NotStaking
    );

    let mut s = s;
    for (kind, seq) in [
        (SettlementKind::Reward, 0),
        (SettlementKind::Reward, 2),
        (SettlementKind::Slash, 0),
        (SettlementKind::Slash, 1),
    ] {
        s = apply(&s, staking(), CLOSE, Funds::ZERO, ack(kind, seq)).0;
    }
    // Acks are idempotent.
    let again = apply(&s, staking(), CLOSE, Funds::ZERO, ack(SettlementKind::Slash, 1)).0;
    assert_eq!(again, s);

    let (s, fx) = apply(&s, admin(), CLOSE, Funds::ZERO, Command::RetrySettlement { market_id: 1 });
    assert_eq!(fx.messages.len(), 1);
    assert_eq!(fx.messages[0].value, Funds::tai(200));

    let s = apply(&s, staking(), CLOSE, Funds::ZERO, ack(SettlementKind::Reward, 1)).0;
    assert_eq!(
        rejected(step(&s, &ctx(admin(), CLOSE, Funds::ZERO), Command::RetrySettlement { market_id: 1 })),
        ErrorCode::NothingToRetry
    );
}

#[test]
fn bounced_chunk_is_marked() {
    let (s, fx) = resolved_with_settlement(32);
    let reward = fx
        .messages
        .iter()
        .find(|o| o.value.tai > 0)
        .unwrap();
    let s = on_bounce(&s, &ctx(staking(), CLOSE, reward.value), &reward.body).unwrap();
    let chunk = &s.market(1).unwrap().settlement[0];
    assert_eq!(chunk.kind, SettlementKind::Reward);
    assert_eq!(chunk.status, ChunkStatus::Bounced);
}

#[test]
fn update_config_and_transfer_admin() {
    let s = base();
    let cmd = Command::UpdateConfig {
        treasury: Some(bob()),
        staking: None,
    };
    assert_eq!(
        rejected(step(&s, &ctx(bob(), T0, Funds::ZERO), cmd.clone())),
        ErrorCode::NotAdmin
    );
    let (s, _) = apply(&s, admin(), T0, Funds::ZERO, cmd);
    assert_eq!(s.treasury, bob());
    assert_eq!(s.staking, staking());
    let (s, _) = apply(&s, admin(), T0, Funds::ZERO, Command::TransferAdmin { new_admin: bob() });
    assert_eq!(s.admin, bob());
}

proptest! {
    #[test]
    fn payouts_never_exceed_pool(
        bets in proptest::collection::vec((0usize..4, 1u8..=2, 100u128..1_000_000), 1..24),
        outcome in 1u8..=2,
        fee_bps in 0u16..=1_000,
    ) {
        let bettors: Vec<Address> = (0..4).map(|i| Address::from_label(&format!("bettor-{i}"))).collect();
        let mut s = created(fee_bps);
        for (who, side, amount) in &bets {
            let cmd = Command::PlaceBet { market_id: 1, side: *side, amount: *amount };
            s = step(&s, &ctx(bettors[*who], T0 + 1, Funds::tai(*amount)), cmd).unwrap().0;
        }
        s = locked(&s);
        let cmd = Command::ResolveMarket {
            market_id: 1,
            outcome,
            creator_penalty: 0,
            reward_payouts: Vec::new(),
            slash_list: Vec::new(),
        };
        s = step(&s, &ctx(admin(), CLOSE, Funds::ZERO), cmd).unwrap().0;

        let mut paid: u128 = 0;
        for b in &bettors {
            if let Ok((next, fx)) = step(&s, &ctx(*b, CLOSE, Funds::ZERO), Command::ClaimWinnings { market_id: 1 }) {
                paid += fx.messages.iter().map(|o| o.value.tai).sum::<u128>();
                s = next;
            }
        }
        let m = s.market(1).unwrap();
        prop_assert!(paid <= m.payout_pool);
        prop_assert_eq!(paid, m.paid_out);
        prop_assert!(paid + m.platform_fees <= m.yes_pool + m.no_pool);
        prop_assert!(check_invariants(&s).is_ok());
    }
}
