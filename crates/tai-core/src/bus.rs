//! Actor runtime.
//!
//! The bus owns every account balance and a FIFO queue of in-flight messages. Delivering a
//! message credits its value to the receiver and, when the receiver is a registered actor,
//! runs its handler. A failing bounceable message is returned to the sender together with its
//! value; a failing non-bounceable message leaves the value with the receiver.
//!
//! Per asset: `Σ balances + in_flight == genesis` at every point between deliveries.

use crate::config::BusConfig;
use crate::types::Timestamp;
use crate::wire::{self, Payout, PayoutReason, WireMessage};
use crate::{Address, ErrorCode, Funds, Result, TaiError};
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, instrument, warn};

pub type MessageId = u64;

/// Final or current state of a message as seen by its sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Delivered,
    /// Rejected and returned to the sender with its value.
    Bounced { code: u16 },
    /// Rejected without bounce; the value stays with the receiver.
    Rejected { code: u16 },
    /// Queued, or dropped in transit.
    Pending,
}

/// Handler inputs for one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgContext {
    pub now: Timestamp,
    pub sender: Address,
    /// Value attached to this message.
    pub value: Funds,
    /// Receiver balance including `value`.
    pub balance: Funds,
}

/// Message emitted by a handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub to: Address,
    pub value: Funds,
    pub body: Vec<u8>,
    pub bounceable: bool,
}

impl Outbound {
    pub fn new(to: Address, value: Funds, body: Vec<u8>) -> Self {
        Self {
            to,
            value,
            body,
            bounceable: true,
        }
    }

    pub fn non_bounceable(to: Address, value: Funds, body: Vec<u8>) -> Self {
        Self {
            to,
            value,
            body,
            bounceable: false,
        }
    }

    /// Value transfer to a wallet, tagged with why it was sent.
    pub fn payout(to: Address, value: Funds, reason: PayoutReason) -> Self {
        Self::new(to, value, Payout::new(reason).encode())
    }

    /// Plain non-bounceable transfer: overpayment or duplicate-delivery refunds.
    pub fn change(to: Address, value: Funds) -> Self {
        Self::non_bounceable(to, value, Vec::new())
    }
}

/// Fail with `INSUFFICIENT_BALANCE` when the outbound value exceeds what the handler holds.
pub fn ensure_affordable(ctx: &MsgContext, out: &[Outbound]) -> Result<()> {
    let total = out
        .iter()
        .try_fold(Funds::ZERO, |acc, o| acc.checked_add(o.value))?;
    if !ctx.balance.covers(&total) {
        return Err(TaiError::Rejected(ErrorCode::InsufficientBalance));
    }
    Ok(())
}

/// An independently addressed contract.
///
/// Implementations must be transactional: on `Err` the actor state is untouched.
pub trait Actor: Any {
    fn address(&self) -> Address;

    fn name(&self) -> &'static str;

    /// Opcode sets this actor decodes; checked for collisions on registration.
    fn opcodes(&self) -> Vec<&'static [u32]>;

    fn receive(&mut self, ctx: &MsgContext, body: &[u8]) -> Result<Vec<Outbound>>;

    /// A message this actor sent was rejected; `ctx.value` is the returned value.
    fn on_bounce(&mut self, _ctx: &MsgContext, _code: u16, _original: &[u8]) -> Result<Vec<Outbound>> {
        Ok(Vec::new())
    }

    /// Persisted state, for reports.
    fn state_json(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone, Debug)]
struct Envelope {
    id: MessageId,
    from: Address,
    to: Address,
    value: Funds,
    body: Vec<u8>,
    bounceable: bool,
    is_bounce: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultMatch {
    Id(MessageId),
    Opcode(u32),
    To(Address),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultAction {
    /// Lose the message; its value stays in flight.
    Drop,
    /// Deliver it and replay it once more, charged to the sender again.
    Duplicate,
}

/// Transport fault injected into matching messages, `times` occurrences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultRule {
    pub matcher: FaultMatch,
    pub action: FaultAction,
    pub times: u32,
}

impl FaultRule {
    pub fn drop(matcher: FaultMatch) -> Self {
        Self {
            matcher,
            action: FaultAction::Drop,
            times: 1,
        }
    }

    pub fn duplicate(matcher: FaultMatch) -> Self {
        Self {
            matcher,
            action: FaultAction::Duplicate,
            times: 1,
        }
    }

    fn matches(&self, env: &Envelope) -> bool {
        match self.matcher {
            FaultMatch::Id(id) => env.id == id,
            FaultMatch::Opcode(op) => !env.is_bounce && wire::peek_opcode(&env.body) == Some(op),
            FaultMatch::To(addr) => env.to == addr,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: MessageId,
    pub at: Timestamp,
    pub from: Address,
    pub to: Address,
    pub opcode: Option<u32>,
    pub value: Funds,
    pub bounce: bool,
    pub outcome: LogOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutcome {
    Delivered,
    Bounced { code: u16 },
    Rejected { code: u16 },
    Dropped,
    Duplicated { copy: MessageId },
}

pub struct Bus {
    config: BusConfig,
    now: Timestamp,
    next_id: MessageId,
    actors: BTreeMap<Address, Box<dyn Actor>>,
    balances: BTreeMap<Address, Funds>,
    queue: VecDeque<Envelope>,
    in_flight: Funds,
    genesis: Funds,
    statuses: HashMap<MessageId, Delivery>,
    faults: Vec<FaultRule>,
    log: Vec<LogEntry>,
}

impl Bus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            now: config.start_time,
            config,
            next_id: 1,
            actors: BTreeMap::new(),
            balances: BTreeMap::new(),
            queue: VecDeque::new(),
            in_flight: Funds::ZERO,
            genesis: Funds::ZERO,
            statuses: HashMap::new(),
            faults: Vec::new(),
            log: Vec::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn advance(&mut self, secs: u64) {
        self.now = self.now.saturating_add(secs);
    }

    /// Move the clock forward to `ts`; the clock never goes back.
    pub fn set_now(&mut self, ts: Timestamp) {
        self.now = self.now.max(ts);
    }

    pub fn register(&mut self, actor: Box<dyn Actor>) -> Result<()> {
        let address = actor.address();
        if self.actors.contains_key(&address) {
            return Err(TaiError::Config(format!("actor already registered at {address}")));
        }
        wire::check_opcode_set(&actor.opcodes())?;
        info!(actor = actor.name(), address = %address.short(), "actor registered");
        self.actors.insert(address, actor);
        Ok(())
    }

    /// Create value out of nothing at genesis.
    pub fn mint(&mut self, to: Address, value: Funds) -> Result<()> {
        self.genesis = self.genesis.checked_add(value)?;
        self.credit(to, value)
    }

    pub fn balance(&self, addr: &Address) -> Funds {
        self.balances.get(addr).copied().unwrap_or_default()
    }

    pub fn genesis(&self) -> Funds {
        self.genesis
    }

    pub fn in_flight(&self) -> Funds {
        self.in_flight
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn status(&self, id: MessageId) -> Option<Delivery> {
        self.statuses.get(&id).copied()
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn add_fault(&mut self, rule: FaultRule) {
        self.faults.push(rule);
    }

    pub fn actor<T: Actor>(&self, addr: &Address) -> Option<&T> {
        self.actors.get(addr)?.as_any().downcast_ref::<T>()
    }

    pub fn actor_states(&self) -> BTreeMap<String, serde_json::Value> {
        self.actors
            .values()
            .map(|a| (a.name().to_string(), a.state_json()))
            .collect()
    }

    /// `Σ balances + in_flight == genesis`, per asset.
    pub fn check_conservation(&self) -> Result<()> {
        let held = self
            .balances
            .values()
            .try_fold(Funds::ZERO, |acc, f| acc.checked_add(*f))?;
        if held.checked_add(self.in_flight)? != self.genesis {
            return Err(TaiError::InvariantViolation("value not conserved"));
        }
        Ok(())
    }

    /// Send a bounceable message from a wallet.
    pub fn send_external(&mut self, from: Address, to: Address, value: Funds, body: Vec<u8>) -> Result<MessageId> {
        self.send_from(from, Outbound::new(to, value, body))
    }

    /// Send an arbitrary message from `from`, debiting its balance.
    pub fn send_from(&mut self, from: Address, msg: Outbound) -> Result<MessageId> {
        self.debit(from, msg.value)?;
        self.enqueue(from, msg.to, msg.value, msg.body, msg.bounceable, false)
    }

    fn credit(&mut self, to: Address, value: Funds) -> Result<()> {
        let entry = self.balances.entry(to).or_default();
        *entry = entry.checked_add(value)?;
        Ok(())
    }

    fn debit(&mut self, from: Address, value: Funds) -> Result<()> {
        let current = self.balance(&from);
        let next = current.checked_sub(value)?;
        self.balances.insert(from, next);
        Ok(())
    }

    fn enqueue(
        &mut self,
        from: Address,
        to: Address,
        value: Funds,
        body: Vec<u8>,
        bounceable: bool,
        is_bounce: bool,
    ) -> Result<MessageId> {
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight = self.in_flight.checked_add(value)?;
        self.statuses.insert(id, Delivery::Pending);
        self.queue.push_back(Envelope {
            id,
            from,
            to,
            value,
            body,
            bounceable,
            is_bounce,
        });
        Ok(id)
    }

    fn record(&mut self, env: &Envelope, outcome: LogOutcome) {
        if !self.config.record_log {
            return;
        }
        self.log.push(LogEntry {
            id: env.id,
            at: self.now,
            from: env.from,
            to: env.to,
            opcode: if env.is_bounce { None } else { wire::peek_opcode(&env.body) },
            value: env.value,
            bounce: env.is_bounce,
            outcome,
        });
    }

    fn take_fault(&mut self, env: &Envelope) -> Option<FaultAction> {
        let idx = self.faults.iter().position(|f| f.times > 0 && f.matches(env))?;
        let action = self.faults[idx].action;
        self.faults[idx].times -= 1;
        if self.faults[idx].times == 0 {
            self.faults.remove(idx);
        }
        Some(action)
    }

    /// Deliver the next queued message. Returns `false` when the queue is empty.
    pub fn step(&mut self) -> Result<bool> {
        let Some(env) = self.queue.pop_front() else {
            return Ok(false);
        };

        match self.take_fault(&env) {
            Some(FaultAction::Drop) => {
                warn!(id = env.id, to = %env.to.short(), "message dropped in transit");
                self.record(&env, LogOutcome::Dropped);
                return Ok(true);
            }
            Some(FaultAction::Duplicate) => {
                let value = if self.balance(&env.from).covers(&env.value) {
                    env.value
                } else {
                    Funds::ZERO
                };
                self.debit(env.from, value)?;
                let copy = self.enqueue(env.from, env.to, value, env.body.clone(), env.bounceable, env.is_bounce)?;
                warn!(id = env.id, copy, "message duplicated in transit");
                self.record(&env, LogOutcome::Duplicated { copy });
            }
            None => {}
        }

        self.deliver(env)?;
        Ok(true)
    }

    /// Deliver until the queue drains or `max_steps` deliveries have run.
    pub fn run_until_idle(&mut self) -> Result<usize> {
        let mut steps = 0usize;
        while self.step()? {
            steps += 1;
            if steps >= self.config.max_steps && !self.queue.is_empty() {
                return Err(TaiError::InvariantViolation("bus step limit exceeded"));
            }
        }
        Ok(steps)
    }

    #[instrument(level = "debug", skip_all, fields(id = env.id, to = %env.to.short(), bounce = env.is_bounce))]
    fn deliver(&mut self, env: Envelope) -> Result<()> {
        self.in_flight = self.in_flight.checked_sub(env.value)?;
        self.credit(env.to, env.value)?;
        let ctx = MsgContext {
            now: self.now,
            sender: env.from,
            value: env.value,
            balance: self.balance(&env.to),
        };

        let Some(actor) = self.actors.get_mut(&env.to) else {
            self.statuses.insert(env.id, Delivery::Delivered);
            self.record(&env, LogOutcome::Delivered);
            return Ok(());
        };

        if env.is_bounce {
            let outbound = match wire::parse_bounce(&env.body) {
                Some((code, original)) => match actor.on_bounce(&ctx, code, original) {
                    Ok(out) => out,
                    Err(e) => {
                        warn!(actor = actor.name(), error = %e, "bounce handler failed");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            self.statuses.insert(env.id, Delivery::Delivered);
            self.record(&env, LogOutcome::Delivered);
            return self.dispatch(env.to, &ctx, outbound);
        }

        if env.body.is_empty() {
            debug!(actor = actor.name(), "plain transfer credited");
            self.statuses.insert(env.id, Delivery::Delivered);
            self.record(&env, LogOutcome::Delivered);
            return Ok(());
        }

        match actor.receive(&ctx, &env.body) {
            Ok(outbound) => {
                debug!(actor = actor.name(), emitted = outbound.len(), "message accepted");
                self.statuses.insert(env.id, Delivery::Delivered);
                self.record(&env, LogOutcome::Delivered);
                self.dispatch(env.to, &ctx, outbound)
            }
            Err(e) => {
                let code = e.code().code();
                info!(actor = actor.name(), code = e.code().as_str(), "message rejected");
                if env.bounceable {
                    self.debit(env.to, env.value)?;
                    let bounce = wire::encode_bounce(code, &env.body);
                    self.enqueue(env.to, env.from, env.value, bounce, false, true)?;
                    self.statuses.insert(env.id, Delivery::Bounced { code });
                    self.record(&env, LogOutcome::Bounced { code });
                } else {
                    self.statuses.insert(env.id, Delivery::Rejected { code });
                    self.record(&env, LogOutcome::Rejected { code });
                }
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, from: Address, ctx: &MsgContext, outbound: Vec<Outbound>) -> Result<()> {
        if outbound.is_empty() {
            return Ok(());
        }
        let post_handler = MsgContext {
            balance: self.balance(&from),
            ..*ctx
        };
        if ensure_affordable(&post_handler, &outbound).is_err() {
            return Err(TaiError::InvariantViolation("actor emitted more value than it holds"));
        }
        for msg in outbound {
            self.send_from(from, msg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECHO_OP: u32 = 0x0E00_0001;
    const FAIL_OP: u32 = 0x0E00_0002;

    /// Forwards its inbound value back to the sender; rejects FAIL_OP.
    struct Echo {
        address: Address,
        seen: u32,
        bounces: Vec<u16>,
    }

    impl Actor for Echo {
        fn address(&self) -> Address {
            self.address
        }

        fn name(&self) -> &'static str {
            "echo"
        }

        fn opcodes(&self) -> Vec<&'static [u32]> {
            vec![&[ECHO_OP, FAIL_OP]]
        }

        fn receive(&mut self, ctx: &MsgContext, body: &[u8]) -> Result<Vec<Outbound>> {
            match wire::peek_opcode(body) {
                Some(ECHO_OP) => {
                    self.seen += 1;
                    let out = vec![Outbound::change(ctx.sender, ctx.value)];
                    ensure_affordable(ctx, &out)?;
                    Ok(out)
                }
                Some(FAIL_OP) => Err(TaiError::Rejected(ErrorCode::NotAdmin)),
                _ => Err(TaiError::Rejected(ErrorCode::UnknownOpcode)),
            }
        }

        fn on_bounce(&mut self, _ctx: &MsgContext, code: u16, _original: &[u8]) -> Result<Vec<Outbound>> {
            self.bounces.push(code);
            Ok(Vec::new())
        }

        fn state_json(&self) -> serde_json::Value {
            serde_json::json!({ "seen": self.seen })
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn setup() -> (Bus, Address, Address) {
        let mut bus = Bus::new(BusConfig::default());
        let echo = Address::from_label("echo");
        let user = Address::from_label("user");
        bus.register(Box::new(Echo {
            address: echo,
            seen: 0,
            bounces: Vec::new(),
        }))
        .unwrap();
        bus.mint(user, Funds { native: 50, tai: 100 }).unwrap();
        (bus, echo, user)
    }

    fn body(op: u32) -> Vec<u8> {
        op.to_be_bytes().to_vec()
    }

    #[test]
    fn delivered_message_runs_handler_and_conserves() {
        let (mut bus, echo, user) = setup();
        let id = bus.send_external(user, echo, Funds::tai(40), body(ECHO_OP)).unwrap();
        assert_eq!(bus.status(id), Some(Delivery::Pending));
        bus.run_until_idle().unwrap();
        assert_eq!(bus.status(id), Some(Delivery::Delivered));
        assert_eq!(bus.balance(&user), Funds { native: 50, tai: 100 });
        assert_eq!(bus.actor::<Echo>(&echo).unwrap().seen, 1);
        bus.check_conservation().unwrap();
    }

    #[test]
    fn rejected_message_bounces_value_back() {
        let (mut bus, echo, user) = setup();
        let id = bus.send_external(user, echo, Funds::tai(40), body(FAIL_OP)).unwrap();
        bus.run_until_idle().unwrap();
        assert_eq!(
            bus.status(id),
            Some(Delivery::Bounced { code: ErrorCode::NotAdmin.code() })
        );
        assert_eq!(bus.balance(&user).tai, 100);
        assert_eq!(bus.balance(&echo), Funds::ZERO);
        bus.check_conservation().unwrap();
    }

    #[test]
    fn non_bounceable_failure_keeps_value_at_receiver() {
        let (mut bus, echo, user) = setup();
        let id = bus
            .send_from(user, Outbound::non_bounceable(echo, Funds::tai(10), body(FAIL_OP)))
            .unwrap();
        bus.run_until_idle().unwrap();
        assert_eq!(bus.status(id), Some(Delivery::Rejected { code: 101 }));
        assert_eq!(bus.balance(&echo).tai, 10);
        bus.check_conservation().unwrap();
    }

    #[test]
    fn dropped_message_stays_in_flight() {
        let (mut bus, echo, user) = setup();
        bus.add_fault(FaultRule::drop(FaultMatch::Opcode(ECHO_OP)));
        let id = bus.send_external(user, echo, Funds::tai(30), body(ECHO_OP)).unwrap();
        bus.run_until_idle().unwrap();
        assert_eq!(bus.status(id), Some(Delivery::Pending));
        assert_eq!(bus.in_flight().tai, 30);
        bus.check_conservation().unwrap();
    }

    #[test]
    fn duplicate_is_charged_to_sender() {
        let (mut bus, echo, user) = setup();
        bus.add_fault(FaultRule::duplicate(FaultMatch::To(echo)));
        bus.send_external(user, echo, Funds::tai(30), body(ECHO_OP)).unwrap();
        bus.run_until_idle().unwrap();
        assert_eq!(bus.actor::<Echo>(&echo).unwrap().seen, 2);
        assert_eq!(bus.balance(&user).tai, 100);
        bus.check_conservation().unwrap();
    }

    #[test]
    fn external_send_requires_balance() {
        let (mut bus, echo, user) = setup();
        assert_eq!(
            bus.send_external(user, echo, Funds::tai(101), body(ECHO_OP)),
            Err(TaiError::Rejected(ErrorCode::InsufficientBalance))
        );
    }

    #[test]
    fn plain_transfer_to_actor_is_credited() {
        let (mut bus, echo, user) = setup();
        bus.send_external(user, echo, Funds::native(5), Vec::new()).unwrap();
        bus.run_until_idle().unwrap();
        assert_eq!(bus.balance(&echo).native, 5);
        assert_eq!(bus.actor::<Echo>(&echo).unwrap().seen, 0);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let (mut bus, echo, _) = setup();
        let again = Echo {
            address: echo,
            seen: 0,
            bounces: Vec::new(),
        };
        assert!(bus.register(Box::new(again)).is_err());
    }
}
