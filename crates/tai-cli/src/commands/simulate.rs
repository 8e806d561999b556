//! `tai simulate` command implementation
//!
//! A scenario deploys the economy on a fresh bus, funds wallets, then runs its steps in order.
//! Each `send` may carry an expected outcome (`"delivered"`, `"pending"` or an error code name
//! such as `"NOTHING_TO_CLAIM"`); any mismatch fails the run after the report is printed.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tai_core::bus::{FaultAction, FaultMatch, FaultRule, LogEntry};
use tai_core::hash::state_digest_v1;
use tai_core::{Amount, AnyCommand, Bus, Delivery, Deployment, ErrorCode, Funds, Hash32, TaiConfig};
use tracing::{debug, info};

use super::{load_config, read_json};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    /// Overrides the configuration loaded from `--config` / the environment.
    #[serde(default)]
    pub config: Option<TaiConfig>,

    #[serde(default)]
    pub wallets: Vec<Wallet>,

    pub steps: Vec<Step>,
}

/// Genesis balance for a wallet.
#[derive(Debug, Clone, Deserialize)]
pub struct Wallet {
    pub address: String,
    #[serde(default)]
    pub tai: Amount,
    #[serde(default)]
    pub native: Amount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Move the logical clock forward.
    Advance { seconds: u64 },
    /// Send a contract command and run the bus until idle.
    Send(SendStep),
    /// Plain value transfer (empty body).
    Transfer {
        from: String,
        to: String,
        #[serde(default)]
        tai: Amount,
        #[serde(default)]
        native: Amount,
    },
    /// Inject a transport fault for later messages.
    Fault(FaultStep),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendStep {
    pub from: String,
    /// Defaults to the contract that owns the command.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub tai: Amount,
    #[serde(default)]
    pub native: Amount,
    pub command: AnyCommand,
    #[serde(default)]
    pub expect: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Drop,
    Duplicate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaultStep {
    pub action: FaultKind,
    #[serde(default)]
    pub opcode: Option<u32>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default = "one")]
    pub times: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub action: String,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: Option<String>,
    pub steps: Vec<StepReport>,
    pub balances: BTreeMap<String, Funds>,
    pub in_flight: Funds,
    pub conserved: bool,
    pub states: BTreeMap<String, serde_json::Value>,
    /// Domain-separated hash of each actor's serialized state.
    pub digests: BTreeMap<String, Hash32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<LogEntry>>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

fn describe(status: Delivery) -> String {
    let name = |code: u16| ErrorCode::from_u16(code).map_or("UNKNOWN", |c| c.as_str());
    match status {
        Delivery::Delivered => "delivered".into(),
        Delivery::Pending => "pending".into(),
        Delivery::Bounced { code } => format!("bounced {}", name(code)),
        Delivery::Rejected { code } => format!("rejected {}", name(code)),
    }
}

fn meets(expect: &str, status: Delivery) -> bool {
    match status {
        Delivery::Delivered => expect == "delivered",
        Delivery::Pending => expect == "pending",
        Delivery::Bounced { code } | Delivery::Rejected { code } => {
            ErrorCode::from_u16(code).is_some_and(|c| c.as_str() == expect)
        }
    }
}

fn run_send(bus: &mut Bus, d: &Deployment, s: &SendStep) -> Result<(String, Delivery)> {
    let from = d.resolve(&s.from)?;
    let to = match &s.to {
        Some(t) => d.resolve(t)?,
        None => d.target_of(&s.command),
    };
    let value = Funds {
        native: s.native,
        tai: s.tai,
    };
    let id = bus
        .send_external(from, to, value, s.command.encode())
        .with_context(|| format!("{} cannot fund {:?}", s.from, value))?;
    bus.run_until_idle()?;
    let status = bus.status(id).unwrap_or(Delivery::Pending);
    Ok((format!("{} from {}", s.command.name(), s.from), status))
}

fn fault_rule(d: &Deployment, f: &FaultStep) -> Result<FaultRule> {
    let matcher = match (f.opcode, &f.to) {
        (Some(op), _) => FaultMatch::Opcode(op),
        (None, Some(to)) => FaultMatch::To(d.resolve(to)?),
        (None, None) => bail!("fault step needs an opcode or a target"),
    };
    let action = match f.action {
        FaultKind::Drop => FaultAction::Drop,
        FaultKind::Duplicate => FaultAction::Duplicate,
    };
    Ok(FaultRule {
        matcher,
        action,
        times: f.times.max(1),
    })
}

/// Deploy, fund and run every step of `scenario`.
pub fn execute(scenario: &Scenario, base: TaiConfig, with_log: bool) -> Result<Report> {
    let config = scenario.config.clone().unwrap_or(base);
    let d = Deployment::labelled();
    let mut bus = d.deploy(&config)?;

    for w in &scenario.wallets {
        let addr = d.resolve(&w.address)?;
        bus.mint(
            addr,
            Funds {
                native: w.native,
                tai: w.tai,
            },
        )?;
    }

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (i, step) in scenario.steps.iter().enumerate() {
        let index = i + 1;
        let report = match step {
            Step::Advance { seconds } => {
                bus.advance(*seconds);
                StepReport {
                    index,
                    action: format!("advance {seconds}s"),
                    outcome: format!("now {}", bus.now()),
                    expected: None,
                    ok: true,
                }
            }
            Step::Send(s) => {
                let (action, status) =
                    run_send(&mut bus, &d, s).with_context(|| format!("step {index}"))?;
                let ok = s.expect.as_deref().map_or(true, |e| meets(e, status));
                StepReport {
                    index,
                    action,
                    outcome: describe(status),
                    expected: s.expect.clone(),
                    ok,
                }
            }
            Step::Transfer {
                from,
                to,
                tai,
                native,
            } => {
                let value = Funds {
                    native: *native,
                    tai: *tai,
                };
                let id = bus
                    .send_external(d.resolve(from)?, d.resolve(to)?, value, Vec::new())
                    .with_context(|| format!("step {index}"))?;
                bus.run_until_idle()?;
                StepReport {
                    index,
                    action: format!("transfer {from} -> {to}"),
                    outcome: describe(bus.status(id).unwrap_or(Delivery::Pending)),
                    expected: None,
                    ok: true,
                }
            }
            Step::Fault(f) => {
                bus.add_fault(fault_rule(&d, f).with_context(|| format!("step {index}"))?);
                StepReport {
                    index,
                    action: format!("fault {:?}", f.action).to_lowercase(),
                    outcome: "armed".into(),
                    expected: None,
                    ok: true,
                }
            }
        };
        debug!(step = index, action = %report.action, outcome = %report.outcome, "scenario step");
        steps.push(report);
    }

    let mut balances = BTreeMap::new();
    for role in Deployment::ROLES {
        if let Some(addr) = d.role(role) {
            balances.insert(role.to_string(), bus.balance(&addr));
        }
    }
    for w in &scenario.wallets {
        balances.insert(w.address.clone(), bus.balance(&d.resolve(&w.address)?));
    }

    let states = bus.actor_states();
    let digests = states
        .iter()
        .map(|(name, state)| Ok((name.clone(), state_digest_v1(&serde_json::to_vec(state)?))))
        .collect::<Result<BTreeMap<_, _>>>()?;

    let report = Report {
        name: scenario.name.clone(),
        steps,
        balances,
        in_flight: bus.in_flight(),
        conserved: bus.check_conservation().is_ok(),
        states,
        digests,
        log: with_log.then(|| bus.log().to_vec()),
    };
    info!(
        steps = report.steps.len(),
        failures = report.failures(),
        conserved = report.conserved,
        "scenario finished"
    );
    Ok(report)
}

pub fn run(
    scenario_path: PathBuf,
    format: String,
    with_log: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let base = load_config(config_path)?;
    let scenario: Scenario = read_json(&scenario_path)?;
    let report = execute(&scenario, base, with_log)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_human(&report);
    }

    let failures = report.failures();
    if failures > 0 {
        bail!("{failures} step(s) did not meet their expectation");
    }
    if !report.conserved {
        bail!("value was not conserved");
    }
    Ok(())
}

fn print_human(report: &Report) {
    println!(
        "🧪 Scenario: {}",
        report.name.as_deref().unwrap_or("(unnamed)")
    );
    println!();
    for s in &report.steps {
        let mark = if s.ok { "✅" } else { "❌" };
        match &s.expected {
            Some(e) if !s.ok => println!(
                "   {mark} {:>3}. {} -> {} (expected {e})",
                s.index, s.action, s.outcome
            ),
            _ => println!("   {mark} {:>3}. {} -> {}", s.index, s.action, s.outcome),
        }
    }
    println!();
    println!("💰 Balances");
    for (name, funds) in &report.balances {
        if !funds.is_zero() {
            println!("   {:<16} tai={} native={}", name, funds.tai, funds.native);
        }
    }
    if !report.in_flight.is_zero() {
        println!(
            "   {:<16} tai={} native={}",
            "(in flight)", report.in_flight.tai, report.in_flight.native
        );
    }
    println!();
    let verdict = if report.conserved { "✅ conserved" } else { "❌ NOT conserved" };
    println!("⚖️  Value: {verdict}");
    println!();
    println!("🔏 State digests");
    for (name, digest) in &report.digests {
        println!("   {:<16} {}", name, digest.to_hex());
    }
    if let Some(log) = &report.log {
        println!();
        println!("📜 Delivery log ({} messages)", log.len());
        for e in log {
            println!(
                "   #{:<4} {} -> {} op={} {:?}",
                e.id,
                e.from.short(),
                e.to.short(),
                e.opcode.map_or("-".to_string(), |op| format!("{op:#010x}")),
                e.outcome
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../../../demos/market_round.json");

    fn scenario(json: &str) -> Scenario {
        serde_json::from_str(json).expect("scenario json")
    }

    #[test]
    fn demo_scenario_meets_every_expectation() {
        let report = execute(&scenario(DEMO), TaiConfig::default(), true).unwrap();
        assert_eq!(report.failures(), 0, "{:#?}", report.steps);
        assert!(report.conserved);
        assert_eq!(report.balances["@alice"].tai, 1_776_000);
        // Platform fees plus the swept juror slash.
        assert_eq!(report.balances["treasury"].tai, 24_000 + 1_000);
        assert!(report.log.as_ref().is_some_and(|l| !l.is_empty()));
        assert_eq!(report.states.len(), 6);
        assert_eq!(report.digests.len(), 6);
    }

    #[test]
    fn state_digests_are_deterministic_and_track_state() {
        let first = execute(&scenario(DEMO), TaiConfig::default(), false).unwrap();
        let second = execute(&scenario(DEMO), TaiConfig::default(), false).unwrap();
        assert_eq!(first.digests, second.digests);

        let idle = execute(&scenario(r#"{"steps": []}"#), TaiConfig::default(), false).unwrap();
        assert_ne!(first.digests["market"], idle.digests["market"]);
        assert_eq!(first.digests["oracle"], idle.digests["oracle"]);
    }

    #[test]
    fn unmet_expectation_is_reported() {
        let json = r#"{
            "wallets": [{"address": "@mallory", "tai": 10}],
            "steps": [
                {"send": {"from": "@mallory", "command": {"market": "WithdrawFees"}, "expect": "delivered"}},
                {"send": {"from": "@mallory", "command": {"market": "WithdrawFees"}, "expect": "NOT_ADMIN"}}
            ]
        }"#;
        let report = execute(&scenario(json), TaiConfig::default(), false).unwrap();
        assert_eq!(report.failures(), 1);
        assert!(!report.steps[0].ok);
        assert_eq!(report.steps[0].outcome, "bounced NOT_ADMIN");
        assert!(report.steps[1].ok);
        assert!(report.log.is_none());
    }

    #[test]
    fn fault_step_drops_the_next_matching_message() {
        let json = r#"{
            "wallets": [{"address": "@alice", "tai": 2000}],
            "steps": [
                {"fault": {"action": "drop", "to": "staking"}},
                {"send": {"from": "@alice", "tai": 1000, "command": {"staking": {"Stake": {"amount": 1000}}}, "expect": "pending"}},
                {"send": {"from": "@alice", "tai": 1000, "command": {"staking": {"Stake": {"amount": 1000}}}, "expect": "delivered"}}
            ]
        }"#;
        let report = execute(&scenario(json), TaiConfig::default(), false).unwrap();
        assert_eq!(report.failures(), 0, "{:#?}", report.steps);
        assert_eq!(report.in_flight, Funds::tai(1_000));
        assert_eq!(report.balances["staking"].tai, 1_000);
        assert!(report.conserved);
    }

    #[test]
    fn unfunded_send_is_an_error() {
        let json = r#"{
            "steps": [
                {"send": {"from": "@broke", "tai": 5, "command": {"staking": {"Stake": {"amount": 5}}}}}
            ]
        }"#;
        assert!(execute(&scenario(json), TaiConfig::default(), false).is_err());
    }

    #[test]
    fn fault_without_matcher_is_rejected() {
        let json = r#"{"steps": [{"fault": {"action": "duplicate"}}]}"#;
        assert!(execute(&scenario(json), TaiConfig::default(), false).is_err());
    }

    #[test]
    fn unknown_scenario_fields_are_rejected() {
        assert!(serde_json::from_str::<Scenario>(r#"{"steps": [], "stepz": []}"#).is_err());
    }
}
