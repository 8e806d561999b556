//! Wiring of the whole economy onto one bus.
//!
//! [`Deployment`] fixes the address of every contract and operator role; [`Deployment::deploy`]
//! registers the six actors, mints genesis balances and links the staking ledger to the
//! prediction market. [`AnyCommand`] is the tagged union of every contract's inbound command,
//! used by scenario files and the fuzzer.

use crate::bus::{Bus, Delivery};
use crate::contracts::market::{self, MarketActor};
use crate::contracts::oracle::{self, OracleActor};
use crate::contracts::staking::{self, StakingActor};
use crate::contracts::supply::{self, SupplyActor};
use crate::contracts::unlock::{self, UnlockActor};
use crate::contracts::vesting::{self, VestingActor};
use crate::wire::{peek_opcode, WireError, WireMessage};
use crate::{Address, Funds, Result, TaiConfig, TaiError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Contract and role addresses of one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub admin: Address,
    pub treasury: Address,
    /// Receives vesting releases.
    pub beneficiary: Address,
    pub oracle: Address,
    pub unlock: Address,
    pub staking: Address,
    pub market: Address,
    pub supply: Address,
    pub vesting: Address,
}

impl Default for Deployment {
    fn default() -> Self {
        Self::labelled()
    }
}

impl Deployment {
    pub const ROLES: [&'static str; 9] = [
        "admin",
        "treasury",
        "beneficiary",
        "oracle",
        "unlock",
        "staking",
        "market",
        "supply",
        "vesting",
    ];

    /// Every address derived from its role name with [`Address::from_label`].
    pub fn labelled() -> Self {
        Self {
            admin: Address::from_label("admin"),
            treasury: Address::from_label("treasury"),
            beneficiary: Address::from_label("beneficiary"),
            oracle: Address::from_label("oracle"),
            unlock: Address::from_label("unlock"),
            staking: Address::from_label("staking"),
            market: Address::from_label("market"),
            supply: Address::from_label("supply"),
            vesting: Address::from_label("vesting"),
        }
    }

    /// Address of a role by name (`"market"`, `"treasury"`, ...).
    pub fn role(&self, name: &str) -> Option<Address> {
        Some(match name {
            "admin" => self.admin,
            "treasury" => self.treasury,
            "beneficiary" => self.beneficiary,
            "oracle" => self.oracle,
            "unlock" => self.unlock,
            "staking" => self.staking,
            "market" => self.market,
            "supply" => self.supply,
            "vesting" => self.vesting,
            _ => return None,
        })
    }

    /// Resolve a role name, `@label` or `<workchain>:<hex>` address.
    pub fn resolve(&self, target: &str) -> Result<Address> {
        match self.role(target) {
            Some(addr) => Ok(addr),
            None => target.parse(),
        }
    }

    /// Register every contract on a fresh bus and mint genesis.
    ///
    /// The supply ledger receives the total supply; the unlock controller receives its locked
    /// allocation. The admin then points the staking ledger at the prediction market.
    pub fn deploy(&self, config: &TaiConfig) -> Result<Bus> {
        config.validate()?;
        let mut bus = Bus::new(config.bus.clone());

        bus.register(Box::new(OracleActor::new(
            self.oracle,
            self.admin,
            config.oracle.clone(),
        )))?;
        bus.register(Box::new(UnlockActor::new(
            self.unlock,
            self.admin,
            self.treasury,
            config.unlock.clone(),
        )))?;
        bus.register(Box::new(StakingActor::new(
            self.staking,
            self.admin,
            self.treasury,
            config.staking.clone(),
        )))?;
        bus.register(Box::new(MarketActor::new(
            self.market,
            self.admin,
            self.treasury,
            self.staking,
            config.market.clone(),
        )))?;
        bus.register(Box::new(SupplyActor::new(
            self.supply,
            self.admin,
            self.vesting,
            config.supply.clone(),
        )))?;
        bus.register(Box::new(VestingActor::new(
            self.vesting,
            self.admin,
            self.supply,
            self.beneficiary,
            config.vesting.clone(),
        )))?;

        bus.mint(self.supply, Funds::tai(config.supply.total_supply))?;
        bus.mint(self.unlock, Funds::tai(config.unlock.total_locked))?;

        let link = staking::Command::SetPredictionMarket {
            market: self.market,
        };
        let id = bus.send_external(self.admin, self.staking, Funds::ZERO, link.encode())?;
        bus.run_until_idle()?;
        if bus.status(id) != Some(Delivery::Delivered) {
            return Err(TaiError::InvariantViolation("staking ledger refused its market link"));
        }

        info!(
            total_supply = %config.supply.total_supply,
            unlock_locked = %config.unlock.total_locked,
            "economy deployed"
        );
        Ok(bus)
    }

    /// Which contract decodes `cmd`.
    pub fn target_of(&self, cmd: &AnyCommand) -> Address {
        match cmd {
            AnyCommand::Oracle(_) => self.oracle,
            AnyCommand::Unlock(_) => self.unlock,
            AnyCommand::Staking(_) => self.staking,
            AnyCommand::Market(_) => self.market,
            AnyCommand::Supply(_) => self.supply,
            AnyCommand::Vesting(_) => self.vesting,
        }
    }
}

/// Inbound command of any contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyCommand {
    Oracle(oracle::Command),
    Unlock(unlock::Command),
    Staking(staking::Command),
    Market(market::Command),
    Supply(supply::Command),
    Vesting(vesting::Command),
}

impl AnyCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AnyCommand::Oracle(c) => c.name(),
            AnyCommand::Unlock(c) => c.name(),
            AnyCommand::Staking(c) => c.name(),
            AnyCommand::Market(c) => c.name(),
            AnyCommand::Supply(c) => c.name(),
            AnyCommand::Vesting(c) => c.name(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            AnyCommand::Oracle(c) => c.encode(),
            AnyCommand::Unlock(c) => c.encode(),
            AnyCommand::Staking(c) => c.encode(),
            AnyCommand::Market(c) => c.encode(),
            AnyCommand::Supply(c) => c.encode(),
            AnyCommand::Vesting(c) => c.encode(),
        }
    }

    /// Decode with whichever contract codec owns the body's opcode.
    pub fn decode(body: &[u8]) -> std::result::Result<Self, WireError> {
        let opcode = peek_opcode(body).ok_or(WireError::TooShort)?;
        if oracle::Command::OPCODES.contains(&opcode) {
            oracle::Command::decode(body).map(AnyCommand::Oracle)
        } else if unlock::Command::OPCODES.contains(&opcode) {
            unlock::Command::decode(body).map(AnyCommand::Unlock)
        } else if staking::Command::OPCODES.contains(&opcode) {
            staking::Command::decode(body).map(AnyCommand::Staking)
        } else if market::Command::OPCODES.contains(&opcode) {
            market::Command::decode(body).map(AnyCommand::Market)
        } else if supply::Command::OPCODES.contains(&opcode) {
            supply::Command::decode(body).map(AnyCommand::Supply)
        } else if vesting::Command::OPCODES.contains(&opcode) {
            vesting::Command::decode(body).map(AnyCommand::Vesting)
        } else {
            Err(WireError::UnknownOpcode(opcode))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::staking::StakingActor;

    #[test]
    fn deploy_links_staking_to_market_and_conserves() {
        let d = Deployment::labelled();
        let config = TaiConfig::default();
        let bus = d.deploy(&config).unwrap();

        let ledger = bus.actor::<StakingActor>(&d.staking).unwrap();
        assert_eq!(ledger.state().prediction_market, Some(d.market));
        assert_eq!(bus.balance(&d.supply).tai, config.supply.total_supply);
        assert_eq!(bus.balance(&d.unlock).tai, config.unlock.total_locked);
        assert_eq!(bus.actor_states().len(), 6);
        bus.check_conservation().unwrap();
    }

    #[test]
    fn resolve_accepts_roles_labels_and_raw_addresses() {
        let d = Deployment::labelled();
        assert_eq!(d.resolve("market").unwrap(), d.market);
        assert_eq!(d.resolve("@alice").unwrap(), Address::from_label("alice"));
        let raw = d.treasury.to_string();
        assert_eq!(d.resolve(&raw).unwrap(), d.treasury);
        assert!(d.resolve("nobody").is_err());
        for role in Deployment::ROLES {
            assert!(d.role(role).is_some(), "{role}");
        }
    }

    #[test]
    fn any_command_routes_by_opcode() {
        let cmd = AnyCommand::Market(market::Command::WithdrawFees);
        let body = cmd.encode();
        assert_eq!(AnyCommand::decode(&body).unwrap(), cmd);
        assert_eq!(Deployment::labelled().target_of(&cmd), Deployment::labelled().market);

        let cmd = AnyCommand::Supply(supply::Command::RequestLockedSupply);
        assert_eq!(AnyCommand::decode(&cmd.encode()).unwrap(), cmd);

        assert!(matches!(
            AnyCommand::decode(&0xDEAD_BEEFu32.to_be_bytes()),
            Err(WireError::UnknownOpcode(0xDEAD_BEEF))
        ));
        assert!(AnyCommand::decode(&[0x54]).is_err());
    }

    #[test]
    fn any_command_json_is_tagged_by_contract() {
        let json = r#"{"staking":{"Stake":{"amount":5000}}}"#;
        let cmd: AnyCommand = serde_json::from_str(json).unwrap();
        assert_eq!(cmd, AnyCommand::Staking(staking::Command::Stake { amount: 5_000 }));
        assert_eq!(cmd.name(), "stake");
    }
}
