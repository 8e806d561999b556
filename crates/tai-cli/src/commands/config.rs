//! `tai config` and `tai codes` command implementations

use anyhow::{Context, Result};
use std::path::PathBuf;
use tai_core::{ErrorCode, TaiConfig};

use super::load_config;

pub fn show(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

pub fn validate(file: PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read config {}", file.display()))?;

    match TaiConfig::from_json(&content) {
        Ok(config) => {
            println!("✅ Configuration valid");
            println!("   Unlock rounds: {}", config.unlock.rounds);
            println!("   Locked supply: {}", config.unlock.total_locked);
            println!("   Min stake: {}", config.staking.min_stake_amount);
            println!("   Max market fee: {} bps", config.market.max_fee_bps);
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration invalid");
            println!("   Error: {}", e);
            anyhow::bail!("invalid configuration: {e}")
        }
    }
}

pub fn codes() -> Result<()> {
    for code in ErrorCode::ALL {
        println!("{:>4}  {:<28} {:?}", code.code(), code.as_str(), code.kind());
    }
    Ok(())
}
