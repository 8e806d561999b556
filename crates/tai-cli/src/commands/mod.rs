//! CLI Command Implementations

pub mod config;
pub mod merkle;
pub mod simulate;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tai_core::TaiConfig;

/// Load config from a file, or from `TAI_*` environment variables over the defaults.
pub fn load_config(path: Option<PathBuf>) -> Result<TaiConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            TaiConfig::from_json(&content)
                .with_context(|| format!("Invalid config {}", path.display()))
        }
        None => TaiConfig::from_env().context("Invalid configuration from environment"),
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"market": {{"max_fee_bps": 500}}, "unlock": {{"rounds": 4, "total_locked": 400}}}}"#).unwrap();
        let config = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.market.max_fee_bps, 500);
        assert_eq!(config.unlock.rounds, 4);
        assert_eq!(config.staking, TaiConfig::default().staking);
    }

    #[test]
    fn invalid_config_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"market": {{"max_fee_bps": 20000}}}}"#).unwrap();
        assert!(load_config(Some(file.path().to_path_buf())).is_err());
        assert!(load_config(Some(PathBuf::from("/nonexistent/tai.json"))).is_err());
    }
}
