//! `tai merkle` command implementation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tai_core::merkle::{build_whitelist, MerkleProof};
use tai_core::{Address, Amount, Hash32};

use super::read_json;

/// One whitelist allocation.
#[derive(Clone, Debug, Deserialize)]
pub struct WhitelistEntry {
    /// `@label` or `<workchain>:<hex>`.
    pub address: Address,
    pub quota: Amount,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProofRecord {
    pub address: Address,
    pub quota: Amount,
    pub proof: MerkleProof,
}

#[derive(Clone, Debug, Serialize)]
pub struct WhitelistTree {
    pub root: Hash32,
    pub entries: Vec<ProofRecord>,
}

pub fn build(entries: &[WhitelistEntry]) -> Result<WhitelistTree> {
    let pairs: Vec<(Address, Amount)> = entries.iter().map(|e| (e.address, e.quota)).collect();
    let (root, proofs) = build_whitelist(&pairs).context("whitelist has no entries")?;
    Ok(WhitelistTree {
        root,
        entries: entries
            .iter()
            .zip(proofs)
            .map(|(e, proof)| ProofRecord {
                address: e.address,
                quota: e.quota,
                proof,
            })
            .collect(),
    })
}

pub fn run(entries: PathBuf, format: String) -> Result<()> {
    let list: Vec<WhitelistEntry> = read_json(&entries)?;
    let tree = build(&list)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }

    println!("🌳 Whitelist root: {}", tree.root.to_hex());
    println!("   Entries: {}", tree.entries.len());
    println!();
    for record in &tree.entries {
        println!("   {} quota={}", record.address, record.quota);
        println!("     index: {}", record.proof.index);
        for sibling in &record.proof.siblings {
            println!("     sibling: {}", sibling.to_hex());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tai_core::merkle::{whitelist_leaf, MerkleVerifier, Sha256Verifier};

    #[test]
    fn proofs_verify_against_the_root() {
        let json = r#"[
            {"address": "@alice", "quota": 1000},
            {"address": "@bob", "quota": 500},
            {"address": "@carol", "quota": 250}
        ]"#;
        let list: Vec<WhitelistEntry> = serde_json::from_str(json).unwrap();
        let tree = build(&list).unwrap();
        assert_eq!(tree.entries.len(), 3);
        for r in &tree.entries {
            let leaf = whitelist_leaf(&r.address, r.quota);
            assert!(Sha256Verifier.verify(&r.proof, &leaf, &tree.root));
        }
    }

    #[test]
    fn empty_whitelist_is_an_error() {
        assert!(build(&[]).is_err());
    }

    #[test]
    fn json_output_uses_hex_hashes() {
        let list = vec![WhitelistEntry {
            address: Address::from_label("alice"),
            quota: 7,
        }];
        let tree = build(&list).unwrap();
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["root"], serde_json::json!(tree.root.to_hex()));
    }
}
