//! Whitelist merkle tree (binary, duplicate-last).
//!
//! Leaves commit to `(beneficiary, quota)`. Contracts only see the [`MerkleVerifier`] trait;
//! the tree builder is used by the CLI and tests to produce roots and proofs.

use crate::hash::{sha256_domain, WHITELIST_LEAF_DOMAIN_V1, WHITELIST_NODE_DOMAIN_V1};
use crate::types::Amount;
use crate::{Address, Hash32};
use serde::{Deserialize, Serialize};

/// Inclusion proof: sibling hashes from leaf to root and the leaf index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub siblings: Vec<Hash32>,
    pub index: u64,
}

/// Proof verification seam used by the unlock controller.
pub trait MerkleVerifier {
    fn verify(&self, proof: &MerkleProof, leaf: &Hash32, root: &Hash32) -> bool;
}

/// SHA-256 verifier matching [`build_tree`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Verifier;

impl MerkleVerifier for Sha256Verifier {
    fn verify(&self, proof: &MerkleProof, leaf: &Hash32, root: &Hash32) -> bool {
        // Sibling count bounds the index: a proof of depth d addresses at most 2^d leaves.
        if proof.siblings.len() < 64 && proof.index >> proof.siblings.len() != 0 {
            return false;
        }
        let mut current = *leaf;
        let mut index = proof.index;
        for sibling in &proof.siblings {
            current = if index % 2 == 0 {
                node(&current, sibling)
            } else {
                node(sibling, &current)
            };
            index /= 2;
        }
        current == *root
    }
}

pub fn whitelist_leaf(beneficiary: &Address, quota: Amount) -> Hash32 {
    let mut buf = [0u8; 1 + 32 + 16];
    buf[0] = beneficiary.workchain as u8;
    buf[1..33].copy_from_slice(&beneficiary.hash.0);
    buf[33..].copy_from_slice(&quota.to_be_bytes());
    sha256_domain(WHITELIST_LEAF_DOMAIN_V1, &buf)
}

pub fn node(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut cat = [0u8; 64];
    cat[..32].copy_from_slice(&left.0);
    cat[32..].copy_from_slice(&right.0);
    sha256_domain(WHITELIST_NODE_DOMAIN_V1, &cat)
}

/// All tree levels, leaves first. Odd levels duplicate their last node.
pub fn build_tree(leaves: &[Hash32]) -> Vec<Vec<Hash32>> {
    if leaves.is_empty() {
        return Vec::new();
    }
    let mut levels = vec![leaves.to_vec()];
    while let Some(level) = levels.last() {
        if level.len() == 1 {
            break;
        }
        let next: Vec<Hash32> = level
            .chunks(2)
            .map(|pair| node(&pair[0], pair.get(1).unwrap_or(&pair[0])))
            .collect();
        levels.push(next);
    }
    levels
}

pub fn root(levels: &[Vec<Hash32>]) -> Option<Hash32> {
    levels.last().and_then(|top| top.first()).copied()
}

pub fn proof_for(levels: &[Vec<Hash32>], leaf_index: usize) -> Option<MerkleProof> {
    if levels.first().map_or(true, |l| leaf_index >= l.len()) {
        return None;
    }
    let mut siblings = Vec::new();
    let mut index = leaf_index;
    for level in levels.iter().take(levels.len() - 1) {
        let sibling = if index % 2 == 0 { index + 1 } else { index - 1 };
        siblings.push(level.get(sibling).copied().unwrap_or(level[index]));
        index /= 2;
    }
    Some(MerkleProof {
        siblings,
        index: leaf_index as u64,
    })
}

/// Root plus one proof per entry, in input order.
pub fn build_whitelist(entries: &[(Address, Amount)]) -> Option<(Hash32, Vec<MerkleProof>)> {
    let leaves: Vec<Hash32> = entries.iter().map(|(a, q)| whitelist_leaf(a, *q)).collect();
    let levels = build_tree(&leaves);
    let root = root(&levels)?;
    let proofs = (0..leaves.len())
        .map(|i| proof_for(&levels, i))
        .collect::<Option<Vec<_>>>()?;
    Some((root, proofs))
}
