use crate::Hash32;
use sha2::{Digest, Sha256};

/// Compute a deterministic SHA-256 hash of a byte slice.
pub fn sha256(data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash32(hasher.finalize().into())
}

/// Compute a domain-separated SHA-256 hash: `H(domain || data)`.
pub fn sha256_domain(domain: &[u8], data: &[u8]) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    Hash32(hasher.finalize().into())
}

// =============================================================================
// Domain separation (v1)
// =============================================================================

/// Derivation of deterministic addresses from labels.
pub const ADDRESS_LABEL_DOMAIN_V1: &[u8] = b"TAI_ADDRESS_LABEL_V1";

/// Whitelist merkle leaves `(beneficiary, quota)`.
pub const WHITELIST_LEAF_DOMAIN_V1: &[u8] = b"TAI_WL_LEAF_V1";

/// Whitelist merkle interior nodes.
pub const WHITELIST_NODE_DOMAIN_V1: &[u8] = b"TAI_WL_NODE_V1";

/// Hash of a serialized actor state, used by the CLI report.
pub const STATE_DIGEST_DOMAIN_V1: &[u8] = b"TAI_STATE_DIGEST_V1";

pub fn state_digest_v1(state_bytes: &[u8]) -> Hash32 {
    sha256_domain(STATE_DIGEST_DOMAIN_V1, state_bytes)
}
