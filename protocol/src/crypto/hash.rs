//! # Hashing Utilities
//!
//! Fingerprints and transaction hashes are SHA-256, so a verifier holding
//! nothing but `sha256sum` can recompute them. Account addresses are the
//! one exception: the ledger derives those with SHA3-256, and so do we.

use sha2::{Digest, Sha256};
use sha3::Sha3_256;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use certichain_protocol::crypto::sha256;
///
/// let hash = sha256(b"CertiChain");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    sha256_array(data).to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// SHA-256 over several parts fed in order, without concatenating them
/// into a temporary buffer first.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// SHA3-256 over several parts fed in order. Only used for account addresses.
pub fn sha3_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Lower-case hex SHA-256 digest. 64 characters.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_array(data))
}
