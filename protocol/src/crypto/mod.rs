//! # Cryptographic Primitives for CertiChain
//!
//! Three jobs, three sets of primitives:
//!
//! - **Ed25519** signs ledger transactions on behalf of the admin account.
//! - **SHA-256** derives certificate fingerprints and transaction hashes.
//! - **RSA-PSS (SHA-256)** verifies issuer signatures over certificate
//!   payloads, offline, with no ledger involved.
//!
//! Everything here is a thin, typed wrapper around audited crates. Nothing
//! in this module logs key material, salts, or signatures.

pub mod fingerprint;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use fingerprint::{Fingerprint, FingerprintDeriver, FingerprintError, FingerprintSalt};
pub use hash::{sha256, sha256_array, sha256_hex};
pub use keys::{LedgerKeypair, LedgerPublicKey, LedgerSignature};
pub use signatures::{sign_payload, verify_signature};
