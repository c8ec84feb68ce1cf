//! # Ledger Keys
//!
//! Ed25519 keypairs for the accounts that sign ledger transactions. In
//! practice that is one account: the administrative signer the node is
//! started with. Issuers sign their own certificate payloads with RSA
//! (see [`super::signatures`]); those keys never touch this module.
//!
//! ## Addresses
//!
//! An account address is `SHA3-256(public_key || 0x00)`, rendered as
//! `0x`-prefixed hex. This is the ledger's own authentication-key rule, so
//! the address we query and sign for is the one the fullnode knows. The trailing scheme byte marks single-key Ed25519
//! accounts, so a future multi-key scheme cannot collide with it.
//!
//! Key bytes are never logged. `Debug` prints the public half only.

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::hash::sha3_256_multi;
use crate::ledger::types::AccountAddress;

/// Scheme byte appended to the public key before hashing it into an address.
const ED25519_SCHEME: u8 = 0x00;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* parsing failed.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 bytes of hex")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes of hex")]
    InvalidSignature,
}

/// An Ed25519 keypair that signs ledger transactions.
///
/// Intentionally does not implement `Serialize`. Exporting a secret key
/// should be a conscious call to [`LedgerKeypair::secret_key_bytes`].
pub struct LedgerKeypair {
    signing_key: SigningKey,
}

/// The public half of a [`LedgerKeypair`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerPublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSignature {
    bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// LedgerKeypair
// ---------------------------------------------------------------------------

impl LedgerKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed. Handy in tests.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a hex-encoded 32-byte secret key, with or without a `0x` prefix.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns the public key for this keypair.
    pub fn public_key(&self) -> LedgerPublicKey {
        LedgerPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// The ledger account address controlled by this keypair.
    pub fn address(&self) -> AccountAddress {
        self.public_key().address()
    }

    /// Sign a message. Ed25519 is deterministic: same key, same message,
    /// same signature.
    pub fn sign(&self, message: &[u8]) -> LedgerSignature {
        LedgerSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Exports the raw 32-byte secret key. Don't log it.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for LedgerKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerKeypair(address={})", self.address())
    }
}

// ---------------------------------------------------------------------------
// LedgerPublicKey
// ---------------------------------------------------------------------------

impl LedgerPublicKey {
    /// Parse a hex-encoded public key and check that it is a valid curve point.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidPublicKey)?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex encoding without prefix. 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Derives the account address: `SHA3-256(public_key || scheme)`.
    pub fn address(&self) -> AccountAddress {
        AccountAddress::new(sha3_256_multi(&[&self.bytes, &[ED25519_SCHEME]]))
    }

    /// Returns `true` if `signature` is a valid Ed25519 signature over
    /// `message` by this key. Malformed input is just `false`.
    pub fn verify(&self, message: &[u8], signature: &LedgerSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature.bytes.as_slice()) else {
            return false;
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }
}

impl fmt::Display for LedgerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for LedgerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// LedgerSignature
// ---------------------------------------------------------------------------

impl LedgerSignature {
    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex encoding without prefix. 128 characters for a well-formed signature.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parse a hex-encoded signature; must decode to exactly 64 bytes.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != 64 {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Debug for LedgerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "LedgerSignature({}…)", &hex_str[..hex_str.len().min(16)])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
