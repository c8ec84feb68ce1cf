//! # Certificate Fingerprints
//!
//! A fingerprint is the on-ledger lookup key for a certificate:
//!
//! ```text
//! fingerprint = hex( SHA-256( identifier || salt ) )
//! ```
//!
//! `identifier` is the opaque issuance id handed to the client (the
//! fingerprint seed). `salt` is a process-wide secret from configuration.
//! Because the derivation is deterministic, the node never has to store a
//! fingerprint: anyone holding the seed can ask the node to recompute it,
//! and nobody without the salt can walk from a fingerprint back to a seed.
//!
//! The salt never appears in records, responses, logs, or `Debug` output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::hash::sha256_multi;
use crate::config::{ConfigError, FINGERPRINT_HEX_LENGTH, MIN_SALT_LENGTH};

/// Errors produced while deriving or parsing fingerprints.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("fingerprint identifier must not be empty")]
    EmptyIdentifier,

    #[error("fingerprint must be {FINGERPRINT_HEX_LENGTH} lower-case hex characters")]
    Malformed,
}

// ---------------------------------------------------------------------------
// FingerprintSalt
// ---------------------------------------------------------------------------

/// Secret salt mixed into every fingerprint.
#[derive(Clone, PartialEq, Eq)]
pub struct FingerprintSalt(Vec<u8>);

impl FingerprintSalt {
    /// Wraps salt bytes, rejecting anything shorter than [`MIN_SALT_LENGTH`].
    pub fn new(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() < MIN_SALT_LENGTH {
            return Err(ConfigError::SaltTooShort {
                min: MIN_SALT_LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for FingerprintSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FingerprintSalt([REDACTED; {}])", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// A derived fingerprint: 64 lower-case hex characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Fingerprint {
    type Err = FingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == FINGERPRINT_HEX_LENGTH
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(FingerprintError::Malformed);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.0[..12])
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derives a fingerprint from an identifier and a salt.
///
/// Pure and deterministic. The only failure is an empty identifier.
pub fn fingerprint(identifier: &str, salt: &FingerprintSalt) -> Result<Fingerprint, FingerprintError> {
    if identifier.is_empty() {
        return Err(FingerprintError::EmptyIdentifier);
    }
    let digest = sha256_multi(&[identifier.as_bytes(), salt.as_bytes()]);
    Ok(Fingerprint(hex::encode(digest)))
}

/// Holds the configured salt so callers don't pass it around.
#[derive(Debug, Clone)]
pub struct FingerprintDeriver {
    salt: FingerprintSalt,
}

impl FingerprintDeriver {
    pub fn new(salt: FingerprintSalt) -> Self {
        Self { salt }
    }

    /// See [`fingerprint`].
    pub fn derive(&self, identifier: &str) -> Result<Fingerprint, FingerprintError> {
        fingerprint(identifier, &self.salt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::sha256_hex;

    fn salt() -> FingerprintSalt {
        FingerprintSalt::new(b"unit-test-salt-0123456789".to_vec()).unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let d = FingerprintDeriver::new(salt());
        assert_eq!(
            d.derive("60f1c0ffee").unwrap(),
            d.derive("60f1c0ffee").unwrap()
        );
    }

    #[test]
    fn distinct_identifiers_diverge() {
        let d = FingerprintDeriver::new(salt());
        assert_ne!(d.derive("a").unwrap(), d.derive("b").unwrap());
    }

    #[test]
    fn matches_sha256_of_identifier_then_salt() {
        let fp = fingerprint("60f1c0ffee", &salt()).unwrap();
        let expected = sha256_hex(b"60f1c0ffeeunit-test-salt-0123456789");
        assert_eq!(fp.as_str(), expected);
    }

    #[test]
    fn salt_changes_output() {
        let other = FingerprintSalt::new(b"another-salt-entirely".to_vec()).unwrap();
        assert_ne!(
            fingerprint("id", &salt()).unwrap(),
            fingerprint("id", &other).unwrap()
        );
    }

    #[test]
    fn empty_identifier_rejected() {
        assert_eq!(
            fingerprint("", &salt()).unwrap_err(),
            FingerprintError::EmptyIdentifier
        );
    }

    #[test]
    fn output_never_contains_salt() {
        let fp = fingerprint("id", &salt()).unwrap();
        assert!(!fp.as_str().contains("unit-test-salt"));
        assert!(!format!("{:?}", salt()).contains("unit-test-salt"));
    }

    #[test]
    fn parse_validates_shape() {
        let fp = fingerprint("id", &salt()).unwrap();
        assert_eq!(fp.as_str().parse::<Fingerprint>().unwrap(), fp);
        assert!("ABC".parse::<Fingerprint>().is_err());
        assert!("G".repeat(64).parse::<Fingerprint>().is_err());
        assert!("A".repeat(64).parse::<Fingerprint>().is_err());
    }

    #[test]
    fn serde_rejects_malformed() {
        let fp = fingerprint("id", &salt()).unwrap();
        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(serde_json::from_str::<Fingerprint>(&json).unwrap(), fp);
        assert!(serde_json::from_str::<Fingerprint>("\"nope\"").is_err());
    }
}
