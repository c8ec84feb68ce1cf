//! # Certificate Payload Signatures
//!
//! Offline verification path: an issuer signs a certificate payload with an
//! RSA key, and anyone holding the issuer's public key can check it without
//! touching the ledger.
//!
//! ## Scheme
//!
//! RSA-PSS over SHA-256 with MGF1-SHA-256. Public keys arrive as PEM, either
//! SubjectPublicKeyInfo (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC
//! KEY`). Signatures arrive base64-encoded.
//!
//! Two salt lengths are accepted on verification: the digest length (32
//! bytes, what [`sign_payload`] produces) and the maximum the modulus allows,
//! which is what OpenSSL-based signers emit by default.
//!
//! [`verify_signature`] is total. Bad PEM, bad base64, wrong key size, or a
//! forged signature all come back as `false`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

const SHA256_LEN: usize = 32;

/// Errors from the signing side. Verification never errors.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid RSA private key PEM")]
    InvalidPrivateKey,

    #[error("signing failed: {0}")]
    Signing(String),
}

fn parse_public_key(pem: &str) -> Option<RsaPublicKey> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .ok()
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, SignatureError> {
    let pem = pem.trim();
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|_| SignatureError::InvalidPrivateKey)
}

/// Largest PSS salt the key's modulus leaves room for.
fn max_salt_len(key: &RsaPublicKey) -> Option<usize> {
    let em_bits = key.n().bits().checked_sub(1)?;
    let em_len = em_bits.div_ceil(8);
    em_len.checked_sub(SHA256_LEN + 2)
}

/// Verify an RSA-PSS/SHA-256 signature over `payload`.
///
/// `signature_b64` is standard base64; `public_key_pem` is SPKI or PKCS#1 PEM.
/// Returns `false` on any failure.
pub fn verify_signature(payload: &[u8], signature_b64: &str, public_key_pem: &str) -> bool {
    let Some(key) = parse_public_key(public_key_pem) else {
        return false;
    };
    let Ok(signature) = STANDARD.decode(signature_b64.trim()) else {
        return false;
    };
    if signature.len() != key.size() {
        return false;
    }

    let digest = Sha256::digest(payload);
    let mut salt_lengths = vec![SHA256_LEN];
    if let Some(max) = max_salt_len(&key) {
        if max != SHA256_LEN {
            salt_lengths.push(max);
        }
    }

    salt_lengths.into_iter().any(|salt_len| {
        key.verify(Pss::new_with_salt::<Sha256>(salt_len), &digest, &signature)
            .is_ok()
    })
}

/// Sign `payload` with an RSA private key (PKCS#8 or PKCS#1 PEM), returning
/// a base64 RSA-PSS/SHA-256 signature with a 32-byte salt.
pub fn sign_payload(private_key_pem: &str, payload: &[u8]) -> Result<String, SignatureError> {
    let key = parse_private_key(private_key_pem)?;
    let digest = Sha256::digest(payload);
    let signature = key
        .sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), &digest)
        .map_err(|e| SignatureError::Signing(e.to_string()))?;
    Ok(STANDARD.encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use std::sync::OnceLock;

    struct TestKey {
        private_pem: String,
        public_pem: String,
        private: RsaPrivateKey,
    }

    // Key generation is slow in debug builds, so every test shares one key.
    fn test_key() -> &'static TestKey {
        static KEY: OnceLock<TestKey> = OnceLock::new();
        KEY.get_or_init(|| {
            let private = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
            let public = RsaPublicKey::from(&private);
            TestKey {
                private_pem: private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
                public_pem: public.to_public_key_pem(LineEnding::LF).unwrap(),
                private,
            }
        })
    }

    const PAYLOAD: &[u8] = br#"{"certificateId":"CERT-001","recipient":"Ada"}"#;

    #[test]
    fn sign_then_verify() {
        let key = test_key();
        let sig = sign_payload(&key.private_pem, PAYLOAD).unwrap();
        assert!(verify_signature(PAYLOAD, &sig, &key.public_pem));
    }

    #[test]
    fn tampered_payload_rejected() {
        let key = test_key();
        let sig = sign_payload(&key.private_pem, PAYLOAD).unwrap();
        let mut tampered = PAYLOAD.to_vec();
        tampered[5] ^= 0x01;
        assert!(!verify_signature(&tampered, &sig, &key.public_pem));
    }

    #[test]
    fn tampered_signature_rejected() {
        let key = test_key();
        let sig = sign_payload(&key.private_pem, PAYLOAD).unwrap();
        let mut raw = STANDARD.decode(&sig).unwrap();
        raw[0] ^= 0x80;
        assert!(!verify_signature(PAYLOAD, &STANDARD.encode(raw), &key.public_pem));
    }

    #[test]
    fn pkcs1_keys_accepted() {
        let key = test_key();
        let pkcs1_private = key.private.to_pkcs1_pem(LineEnding::LF).unwrap();
        let pkcs1_public = RsaPublicKey::from(&key.private)
            .to_pkcs1_pem(LineEnding::LF)
            .unwrap();
        let sig = sign_payload(&pkcs1_private, PAYLOAD).unwrap();
        assert!(verify_signature(PAYLOAD, &sig, &pkcs1_public));
    }

    #[test]
    fn max_salt_signatures_accepted() {
        let key = test_key();
        let public = RsaPublicKey::from(&key.private);
        let salt = max_salt_len(&public).unwrap();
        let digest = Sha256::digest(PAYLOAD);
        let raw = key
            .private
            .sign_with_rng(&mut OsRng, Pss::new_with_salt::<Sha256>(salt), &digest)
            .unwrap();
        assert!(verify_signature(PAYLOAD, &STANDARD.encode(raw), &key.public_pem));
    }

    #[test]
    fn garbage_is_false_not_panic() {
        let key = test_key();
        let sig = sign_payload(&key.private_pem, PAYLOAD).unwrap();
        assert!(!verify_signature(PAYLOAD, "%%% not base64 %%%", &key.public_pem));
        assert!(!verify_signature(PAYLOAD, &sig, "-----BEGIN PUBLIC KEY-----\nxx"));
        assert!(!verify_signature(PAYLOAD, "", ""));
        assert!(!verify_signature(PAYLOAD, &STANDARD.encode([1u8; 7]), &key.public_pem));
    }

    #[test]
    fn bad_private_key_is_error() {
        assert!(matches!(
            sign_payload("nope", PAYLOAD),
            Err(SignatureError::InvalidPrivateKey)
        ));
    }
}
