//! # Verifier
//!
//! Two independent ways to check a certificate:
//!
//! 1. **On-ledger lookup.** Call `get_certificate_issuance(module, fingerprint)`
//!    and decode the result through the named-field layout. Any transport or
//!    decoding problem is reported as `NotFound`, with the reason logged.
//! 2. **Offline signature check.** RSA-PSS over the payload against the
//!    issuer's public key. No ledger involved.

use std::sync::Arc;

use tracing::{debug, warn};

use super::error::{IssuanceError, IssuanceResult};
use crate::config::{CERT_MODULE, GET_CERTIFICATE_FUNCTION};
use crate::crypto::fingerprint::{Fingerprint, FingerprintDeriver};
use crate::crypto::signatures;
use crate::ledger::{AccountAddress, EntryArg, FunctionRef, LedgerCertificateRecord, LedgerClient};

#[derive(Clone)]
pub struct Verifier {
    ledger: Arc<dyn LedgerClient>,
    module_address: AccountAddress,
    deriver: FingerprintDeriver,
}

impl Verifier {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        module_address: AccountAddress,
        deriver: FingerprintDeriver,
    ) -> Self {
        Self {
            ledger,
            module_address,
            deriver,
        }
    }

    /// Reads the committed certificate for `fingerprint`.
    pub async fn lookup_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> IssuanceResult<LedgerCertificateRecord> {
        let function = FunctionRef::new(self.module_address, CERT_MODULE, GET_CERTIFICATE_FUNCTION);
        let arguments = vec![
            EntryArg::Address(self.module_address),
            fingerprint.as_str().into(),
        ];

        let values = self.ledger.view(function, arguments).await.map_err(|e| {
            debug!(fingerprint = %fingerprint, error = %e, "certificate view failed");
            IssuanceError::NotFound(format!("certificate {fingerprint}: {e}"))
        })?;

        LedgerCertificateRecord::decode(&values).map_err(|e| {
            warn!(fingerprint = %fingerprint, error = %e, "malformed certificate view");
            IssuanceError::NotFound(format!("certificate {fingerprint}: {e}"))
        })
    }

    /// Derives the fingerprint from an issuance id, then looks it up.
    pub async fn lookup_by_seed(&self, seed: &str) -> IssuanceResult<LedgerCertificateRecord> {
        let fingerprint = self.deriver.derive(seed)?;
        self.lookup_by_fingerprint(&fingerprint).await
    }

    /// Checks an issuer's RSA-PSS signature over `payload`. Never errors.
    pub fn verify_signature(&self, payload: &[u8], signature_b64: &str, public_key_pem: &str) -> bool {
        signatures::verify_signature(payload, signature_b64, public_key_pem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fingerprint::FingerprintSalt;
    use crate::issuance::testing::{Fault, ScriptedLedger};

    fn deriver() -> FingerprintDeriver {
        FingerprintDeriver::new(FingerprintSalt::new(b"verifier-test-salt".to_vec()).unwrap())
    }

    fn record(fingerprint: &str) -> LedgerCertificateRecord {
        LedgerCertificateRecord {
            certificate_id: "CERT-7".into(),
            fingerprint: fingerprint.into(),
            recipient_name: "Alan Turing".into(),
            recipient_email: "alan@example.org".into(),
            recipient_photo_url: String::new(),
            certificate_url: "https://certs.example.org/7".into(),
            description: "Computability".into(),
            issuance_date: "2026-01-12".into(),
            issuer: "0xissuer".into(),
            is_valid: true,
        }
    }

    #[tokio::test]
    async fn lookup_by_seed_hashes_first() {
        let ledger = Arc::new(ScriptedLedger::default());
        let fp = deriver().derive("seed-7").unwrap();
        ledger.insert_certificate(record(fp.as_str()));

        let v = Verifier::new(ledger, AccountAddress::new([1; 32]), deriver());
        let found = v.lookup_by_seed("seed-7").await.unwrap();
        assert_eq!(found.fingerprint, fp.as_str());
        assert_eq!(found.recipient_name, "Alan Turing");
    }

    #[tokio::test]
    async fn unknown_fingerprint_is_not_found() {
        let ledger = Arc::new(ScriptedLedger::default());
        let v = Verifier::new(ledger, AccountAddress::new([1; 32]), deriver());
        let err = v.lookup_by_seed("nobody").await.unwrap_err();
        assert!(matches!(err, IssuanceError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_view_is_not_found() {
        let ledger = Arc::new(ScriptedLedger::default());
        ledger.inject(Fault::MalformedView);
        let v = Verifier::new(ledger, AccountAddress::new([1; 32]), deriver());
        let err = v.lookup_by_seed("seed-7").await.unwrap_err();
        assert!(matches!(err, IssuanceError::NotFound(msg) if msg.contains("expected 10 fields")));
    }

    #[tokio::test]
    async fn empty_seed_is_invalid_input() {
        let ledger = Arc::new(ScriptedLedger::default());
        let v = Verifier::new(ledger, AccountAddress::new([1; 32]), deriver());
        assert!(matches!(
            v.lookup_by_seed("").await,
            Err(IssuanceError::InvalidInput(_))
        ));
    }
}
