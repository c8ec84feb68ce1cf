//! # Reconciler
//!
//! A pending issuance can be left unconfirmed when the process dies between
//! the ledger commit and the local confirmation write, or when the finality
//! wait timed out on a transaction that later landed. The sweep looks each
//! stale record up by fingerprint and confirms the ones the ledger has.
//!
//! Records still missing on the ledger are reported as orphaned and left
//! untouched. The sweep never submits anything.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{IssuanceError, IssuanceResult};
use super::pending::PendingIssuanceLedger;
use super::verifier::Verifier;
use crate::store::ConfirmationSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Unconfirmed records older than the grace period.
    pub examined: usize,
    /// Of those, found on the ledger and now confirmed.
    pub confirmed: usize,
    /// Of those, still absent from the ledger.
    pub orphaned: usize,
}

pub struct Reconciler {
    pending: PendingIssuanceLedger,
    verifier: Verifier,
    grace: Duration,
}

impl Reconciler {
    pub fn new(pending: PendingIssuanceLedger, verifier: Verifier, grace: Duration) -> Self {
        Self {
            pending,
            verifier,
            grace,
        }
    }

    /// One pass over the stale pending records.
    pub async fn sweep(&self) -> IssuanceResult<ReconcileReport> {
        let stale = self.pending.unconfirmed_older_than(self.grace)?;
        let mut report = ReconcileReport {
            examined: stale.len(),
            ..Default::default()
        };

        for record in stale {
            match self.verifier.lookup_by_seed(&record.seed).await {
                Ok(_) => {
                    self.pending
                        .confirm(&record.seed, None, ConfirmationSource::Reconciler)?;
                    report.confirmed += 1;
                }
                Err(IssuanceError::NotFound(reason)) => {
                    debug!(seed = %record.seed, %reason, "still not on ledger");
                    report.orphaned += 1;
                }
                Err(e) => {
                    warn!(seed = %record.seed, error = %e, "reconcile lookup failed");
                    report.orphaned += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                confirmed = report.confirmed,
                orphaned = report.orphaned,
                "reconciliation sweep"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::crypto::fingerprint::{FingerprintDeriver, FingerprintSalt};
    use crate::issuance::testing::ScriptedLedger;
    use crate::ledger::{AccountAddress, LedgerCertificateRecord};
    use crate::store::{IssuanceStatus, RecordStore};

    fn deriver() -> FingerprintDeriver {
        FingerprintDeriver::new(FingerprintSalt::new(b"reconcile-test-salt".to_vec()).unwrap())
    }

    fn on_ledger(fingerprint: &str) -> LedgerCertificateRecord {
        LedgerCertificateRecord {
            certificate_id: "CERT-R".into(),
            fingerprint: fingerprint.into(),
            recipient_name: "Ada Lovelace".into(),
            recipient_email: "ada@example.org".into(),
            recipient_photo_url: String::new(),
            certificate_url: String::new(),
            description: "Analytical Engines".into(),
            issuance_date: "2026-03-01".into(),
            issuer: "0xissuer".into(),
            is_valid: true,
        }
    }

    #[tokio::test]
    async fn confirms_what_the_ledger_has() {
        let ledger = Arc::new(ScriptedLedger::default());
        let pending = PendingIssuanceLedger::new(RecordStore::open_temporary().unwrap());
        let addr = AccountAddress::new([9; 32]);
        pending.create_pending("landed", addr, "issuer-1", false).unwrap();
        pending.create_pending("lost", addr, "issuer-1", false).unwrap();
        ledger.insert_certificate(on_ledger(deriver().derive("landed").unwrap().as_str()));

        let verifier = Verifier::new(ledger, addr, deriver());
        let reconciler = Reconciler::new(pending.clone(), verifier, Duration::ZERO);
        let report = reconciler.sweep().await.unwrap();

        assert_eq!(
            report,
            ReconcileReport {
                examined: 2,
                confirmed: 1,
                orphaned: 1
            }
        );
        assert_eq!(pending.status("landed").unwrap(), IssuanceStatus::Confirmed);
        assert_eq!(
            pending.confirmation("landed").unwrap().unwrap().source,
            ConfirmationSource::Reconciler
        );
        assert_eq!(pending.status("lost").unwrap(), IssuanceStatus::Pending);

        let again = reconciler.sweep().await.unwrap();
        assert_eq!(again.examined, 1);
        assert_eq!(again.confirmed, 0);
    }

    #[tokio::test]
    async fn grace_period_skips_fresh_records() {
        let ledger = Arc::new(ScriptedLedger::default());
        let pending = PendingIssuanceLedger::new(RecordStore::open_temporary().unwrap());
        let addr = AccountAddress::new([9; 32]);
        pending.create_pending("fresh", addr, "issuer-1", false).unwrap();

        let verifier = Verifier::new(ledger.clone(), addr, deriver());
        let report = Reconciler::new(pending, verifier, Duration::from_secs(600))
            .sweep()
            .await
            .unwrap();
        assert_eq!(report, ReconcileReport::default());
        assert!(ledger.calls().is_empty());
    }
}
