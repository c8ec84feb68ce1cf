//! # Transaction Driver
//!
//! Turns one admitted request into one ledger write: build, sign, submit,
//! wait. No retries. Every failure along the way comes back as a
//! [`SubmissionOutcome`] with `success == false`, never as a panic or a raw
//! transport error.
//!
//! `issue_cert` takes its arguments in a fixed order:
//!
//! ```text
//! fingerprint, recipient_name, recipient_email, recipient_photo_url,
//! certificate_url, certificate_id, issuance_date, description, issuer
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::admission::AdmissionTicket;
use crate::config::{
    ADD_APPROVED_ISSUER_FUNCTION, CERT_MODULE, ISSUE_CERT_FUNCTION, REVOKE_CERT_FUNCTION,
};
use crate::crypto::fingerprint::Fingerprint;
use crate::ledger::{AccountAddress, EntryArg, FunctionRef, LedgerClient, LedgerSigner};

/// Certificate fields written to the ledger alongside the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePayload {
    pub recipient_name: String,
    pub recipient_email: String,
    #[serde(alias = "recipientPhoto")]
    pub recipient_photo_url: String,
    #[serde(alias = "certUrl")]
    pub certificate_url: String,
    pub certificate_id: String,
    #[serde(alias = "issueDate")]
    pub issuance_date: String,
    pub description: String,
    /// Issuer reference recorded on the certificate. Only this issuer may
    /// later revoke it.
    pub issuer: String,
}

impl CertificatePayload {
    fn into_args(self, fingerprint: &Fingerprint) -> Vec<EntryArg> {
        vec![
            EntryArg::from(fingerprint.as_str()),
            self.recipient_name.into(),
            self.recipient_email.into(),
            self.recipient_photo_url.into(),
            self.certificate_url.into(),
            self.certificate_id.into(),
            self.issuance_date.into(),
            self.description.into(),
            self.issuer.into(),
        ]
    }
}

/// Result of one driven transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub success: bool,
    /// Present once the ledger accepted the submission, even if it later
    /// failed.
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionOutcome {
    fn failed(transaction_hash: Option<String>, error: String) -> Self {
        Self {
            success: false,
            transaction_hash,
            error: Some(error),
        }
    }
}

pub struct TransactionDriver {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<LedgerSigner>,
    module_address: AccountAddress,
    finality_timeout: Duration,
}

impl TransactionDriver {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<LedgerSigner>,
        module_address: AccountAddress,
        finality_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            signer,
            module_address,
            finality_timeout,
        }
    }

    pub fn module_address(&self) -> AccountAddress {
        self.module_address
    }

    fn module_fn(&self, name: &str) -> FunctionRef {
        FunctionRef::new(self.module_address, CERT_MODULE, name)
    }

    /// Records the certificate under `fingerprint`. Consumes the ticket.
    pub async fn submit(
        &self,
        ticket: AdmissionTicket,
        fingerprint: &Fingerprint,
        payload: CertificatePayload,
    ) -> SubmissionOutcome {
        debug!(issuer = %ticket.issuer_address(), funding = ticket.funding_tx_hash(), "submitting certificate");
        self.drive(self.module_fn(ISSUE_CERT_FUNCTION), payload.into_args(fingerprint))
            .await
    }

    /// Flips the certificate's validity flag. Consumes the ticket.
    pub async fn revoke(
        &self,
        ticket: AdmissionTicket,
        fingerprint: &Fingerprint,
        issuer: &str,
    ) -> SubmissionOutcome {
        debug!(issuer = %ticket.issuer_address(), "submitting revocation");
        self.drive(
            self.module_fn(REVOKE_CERT_FUNCTION),
            vec![fingerprint.as_str().into(), issuer.into()],
        )
        .await
    }

    /// Adds `issuer` to the module's approved-issuer list.
    pub async fn approve_issuer(&self, issuer: AccountAddress) -> SubmissionOutcome {
        self.drive(
            self.module_fn(ADD_APPROVED_ISSUER_FUNCTION),
            vec![EntryArg::Address(issuer)],
        )
        .await
    }

    async fn drive(&self, function: FunctionRef, arguments: Vec<EntryArg>) -> SubmissionOutcome {
        let name = function.function.clone();

        let tx = match self
            .ledger
            .build(self.signer.address(), function, arguments)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!(function = %name, error = %e, "build failed");
                return SubmissionOutcome::failed(None, e.to_string());
            }
        };

        let pending = match self.ledger.sign_and_submit(&self.signer, tx).await {
            Ok(p) => p,
            Err(e) => {
                warn!(function = %name, error = %e, "submit failed");
                return SubmissionOutcome::failed(None, e.to_string());
            }
        };

        match self
            .ledger
            .wait_for_finality(&pending.hash, self.finality_timeout)
            .await
        {
            Ok(outcome) if outcome.success => {
                info!(function = %name, tx = %outcome.hash, "transaction confirmed");
                SubmissionOutcome {
                    success: true,
                    transaction_hash: Some(outcome.hash),
                    error: None,
                }
            }
            Ok(outcome) => {
                warn!(function = %name, tx = %outcome.hash, vm_status = %outcome.vm_status, "transaction failed");
                SubmissionOutcome::failed(Some(outcome.hash), outcome.vm_status)
            }
            Err(e) => {
                warn!(function = %name, tx = %pending.hash, error = %e, "finality wait failed");
                SubmissionOutcome::failed(Some(pending.hash), e.to_string())
            }
        }
    }
}
