//! # Issuance Service
//!
//! Request-level orchestration. Each public method is one inbound request
//! and drives at most one funding transaction followed by at most one
//! certificate transaction.
//!
//! ## Flows
//!
//! ```text
//! request_fingerprint:  fund ─► create pending ─► derive fingerprint
//! submit_certificate:   load pending ─► fund ─► issue_cert ─► confirm
//! revoke:               load pending (confirmed) ─► fund ─► revoke_cert
//! authorize_transfer:   fund
//! ```
//!
//! Every certificate attempt walks the [`IssuanceState`] machine, so an
//! out-of-order step is an `InvalidTransition` rather than a ledger call.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::admission::{AdmissionGate, AdmissionTicket};
use super::directory::IssuerDirectory;
use super::driver::{CertificatePayload, SubmissionOutcome, TransactionDriver};
use super::error::{IssuanceError, IssuanceResult};
use super::pending::PendingIssuanceLedger;
use super::reconcile::Reconciler;
use super::state::IssuanceState;
use super::verifier::Verifier;
use crate::config::ProtocolConfig;
use crate::crypto::fingerprint::{Fingerprint, FingerprintDeriver};
use crate::ledger::{AccountAddress, LedgerCertificateRecord, LedgerClient, LedgerSigner};
use crate::store::{
    ConfirmationSource, IssuanceConfirmation, IssuanceStatus, PendingIssuance, RecordStore,
    TransactionKind,
};

/// Response to a fingerprint request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintGrant {
    /// The issuance id. Clients keep this; it is the fingerprint seed.
    pub id: String,
    pub module_address: AccountAddress,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    pub module_address: AccountAddress,
    pub admin_address: AccountAddress,
}

/// A pending issuance with its derived status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceView {
    pub issuance: PendingIssuance,
    pub status: IssuanceStatus,
    pub confirmation: Option<IssuanceConfirmation>,
}

/// Tracks one request's walk through [`IssuanceState`].
struct Attempt<'a> {
    seed: &'a str,
    state: IssuanceState,
}

impl<'a> Attempt<'a> {
    fn new(seed: &'a str, state: IssuanceState) -> Self {
        Self { seed, state }
    }

    fn advance(&mut self, next: IssuanceState) -> IssuanceResult<()> {
        self.state = self.state.transition(next)?;
        info!(seed = self.seed, state = %self.state, "issuance state");
        Ok(())
    }
}

pub struct IssuanceService {
    gate: AdmissionGate,
    driver: Arc<TransactionDriver>,
    pending: PendingIssuanceLedger,
    verifier: Verifier,
    directory: IssuerDirectory,
    deriver: FingerprintDeriver,
    admin_address: AccountAddress,
    module_address: AccountAddress,
}

impl IssuanceService {
    pub fn new(
        config: &ProtocolConfig,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<LedgerSigner>,
        store: RecordStore,
    ) -> Self {
        let admin_address = signer.address();
        let module_address = config.module_address;
        let deriver = FingerprintDeriver::new(config.salt.clone());
        let driver = Arc::new(TransactionDriver::new(
            Arc::clone(&ledger),
            Arc::clone(&signer),
            module_address,
            config.finality_timeout,
        ));

        Self {
            gate: AdmissionGate::new(
                Arc::clone(&ledger),
                signer,
                config.funding_amount,
                config.finality_timeout,
            ),
            pending: PendingIssuanceLedger::new(store.clone()),
            verifier: Verifier::new(ledger, module_address, deriver.clone()),
            directory: IssuerDirectory::new(store, Arc::clone(&driver)),
            driver,
            deriver,
            admin_address,
            module_address,
        }
    }

    pub fn directory(&self) -> &IssuerDirectory {
        &self.directory
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn pending(&self) -> &PendingIssuanceLedger {
        &self.pending
    }

    pub fn module_address(&self) -> AccountAddress {
        self.module_address
    }

    pub fn admin_address(&self) -> AccountAddress {
        self.admin_address
    }

    /// A reconciler sharing this service's store and ledger.
    pub fn reconciler(&self, grace: Duration) -> Reconciler {
        Reconciler::new(self.pending.clone(), self.verifier.clone(), grace)
    }

    fn parse_address(raw: &str) -> IssuanceResult<AccountAddress> {
        raw.parse()
            .map_err(|e| IssuanceError::InvalidInput(format!("address '{raw}': {e}")))
    }

    /// Resolves a registered issuer and checks it owns `address`.
    fn registered_issuer(&self, issuer_id: &str, address: AccountAddress) -> IssuanceResult<()> {
        let issuer = self.directory.fetch(issuer_id)?;
        if issuer.address != address {
            return Err(IssuanceError::InvalidInput(format!(
                "issuer {issuer_id} is registered at {}, not {address}",
                issuer.address
            )));
        }
        Ok(())
    }

    /// Appends to the audit log. The ledger write it describes has already
    /// happened, so a failure here is logged rather than returned.
    fn log_transaction(&self, hash: &str, issuer_id: &str, kind: TransactionKind) {
        if let Err(e) =
            self.directory
                .record_transaction(hash, issuer_id, self.gate.estimate_cost(), kind)
        {
            warn!(%hash, issuer_id, %kind, error = %e, "transaction log write failed");
        }
    }

    /// Funds the issuer and logs the funding transaction.
    async fn admit(&self, address: AccountAddress, issuer_id: &str) -> IssuanceResult<AdmissionTicket> {
        let amount = self.gate.estimate_cost();
        let ticket = self.gate.authorize_and_fund(address, amount).await?;
        self.log_transaction(ticket.funding_tx_hash(), issuer_id, TransactionKind::Funding);
        Ok(ticket)
    }

    /// The issuer reference written on a certificate is always the pending
    /// record's issuer address. A payload naming anyone else is rejected.
    fn issuer_reference(pending: &PendingIssuance, claimed: &str) -> IssuanceResult<String> {
        let expected = pending.issuer_address;
        if claimed.trim().is_empty() {
            return Ok(expected.to_string());
        }
        match claimed.parse::<AccountAddress>() {
            Ok(address) if address == expected => Ok(expected.to_string()),
            _ => Err(IssuanceError::InvalidInput(format!(
                "issuer '{claimed}' does not match issuance {}",
                pending.seed
            ))),
        }
    }

    /// Funds the issuer, records a pending issuance under a fresh id, and
    /// returns the id with its fingerprint.
    pub async fn request_fingerprint(
        &self,
        issuer_address: &str,
        issuer_id: &str,
        is_private: bool,
    ) -> IssuanceResult<FingerprintGrant> {
        let address = Self::parse_address(issuer_address)?;
        if issuer_id.trim().is_empty() {
            return Err(IssuanceError::InvalidInput("issuer id is required".into()));
        }
        self.registered_issuer(issuer_id, address)?;

        let seed = Uuid::new_v4().to_string();
        let mut attempt = Attempt::new(&seed, IssuanceState::Requested);
        let ticket = match self.admit(address, issuer_id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                attempt.advance(IssuanceState::Rejected)?;
                return Err(e);
            }
        };
        attempt.advance(IssuanceState::Funded)?;

        self.pending
            .create_pending(&seed, ticket.issuer_address(), issuer_id, is_private)?;
        let fingerprint = self.deriver.derive(&seed)?;

        Ok(FingerprintGrant {
            id: seed,
            module_address: self.module_address,
            fingerprint,
        })
    }

    /// Writes the certificate for a pending issuance to the ledger.
    pub async fn submit_certificate(
        &self,
        seed: &str,
        mut payload: CertificatePayload,
    ) -> IssuanceResult<SubmissionOutcome> {
        let pending = self.pending.get(seed)?;
        payload.issuer = Self::issuer_reference(&pending, &payload.issuer)?;
        if self.pending.status(seed)? == IssuanceStatus::Confirmed {
            return Err(IssuanceError::InvalidTransition {
                from: IssuanceState::Confirmed,
                to: IssuanceState::Submitted,
            });
        }
        let fingerprint = self.deriver.derive(seed)?;

        let mut attempt = Attempt::new(seed, IssuanceState::Requested);
        let ticket = match self.admit(pending.issuer_address, &pending.issuer_id).await {
            Ok(ticket) => ticket,
            Err(e) => {
                attempt.advance(IssuanceState::Rejected)?;
                return Err(e);
            }
        };
        attempt.advance(IssuanceState::Funded)?;

        attempt.advance(IssuanceState::Submitted)?;
        let outcome = self.driver.submit(ticket, &fingerprint, payload).await;

        if !outcome.success {
            if let Some(hash) = &outcome.transaction_hash {
                self.log_transaction(hash, &pending.issuer_id, TransactionKind::Issuance);
            }
            attempt.advance(IssuanceState::Failed)?;
            let reason = outcome.error.unwrap_or_else(|| "unknown".into());
            warn!(seed, %reason, "certificate submission failed");
            return Err(IssuanceError::SubmissionFailed(reason));
        }

        attempt.advance(IssuanceState::Confirmed)?;
        self.pending.confirm(
            seed,
            outcome.transaction_hash.clone(),
            ConfirmationSource::Driver,
        )?;
        if let Some(hash) = &outcome.transaction_hash {
            self.log_transaction(hash, &pending.issuer_id, TransactionKind::Issuance);
        }
        Ok(outcome)
    }

    /// Revokes a confirmed certificate. `issuer` must be the pending
    /// record's issuer address; the ledger checks it again against the
    /// certificate.
    pub async fn revoke(&self, seed: &str, issuer: &str) -> IssuanceResult<SubmissionOutcome> {
        let pending = self.pending.get(seed)?;
        if issuer.trim().is_empty() {
            return Err(IssuanceError::InvalidInput("issuer is required".into()));
        }
        let issuer = Self::issuer_reference(&pending, issuer)?;
        let mut current = match self.pending.status(seed)? {
            IssuanceStatus::Pending => IssuanceState::Submitted,
            IssuanceStatus::Confirmed => IssuanceState::Confirmed,
        };
        if current == IssuanceState::Confirmed {
            let record = self.verifier.lookup_by_seed(seed).await?;
            if !record.is_valid {
                current = IssuanceState::Revoked;
            }
        }
        let mut attempt = Attempt::new(seed, current);
        if !current.can_transition_to(IssuanceState::Revoked) {
            return Err(IssuanceError::InvalidTransition {
                from: current,
                to: IssuanceState::Revoked,
            });
        }

        let fingerprint = self.deriver.derive(seed)?;
        let ticket = self.admit(pending.issuer_address, &pending.issuer_id).await?;
        let outcome = self.driver.revoke(ticket, &fingerprint, &issuer).await;
        if let Some(hash) = &outcome.transaction_hash {
            self.log_transaction(hash, &pending.issuer_id, TransactionKind::Revocation);
        }
        if !outcome.success {
            let reason = outcome.error.unwrap_or_else(|| "unknown".into());
            return Err(IssuanceError::SubmissionFailed(reason));
        }
        attempt.advance(IssuanceState::Revoked)?;
        Ok(outcome)
    }

    /// Funds `address` and tells the caller which module and admin to use.
    pub async fn authorize_transfer(&self, address: &str) -> IssuanceResult<TransferAuthorization> {
        let address = Self::parse_address(address)?;
        let issuer_id = self
            .directory
            .issuer_for_address(&address)?
            .ok_or_else(|| IssuanceError::NotFound(format!("issuer at {address}")))?;
        self.admit(address, &issuer_id).await?;
        Ok(TransferAuthorization {
            module_address: self.module_address,
            admin_address: self.admin_address,
        })
    }

    pub async fn lookup(&self, seed: &str) -> IssuanceResult<LedgerCertificateRecord> {
        self.verifier.lookup_by_seed(seed).await
    }

    pub fn issuance(&self, seed: &str) -> IssuanceResult<IssuanceView> {
        let issuance = self.pending.get(seed)?;
        let confirmation = self.pending.confirmation(seed)?;
        let status = if confirmation.is_some() {
            IssuanceStatus::Confirmed
        } else {
            IssuanceStatus::Pending
        };
        Ok(IssuanceView {
            issuance,
            status,
            confirmation,
        })
    }

    pub fn verify_signature(&self, payload: &[u8], signature_b64: &str, public_key_pem: &str) -> bool {
        self.verifier
            .verify_signature(payload, signature_b64, public_key_pem)
    }
}
