//! # Certificate Issuance
//!
//! The request path from "give me a fingerprint" to "the certificate is on
//! the ledger", and back again for verification.
//!
//! ```text
//! admission.rs  : funding transfer, AdmissionTicket
//! pending.rs    : off-chain pending records and confirmations
//! driver.rs     : build / sign / submit / wait for one ledger write
//! verifier.rs   : on-ledger lookup and offline RSA-PSS checks
//! directory.rs  : issuers, catalog, transaction log
//! reconcile.rs  : confirms pending records the ledger already has
//! service.rs    : per-request orchestration over all of the above
//! state.rs      : per-attempt state machine
//! ```

pub mod admission;
pub mod directory;
pub mod driver;
pub mod error;
pub mod pending;
pub mod reconcile;
pub mod service;
pub mod state;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use admission::{AdmissionGate, AdmissionTicket};
pub use directory::{IssuerDirectory, NewCertificateMetadata, NewIssuer, Registration};
pub use driver::{CertificatePayload, SubmissionOutcome, TransactionDriver};
pub use error::{IssuanceError, IssuanceResult};
pub use pending::PendingIssuanceLedger;
pub use reconcile::{ReconcileReport, Reconciler};
pub use service::{FingerprintGrant, IssuanceService, IssuanceView, TransferAuthorization};
pub use state::IssuanceState;
pub use verifier::Verifier;
