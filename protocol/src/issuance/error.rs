use thiserror::Error;

use super::state::IssuanceState;
use crate::crypto::fingerprint::FingerprintError;
use crate::store::StoreError;

/// Every failure an issuance or verification request can end in.
///
/// Lower layers (`LedgerError`, `StoreError`, decode errors) are converted at
/// component boundaries; callers only ever match on these kinds.
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("admission denied: {0}")]
    AdmissionDenied(String),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("signature invalid")]
    SignatureInvalid,

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: IssuanceState,
        to: IssuanceState,
    },
}

impl From<FingerprintError> for IssuanceError {
    fn from(e: FingerprintError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

pub type IssuanceResult<T> = Result<T, IssuanceError>;
