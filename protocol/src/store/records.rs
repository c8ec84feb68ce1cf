//! Off-chain record types.
//!
//! All of these are bincode on disk and camelCase JSON over the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ledger::types::AccountAddress;

/// A registered issuing institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub issuer_type: String,
    pub phone_number: String,
    /// Ledger address. Set at registration, never reassigned.
    pub address: AccountAddress,
    pub registered_at: DateTime<Utc>,
}

/// An issuance request recorded before anything reaches the ledger.
///
/// Immutable once written. Confirmation lives in a separate record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingIssuance {
    /// Opaque identifier the fingerprint is derived from.
    pub seed: String,
    pub issuer_id: String,
    pub issuer_address: AccountAddress,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

/// Who observed the certificate transaction succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfirmationSource {
    Driver,
    Reconciler,
}

/// Marks a [`PendingIssuance`] as committed on the ledger. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuanceConfirmation {
    pub seed: String,
    /// Known when the driver saw finality; the reconciler only sees the
    /// ledger record, not the transaction that wrote it.
    pub transaction_hash: Option<String>,
    pub confirmed_at: DateTime<Utc>,
    pub source: ConfirmationSource,
}

/// Derived status of a pending issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssuanceStatus {
    Pending,
    Confirmed,
}

impl fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// Catalog entry describing a certificate an issuer offers. Not
/// authoritative; the ledger is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateMetadata {
    pub id: String,
    pub issuer_id: String,
    pub cert_name: String,
    pub cert_type: String,
    pub cert_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionKind {
    Funding,
    Issuance,
    Revocation,
    ApproveIssuer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Funding => "funding",
            Self::Issuance => "issuance",
            Self::Revocation => "revocation",
            Self::ApproveIssuer => "approve_issuer",
        };
        f.write_str(s)
    }
}

/// Audit entry for a ledger transaction submitted on an issuer's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub hash: String,
    pub issuer_id: String,
    /// Estimated cost at submission time.
    pub gas: u64,
    pub kind: TransactionKind,
    pub recorded_at: DateTime<Utc>,
}
