//! # Record Store
//!
//! Off-chain persistence: issuers, pending issuances and their
//! confirmations, the certificate catalog, and the transaction audit log.
//! The ledger stays authoritative for certificates; this store only knows
//! what the node asked for and what it saw come back.
//!
//! ```text
//! records.rs: record types (bincode on disk, JSON over the API)
//! db.rs      : RecordStore over sled
//! ```

pub mod db;
pub mod records;

pub use db::{RecordStore, StoreError, StoreResult};
pub use records::{
    CertificateMetadata, ConfirmationSource, IssuanceConfirmation, IssuanceStatus, Issuer,
    PendingIssuance, TransactionKind, TransactionRecord,
};
