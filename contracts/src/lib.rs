//! # CertiChain Ledger Contracts
//!
//! Ledger-side logic for CertiChain:
//!
//! - **CertManagement**: the certificate module: approved issuers, one
//!   record per fingerprint, monotonic revocation.
//! - **Local Ledger**: an in-process `LedgerClient` that runs the module
//!   behind a minimal account model, for devnet runs and tests.
//!
//! ## Design Principles
//!
//! 1. Balance arithmetic is checked. A transfer that would underflow aborts.
//! 2. An aborted transaction changes nothing but the sender's fee and
//!    sequence number.
//! 3. Every transaction must carry a valid Ed25519 signature from the key
//!    that owns the sender account.

pub mod cert_management;
pub mod local_ledger;

pub use cert_management::{CertManagement, ContractError};
pub use local_ledger::{LocalFault, LocalLedger};
