//! # Ledger Access
//!
//! Everything the protocol knows about the ledger network goes through the
//! [`LedgerClient`] trait. Two implementations exist:
//!
//! - [`rest::RestLedgerClient`] talks to a fullnode REST API.
//! - `LocalLedger` in the `certichain-contracts` crate runs the
//!   `CertManagement` module in-process for devnet runs and tests.
//!
//! ```text
//! types.rs   : addresses, function refs, arguments, transaction chain
//! signer.rs  : the injected administrative signer
//! decode.rs  : named-field decoding of view responses
//! rest.rs    : reqwest-based fullnode client
//! ```

pub mod decode;
pub mod rest;
pub mod signer;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use decode::{DecodeError, LedgerCertificateRecord};
pub use rest::RestLedgerClient;
pub use signer::LedgerSigner;
pub use types::{
    AccountAddress, AddressError, EntryArg, FinalityOutcome, FunctionRef, PendingTransaction,
    SignedTransaction, UnsignedTransaction,
};

/// Failures talking to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(String),

    #[error("transaction {hash} not final after {after:?}")]
    Timeout { hash: String, after: Duration },

    #[error("ledger rejected request: {0}")]
    Rejected(String),

    #[error("malformed ledger response: {0}")]
    Decode(String),

    #[error("not found on ledger: {0}")]
    NotFound(String),
}

/// A ledger network.
///
/// Every call can fail; none of them retries. Callers decide what a
/// failure means for their request.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Builds an unsigned entry-function transaction for `sender`, filling in
    /// the sender's next sequence number.
    async fn build(
        &self,
        sender: AccountAddress,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<UnsignedTransaction, LedgerError>;

    /// Submits an already signed transaction.
    async fn submit(&self, tx: SignedTransaction) -> Result<PendingTransaction, LedgerError>;

    /// Signs `tx` with `signer` and submits it.
    async fn sign_and_submit(
        &self,
        signer: &LedgerSigner,
        tx: UnsignedTransaction,
    ) -> Result<PendingTransaction, LedgerError> {
        self.submit(signer.sign(tx)).await
    }

    /// Blocks until `hash` is final or `timeout` elapses.
    async fn wait_for_finality(
        &self,
        hash: &str,
        timeout: Duration,
    ) -> Result<FinalityOutcome, LedgerError>;

    /// Calls a view function and returns its positional results.
    async fn view(
        &self,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<Vec<Value>, LedgerError>;
}
