//! # Admission Gate
//!
//! Nothing reaches the certificate module until the admin account has paid
//! for it. The gate estimates the cost of an issuance, runs the funding
//! transfer to finality, and hands back an [`AdmissionTicket`].
//!
//! The ticket is the only way to call the [`TransactionDriver`]. It cannot
//! be cloned or built outside this crate, and the driver consumes it, so
//! one successful admission buys exactly one ledger write.
//!
//! [`TransactionDriver`]: super::driver::TransactionDriver

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::error::IssuanceError;
use crate::config::{FRAMEWORK_ADDRESS, TRANSFER_FUNCTION, TRANSFER_MODULE};
use crate::ledger::{AccountAddress, EntryArg, FunctionRef, LedgerClient, LedgerSigner};

/// Proof that funding for one ledger write succeeded for `issuer_address`.
#[derive(Debug)]
pub struct AdmissionTicket {
    issuer_address: AccountAddress,
    funding_tx_hash: String,
    amount: u64,
}

impl AdmissionTicket {
    pub(crate) fn new(issuer_address: AccountAddress, funding_tx_hash: String, amount: u64) -> Self {
        Self {
            issuer_address,
            funding_tx_hash,
            amount,
        }
    }

    pub fn issuer_address(&self) -> AccountAddress {
        self.issuer_address
    }

    pub fn funding_tx_hash(&self) -> &str {
        &self.funding_tx_hash
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }
}

pub struct AdmissionGate {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<LedgerSigner>,
    funding_amount: u64,
    finality_timeout: Duration,
}

impl AdmissionGate {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<LedgerSigner>,
        funding_amount: u64,
        finality_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            signer,
            funding_amount,
            finality_timeout,
        }
    }

    /// Cost of one issuance in base units. A fixed heuristic.
    pub fn estimate_cost(&self) -> u64 {
        self.funding_amount
    }

    /// Runs the funding transfer for `issuer_address` and waits for it.
    ///
    /// The transfer goes from the admin account to itself through
    /// `0x1::aptos_account::transfer`; what matters is that the admin can
    /// still pay. Anything short of successful finality is `AdmissionDenied`.
    pub async fn authorize_and_fund(
        &self,
        issuer_address: AccountAddress,
        amount: u64,
    ) -> Result<AdmissionTicket, IssuanceError> {
        let admin = self.signer.address();
        let framework: AccountAddress = FRAMEWORK_ADDRESS
            .parse()
            .map_err(|e| IssuanceError::AdmissionDenied(format!("framework address: {e}")))?;
        let function = FunctionRef::new(framework, TRANSFER_MODULE, TRANSFER_FUNCTION);

        let deny = |stage: &str, detail: String| {
            warn!(issuer = %issuer_address, stage, %detail, "admission denied");
            IssuanceError::AdmissionDenied(format!("{stage}: {detail}"))
        };

        let tx = self
            .ledger
            .build(admin, function, vec![EntryArg::Address(admin), EntryArg::U64(amount)])
            .await
            .map_err(|e| deny("build", e.to_string()))?;
        let pending = self
            .ledger
            .sign_and_submit(&self.signer, tx)
            .await
            .map_err(|e| deny("submit", e.to_string()))?;
        let outcome = self
            .ledger
            .wait_for_finality(&pending.hash, self.finality_timeout)
            .await
            .map_err(|e| deny("finality", e.to_string()))?;

        if !outcome.success {
            return Err(deny("finality", outcome.vm_status));
        }

        info!(issuer = %issuer_address, tx = %outcome.hash, amount, "issuer funded");
        Ok(AdmissionTicket::new(issuer_address, outcome.hash, amount))
    }
}
