//! # Issuer Directory
//!
//! Off-chain issuer records plus the on-chain approved-issuer entry.
//!
//! Registration writes the off-chain record first, then submits
//! `add_approved_issuer`. If the ledger step fails the record stays and the
//! outcome says so; the approval can be retried by an operator. An address
//! belongs to at most one issuer and is never reassigned.
//!
//! The directory also owns the certificate catalog and the per-issuer
//! transaction audit log.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::driver::TransactionDriver;
use super::error::{IssuanceError, IssuanceResult};
use crate::ledger::AccountAddress;
use crate::store::{
    CertificateMetadata, Issuer, RecordStore, StoreError, TransactionKind, TransactionRecord,
};

/// Registration input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssuer {
    pub name: String,
    #[serde(rename = "type")]
    pub issuer_type: String,
    pub phone_number: String,
    pub address: String,
}

/// Catalog input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificateMetadata {
    pub cert_name: String,
    pub cert_type: String,
    pub cert_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub issuer: Issuer,
    pub approved_on_ledger: bool,
    pub approval_tx_hash: Option<String>,
}

pub struct IssuerDirectory {
    store: RecordStore,
    driver: Arc<TransactionDriver>,
}

impl IssuerDirectory {
    pub fn new(store: RecordStore, driver: Arc<TransactionDriver>) -> Self {
        Self { store, driver }
    }

    pub async fn register(&self, data: NewIssuer) -> IssuanceResult<Registration> {
        if data.name.trim().is_empty() {
            return Err(IssuanceError::InvalidInput("issuer name is required".into()));
        }
        let address: AccountAddress = data
            .address
            .parse()
            .map_err(|e| IssuanceError::InvalidInput(format!("issuer address: {e}")))?;

        let issuer = Issuer {
            id: Uuid::new_v4().to_string(),
            name: data.name,
            issuer_type: data.issuer_type,
            phone_number: data.phone_number,
            address,
            registered_at: Utc::now(),
        };
        self.store.insert_issuer(&issuer).map_err(|e| match e {
            StoreError::Duplicate(what) => {
                IssuanceError::InvalidInput(format!("already registered: {what}"))
            }
            other => other.into(),
        })?;
        info!(issuer_id = %issuer.id, address = %issuer.address, "issuer registered");

        let outcome = self.driver.approve_issuer(address).await;
        if let Some(hash) = &outcome.transaction_hash {
            self.record_transaction(hash, &issuer.id, 0, TransactionKind::ApproveIssuer)?;
        }
        if !outcome.success {
            warn!(
                issuer_id = %issuer.id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "issuer approval did not reach the ledger"
            );
        }

        Ok(Registration {
            issuer,
            approved_on_ledger: outcome.success,
            approval_tx_hash: outcome.transaction_hash,
        })
    }

    pub fn fetch(&self, issuer_id: &str) -> IssuanceResult<Issuer> {
        self.store
            .get_issuer(issuer_id)?
            .ok_or_else(|| IssuanceError::NotFound(format!("issuer {issuer_id}")))
    }

    pub fn address_of(&self, issuer_id: &str) -> IssuanceResult<AccountAddress> {
        Ok(self.fetch(issuer_id)?.address)
    }

    pub fn issuer_for_address(&self, address: &AccountAddress) -> IssuanceResult<Option<String>> {
        Ok(self.store.issuer_id_for_address(address)?)
    }

    pub fn add_certificate(
        &self,
        issuer_id: &str,
        data: NewCertificateMetadata,
    ) -> IssuanceResult<CertificateMetadata> {
        self.fetch(issuer_id)?;
        let entry = CertificateMetadata {
            id: Uuid::new_v4().to_string(),
            issuer_id: issuer_id.to_string(),
            cert_name: data.cert_name,
            cert_type: data.cert_type,
            cert_url: data.cert_url,
        };
        self.store.insert_metadata(&entry)?;
        Ok(entry)
    }

    pub fn list_certificates(&self, issuer_id: &str) -> IssuanceResult<Vec<CertificateMetadata>> {
        Ok(self.store.metadata_for_issuer(issuer_id)?)
    }

    pub fn record_transaction(
        &self,
        hash: &str,
        issuer_id: &str,
        gas: u64,
        kind: TransactionKind,
    ) -> IssuanceResult<TransactionRecord> {
        if issuer_id.trim().is_empty() {
            return Err(IssuanceError::InvalidInput(
                "transaction log entry needs an issuer id".into(),
            ));
        }
        let record = TransactionRecord {
            hash: hash.to_string(),
            issuer_id: issuer_id.to_string(),
            gas,
            kind,
            recorded_at: Utc::now(),
        };
        self.store.insert_transaction(&record)?;
        Ok(record)
    }

    pub fn transactions_for(&self, issuer_id: &str) -> IssuanceResult<Vec<TransactionRecord>> {
        Ok(self.store.transactions_for_issuer(issuer_id)?)
    }
}
