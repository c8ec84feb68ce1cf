//! # RecordStore
//!
//! sled-backed persistence for every off-chain record.
//!
//! ## Tree Layout
//!
//! | Tree               | Key                          | Value                          |
//! |--------------------|------------------------------|--------------------------------|
//! | `issuers`          | `issuer_id` (UTF-8)          | `bincode(Issuer)`              |
//! | `issuer_addresses` | `address` (32B)              | `issuer_id` (UTF-8)            |
//! | `issuances`        | `seed` (UTF-8)               | `bincode(PendingIssuance)`     |
//! | `confirmations`    | `seed` (UTF-8)               | `bincode(IssuanceConfirmation)`|
//! | `catalog`          | `len ‖ issuer_id ‖ entry_id` | `bincode(CertificateMetadata)` |
//! | `transactions`     | `len ‖ issuer_id ‖ tx_hash`  | `bincode(TransactionRecord)`   |
//!
//! Catalog and transaction keys start with the issuer id's byte length
//! (u32, big-endian) and the id itself, so listing an issuer's entries is a
//! prefix scan that can only match that exact id, whatever bytes it holds.
//!
//! ## Write-once records
//!
//! Pending issuances and confirmations are inserted with
//! `compare_and_swap(None → value)`. An existing pending record is never
//! overwritten (the insert fails with [`StoreError::Duplicate`]); an
//! existing confirmation wins over a later one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use super::records::{
    CertificateMetadata, IssuanceConfirmation, Issuer, PendingIssuance, TransactionRecord,
};
use crate::ledger::types::AccountAddress;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn scoped_key(issuer_id: &str, suffix: &str) -> Vec<u8> {
    let scope = issuer_id.as_bytes();
    let mut key = Vec::with_capacity(4 + scope.len() + suffix.len());
    // Ids come from request bodies; anything past u32::MAX bytes never got here.
    key.extend_from_slice(&(scope.len() as u32).to_be_bytes());
    key.extend_from_slice(scope);
    key.extend_from_slice(suffix.as_bytes());
    key
}

fn scope_prefix(issuer_id: &str) -> Vec<u8> {
    scoped_key(issuer_id, "")
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Typed access to the node's sled database.
///
/// Cheap to clone; every clone shares the same trees.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db: Db,
    issuers: Tree,
    issuer_addresses: Tree,
    issuances: Tree,
    confirmations: Tree,
    catalog: Tree,
    transactions: Tree,
}

impl RecordStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store, removed on drop. For tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        Ok(Self {
            issuers: db.open_tree("issuers")?,
            issuer_addresses: db.open_tree("issuer_addresses")?,
            issuances: db.open_tree("issuances")?,
            confirmations: db.open_tree("confirmations")?,
            catalog: db.open_tree("catalog")?,
            transactions: db.open_tree("transactions")?,
            db,
        })
    }

    fn get<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> StoreResult<Option<T>> {
        tree.get(key)?.map(|bytes| decode(&bytes)).transpose()
    }

    fn scan<T: DeserializeOwned>(tree: &Tree, prefix: &[u8]) -> StoreResult<Vec<T>> {
        tree.scan_prefix(prefix)
            .map(|entry| {
                let (_key, value) = entry?;
                decode(&value)
            })
            .collect()
    }

    // -- Issuers ------------------------------------------------------------

    /// Inserts an issuer and its address index atomically. Fails with
    /// `Duplicate` if either the id or the address is already taken.
    pub fn insert_issuer(&self, issuer: &Issuer) -> StoreResult<()> {
        let bytes = encode(issuer)?;
        let id = issuer.id.as_bytes();
        let address = &issuer.address.as_bytes()[..];

        let result = (&self.issuers, &self.issuer_addresses).transaction(|(issuers, addresses)| {
            if issuers.get(id)?.is_some() {
                return Err(ConflictableTransactionError::Abort(StoreError::Duplicate(
                    format!("issuer {}", issuer.id),
                )));
            }
            if addresses.get(address)?.is_some() {
                return Err(ConflictableTransactionError::Abort(StoreError::Duplicate(
                    format!("address {}", issuer.address),
                )));
            }
            issuers.insert(id, bytes.clone())?;
            addresses.insert(address, id)?;
            Ok(())
        });

        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    pub fn get_issuer(&self, id: &str) -> StoreResult<Option<Issuer>> {
        Self::get(&self.issuers, id.as_bytes())
    }

    pub fn issuer_id_for_address(&self, address: &AccountAddress) -> StoreResult<Option<String>> {
        Ok(self
            .issuer_addresses
            .get(&address.as_bytes()[..])?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    // -- Pending issuances ----------------------------------------------------

    /// Write-once insert. An existing record under the same seed is left
    /// untouched and the call fails with `Duplicate`.
    pub fn insert_pending(&self, record: &PendingIssuance) -> StoreResult<()> {
        let bytes = encode(record)?;
        self.issuances
            .compare_and_swap(record.seed.as_bytes(), None::<&[u8]>, Some(bytes))?
            .map_err(|_| StoreError::Duplicate(format!("issuance {}", record.seed)))
    }

    pub fn get_pending(&self, seed: &str) -> StoreResult<Option<PendingIssuance>> {
        Self::get(&self.issuances, seed.as_bytes())
    }

    /// Every pending issuance, in seed order.
    pub fn all_pending(&self) -> StoreResult<Vec<PendingIssuance>> {
        Self::scan(&self.issuances, &[])
    }

    // -- Confirmations --------------------------------------------------------

    /// Write-once insert. Returns the stored confirmation: `record` if it was
    /// the first, otherwise the one already there.
    pub fn insert_confirmation(
        &self,
        record: &IssuanceConfirmation,
    ) -> StoreResult<IssuanceConfirmation> {
        let bytes = encode(record)?;
        match self
            .confirmations
            .compare_and_swap(record.seed.as_bytes(), None::<&[u8]>, Some(bytes))?
        {
            Ok(()) => Ok(record.clone()),
            Err(existing) => match existing.current {
                Some(current) => decode(&current),
                None => Err(StoreError::Serialization(format!(
                    "confirmation {} vanished during insert",
                    record.seed
                ))),
            },
        }
    }

    pub fn get_confirmation(&self, seed: &str) -> StoreResult<Option<IssuanceConfirmation>> {
        Self::get(&self.confirmations, seed.as_bytes())
    }

    // -- Catalog ----------------------------------------------------------------

    pub fn insert_metadata(&self, entry: &CertificateMetadata) -> StoreResult<()> {
        let key = scoped_key(&entry.issuer_id, &entry.id);
        self.catalog.insert(key, encode(entry)?)?;
        Ok(())
    }

    pub fn metadata_for_issuer(&self, issuer_id: &str) -> StoreResult<Vec<CertificateMetadata>> {
        Self::scan(&self.catalog, &scope_prefix(issuer_id))
    }

    // -- Transactions -------------------------------------------------------------

    pub fn insert_transaction(&self, record: &TransactionRecord) -> StoreResult<()> {
        let key = scoped_key(&record.issuer_id, &record.hash);
        self.transactions.insert(key, encode(record)?)?;
        Ok(())
    }

    pub fn transactions_for_issuer(&self, issuer_id: &str) -> StoreResult<Vec<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> =
            Self::scan(&self.transactions, &scope_prefix(issuer_id))?;
        records.sort_by_key(|r| r.recorded_at);
        Ok(records)
    }

    // -- Utility ------------------------------------------------------------------

    pub fn issuer_count(&self) -> usize {
        self.issuers.len()
    }

    pub fn pending_count(&self) -> usize {
        self.issuances.len()
    }

    /// Block until all writes are durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
