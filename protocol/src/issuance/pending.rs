//! # Pending-Issuance Ledger
//!
//! The off-chain half of an issuance. A [`PendingIssuance`] is written when a
//! fingerprint is handed out and is never changed or removed afterwards.
//! Whether the matching certificate made it onto the ledger is tracked by a
//! separate write-once [`IssuanceConfirmation`], so status is a derived
//! two-state value: `Pending` until a confirmation exists, `Confirmed` after.

use chrono::Utc;
use std::time::Duration;
use tracing::info;

use super::error::{IssuanceError, IssuanceResult};
use crate::ledger::AccountAddress;
use crate::store::{
    ConfirmationSource, IssuanceConfirmation, IssuanceStatus, PendingIssuance, RecordStore,
};

#[derive(Debug, Clone)]
pub struct PendingIssuanceLedger {
    store: RecordStore,
}

impl PendingIssuanceLedger {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Creates a new pending record. A second call under the same seed fails
    /// with `Persistence(Duplicate)` and leaves the first record as it was.
    pub fn create_pending(
        &self,
        seed: &str,
        issuer_address: AccountAddress,
        issuer_id: &str,
        is_private: bool,
    ) -> IssuanceResult<PendingIssuance> {
        if seed.is_empty() {
            return Err(IssuanceError::InvalidInput("empty issuance id".into()));
        }
        let record = PendingIssuance {
            seed: seed.to_string(),
            issuer_id: issuer_id.to_string(),
            issuer_address,
            is_private,
            created_at: Utc::now(),
        };
        self.store.insert_pending(&record)?;
        info!(seed, issuer_id, "pending issuance recorded");
        Ok(record)
    }

    pub fn get(&self, seed: &str) -> IssuanceResult<PendingIssuance> {
        self.store
            .get_pending(seed)?
            .ok_or_else(|| IssuanceError::NotFound(format!("issuance {seed}")))
    }

    pub fn status(&self, seed: &str) -> IssuanceResult<IssuanceStatus> {
        self.get(seed)?;
        Ok(match self.store.get_confirmation(seed)? {
            Some(_) => IssuanceStatus::Confirmed,
            None => IssuanceStatus::Pending,
        })
    }

    pub fn confirmation(&self, seed: &str) -> IssuanceResult<Option<IssuanceConfirmation>> {
        Ok(self.store.get_confirmation(seed)?)
    }

    /// Marks `seed` confirmed. Idempotent: if a confirmation already exists
    /// it is returned unchanged.
    pub fn confirm(
        &self,
        seed: &str,
        transaction_hash: Option<String>,
        source: ConfirmationSource,
    ) -> IssuanceResult<IssuanceConfirmation> {
        self.get(seed)?;
        let stored = self.store.insert_confirmation(&IssuanceConfirmation {
            seed: seed.to_string(),
            transaction_hash,
            confirmed_at: Utc::now(),
            source,
        })?;
        info!(seed, source = ?stored.source, "issuance confirmed");
        Ok(stored)
    }

    /// Unconfirmed records created more than `age` ago.
    pub fn unconfirmed_older_than(&self, age: Duration) -> IssuanceResult<Vec<PendingIssuance>> {
        let age = chrono::Duration::from_std(age)
            .map_err(|e| IssuanceError::InvalidInput(format!("age out of range: {e}")))?;
        let cutoff = Utc::now() - age;

        let mut out = Vec::new();
        for record in self.store.all_pending()? {
            if record.created_at <= cutoff && self.store.get_confirmation(&record.seed)?.is_none() {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub fn list_for_issuer(&self, issuer_id: &str) -> IssuanceResult<Vec<PendingIssuance>> {
        Ok(self
            .store
            .all_pending()?
            .into_iter()
            .filter(|r| r.issuer_id == issuer_id)
            .collect())
    }

    /// Flushes the underlying store to disk.
    pub fn flush(&self) -> IssuanceResult<()> {
        Ok(self.store.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    fn ledger() -> PendingIssuanceLedger {
        PendingIssuanceLedger::new(RecordStore::open_temporary().unwrap())
    }

    fn addr() -> AccountAddress {
        AccountAddress::new([4; 32])
    }

    #[test]
    fn create_then_get() {
        let l = ledger();
        let created = l.create_pending("seed-1", addr(), "issuer-1", true).unwrap();
        assert_eq!(l.get("seed-1").unwrap(), created);
        assert_eq!(l.status("seed-1").unwrap(), IssuanceStatus::Pending);
    }

    #[test]
    fn duplicate_seed_rejected_and_first_kept() {
        let l = ledger();
        let first = l.create_pending("seed-1", addr(), "issuer-1", false).unwrap();
        let err = l
            .create_pending("seed-1", addr(), "issuer-2", true)
            .unwrap_err();
        assert!(matches!(
            err,
            IssuanceError::Persistence(StoreError::Duplicate(_))
        ));
        assert_eq!(l.get("seed-1").unwrap(), first);
    }

    #[test]
    fn confirm_is_idempotent() {
        let l = ledger();
        l.create_pending("seed-1", addr(), "issuer-1", false).unwrap();

        let first = l
            .confirm("seed-1", Some("0xabc".into()), ConfirmationSource::Driver)
            .unwrap();
        let second = l
            .confirm("seed-1", None, ConfirmationSource::Reconciler)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.source, ConfirmationSource::Driver);
        assert_eq!(l.status("seed-1").unwrap(), IssuanceStatus::Confirmed);
    }

    #[test]
    fn confirm_unknown_seed_is_not_found() {
        let err = ledger()
            .confirm("nope", None, ConfirmationSource::Driver)
            .unwrap_err();
        assert!(matches!(err, IssuanceError::NotFound(_)));
    }

    #[test]
    fn unconfirmed_filter() {
        let l = ledger();
        l.create_pending("a", addr(), "issuer-1", false).unwrap();
        l.create_pending("b", addr(), "issuer-1", false).unwrap();
        l.confirm("a", None, ConfirmationSource::Driver).unwrap();

        let stale = l.unconfirmed_older_than(Duration::ZERO).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].seed, "b");

        assert!(l
            .unconfirmed_older_than(Duration::from_secs(3600))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn list_for_issuer_filters() {
        let l = ledger();
        l.create_pending("a", addr(), "issuer-1", false).unwrap();
        l.create_pending("b", addr(), "issuer-2", false).unwrap();
        assert_eq!(l.list_for_issuer("issuer-1").unwrap().len(), 1);
    }

    #[test]
    fn empty_seed_rejected() {
        assert!(matches!(
            ledger().create_pending("", addr(), "issuer-1", false),
            Err(IssuanceError::InvalidInput(_))
        ));
    }
}
