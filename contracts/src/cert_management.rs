//! # CertManagement Module
//!
//! Certificate state as the ledger module keeps it: an allow-list of
//! approved issuers and one record per fingerprint.
//!
//! ## Rules
//!
//! - Only the publisher may add approved issuers.
//! - Only the publisher or an approved issuer may send `issue_cert` or
//!   `revoke_cert`.
//! - A fingerprint is written once. A second `issue_cert` for it aborts.
//! - Revocation flips `is_valid` to false, only for the issuer recorded on
//!   the certificate, and only once. There is no way back to valid.
//!
//! Aborts carry a numeric code, reported the way a Move VM would:
//! `Move abort in <module>: E_NAME(0x..)`.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use certichain_protocol::config::{
    ADD_APPROVED_ISSUER_FUNCTION, CERT_MODULE, GET_CERTIFICATE_FUNCTION, ISSUE_CERT_FUNCTION,
    REVOKE_CERT_FUNCTION,
};
use certichain_protocol::ledger::{AccountAddress, EntryArg, LedgerCertificateRecord};

/// View returning `[bool]` for an address.
pub const IS_APPROVED_ISSUER_FUNCTION: &str = "is_approved_issuer";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("only the module publisher can do this")]
    NotPublisher,

    #[error("sender {0} is not an approved issuer")]
    NotApproved(AccountAddress),

    #[error("certificate {0} already exists")]
    CertificateExists(String),

    #[error("certificate {0} not found")]
    CertificateNotFound(String),

    #[error("only the original issuer can revoke certificate {0}")]
    NotOriginalIssuer(String),

    #[error("certificate {0} is already revoked")]
    AlreadyRevoked(String),

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("unknown function {0}")]
    UnknownFunction(String),
}

impl ContractError {
    pub fn abort_code(&self) -> u64 {
        match self {
            Self::NotPublisher => 1,
            Self::NotApproved(_) => 2,
            Self::CertificateExists(_) => 3,
            Self::CertificateNotFound(_) => 4,
            Self::NotOriginalIssuer(_) => 5,
            Self::AlreadyRevoked(_) => 6,
            Self::BadArguments(_) => 7,
            Self::UnknownFunction(_) => 8,
        }
    }

    pub fn abort_name(&self) -> &'static str {
        match self {
            Self::NotPublisher => "E_NOT_PUBLISHER",
            Self::NotApproved(_) => "E_NOT_APPROVED_ISSUER",
            Self::CertificateExists(_) => "E_CERT_EXISTS",
            Self::CertificateNotFound(_) => "E_CERT_NOT_FOUND",
            Self::NotOriginalIssuer(_) => "E_NOT_ORIGINAL_ISSUER",
            Self::AlreadyRevoked(_) => "E_ALREADY_REVOKED",
            Self::BadArguments(_) => "E_BAD_ARGUMENTS",
            Self::UnknownFunction(_) => "E_UNKNOWN_FUNCTION",
        }
    }

    /// `vm_status` string for a transaction that hit this abort.
    pub fn vm_status(&self, module_address: AccountAddress) -> String {
        format!(
            "Move abort in {module_address}::{CERT_MODULE}: {}(0x{:x}): {self}",
            self.abort_name(),
            self.abort_code()
        )
    }
}

// ---------------------------------------------------------------------------
// Module state
// ---------------------------------------------------------------------------

/// In-memory state of one published `CertManagement` module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertManagement {
    publisher: AccountAddress,
    approved: BTreeSet<AccountAddress>,
    certificates: HashMap<String, LedgerCertificateRecord>,
}

impl CertManagement {
    pub fn new(publisher: AccountAddress) -> Self {
        Self {
            publisher,
            approved: BTreeSet::new(),
            certificates: HashMap::new(),
        }
    }

    pub fn publisher(&self) -> AccountAddress {
        self.publisher
    }

    pub fn is_approved(&self, address: &AccountAddress) -> bool {
        self.approved.contains(address)
    }

    fn require_issuer(&self, sender: AccountAddress) -> Result<(), ContractError> {
        if sender == self.publisher || self.approved.contains(&sender) {
            Ok(())
        } else {
            Err(ContractError::NotApproved(sender))
        }
    }

    /// Adding an already approved issuer is a no-op.
    pub fn add_approved_issuer(
        &mut self,
        sender: AccountAddress,
        issuer: AccountAddress,
    ) -> Result<(), ContractError> {
        if sender != self.publisher {
            return Err(ContractError::NotPublisher);
        }
        self.approved.insert(issuer);
        Ok(())
    }

    pub fn issue_cert(
        &mut self,
        sender: AccountAddress,
        record: LedgerCertificateRecord,
    ) -> Result<(), ContractError> {
        self.require_issuer(sender)?;
        if self.certificates.contains_key(&record.fingerprint) {
            return Err(ContractError::CertificateExists(record.fingerprint));
        }
        self.certificates
            .insert(record.fingerprint.clone(), LedgerCertificateRecord { is_valid: true, ..record });
        Ok(())
    }

    pub fn revoke_cert(
        &mut self,
        sender: AccountAddress,
        fingerprint: &str,
        issuer: &str,
    ) -> Result<(), ContractError> {
        self.require_issuer(sender)?;
        let record = self
            .certificates
            .get_mut(fingerprint)
            .ok_or_else(|| ContractError::CertificateNotFound(fingerprint.to_string()))?;
        if record.issuer != issuer {
            return Err(ContractError::NotOriginalIssuer(fingerprint.to_string()));
        }
        if !record.is_valid {
            return Err(ContractError::AlreadyRevoked(fingerprint.to_string()));
        }
        record.is_valid = false;
        Ok(())
    }

    pub fn get_certificate_issuance(
        &self,
        fingerprint: &str,
    ) -> Result<&LedgerCertificateRecord, ContractError> {
        self.certificates
            .get(fingerprint)
            .ok_or_else(|| ContractError::CertificateNotFound(fingerprint.to_string()))
    }

    pub fn certificate_count(&self) -> usize {
        self.certificates.len()
    }

    // -----------------------------------------------------------------------
    // Entry / view dispatch
    // -----------------------------------------------------------------------

    /// Runs an entry function by name with positional arguments.
    pub fn execute(
        &mut self,
        sender: AccountAddress,
        function: &str,
        args: &[EntryArg],
    ) -> Result<(), ContractError> {
        match function {
            ADD_APPROVED_ISSUER_FUNCTION => {
                expect_len(args, 1)?;
                self.add_approved_issuer(sender, address_arg(args, 0)?)
            }
            ISSUE_CERT_FUNCTION => {
                expect_len(args, 9)?;
                let record = LedgerCertificateRecord {
                    fingerprint: string_arg(args, 0)?,
                    recipient_name: string_arg(args, 1)?,
                    recipient_email: string_arg(args, 2)?,
                    recipient_photo_url: string_arg(args, 3)?,
                    certificate_url: string_arg(args, 4)?,
                    certificate_id: string_arg(args, 5)?,
                    issuance_date: string_arg(args, 6)?,
                    description: string_arg(args, 7)?,
                    issuer: string_arg(args, 8)?,
                    is_valid: true,
                };
                self.issue_cert(sender, record)
            }
            REVOKE_CERT_FUNCTION => {
                expect_len(args, 2)?;
                self.revoke_cert(sender, &string_arg(args, 0)?, &string_arg(args, 1)?)
            }
            other => Err(ContractError::UnknownFunction(other.to_string())),
        }
    }

    /// Runs a view function by name. The first argument of every view is
    /// the module address, which the caller has already routed on.
    pub fn view(&self, function: &str, args: &[EntryArg]) -> Result<Vec<Value>, ContractError> {
        match function {
            GET_CERTIFICATE_FUNCTION => {
                expect_len(args, 2)?;
                let record = self.get_certificate_issuance(&string_arg(args, 1)?)?;
                Ok(record.to_view_values())
            }
            IS_APPROVED_ISSUER_FUNCTION => {
                expect_len(args, 1)?;
                Ok(vec![Value::Bool(self.is_approved(&address_arg(args, 0)?))])
            }
            other => Err(ContractError::UnknownFunction(other.to_string())),
        }
    }
}

fn expect_len(args: &[EntryArg], n: usize) -> Result<(), ContractError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(ContractError::BadArguments(format!(
            "expected {n} arguments, got {}",
            args.len()
        )))
    }
}

fn string_arg(args: &[EntryArg], i: usize) -> Result<String, ContractError> {
    match &args[i] {
        EntryArg::String(s) => Ok(s.clone()),
        // Addresses may be passed where the module takes a string reference.
        EntryArg::Address(a) => Ok(a.to_string()),
        other => Err(ContractError::BadArguments(format!(
            "argument {i}: expected string, got {other:?}"
        ))),
    }
}

fn address_arg(args: &[EntryArg], i: usize) -> Result<AccountAddress, ContractError> {
    match &args[i] {
        EntryArg::Address(a) => Ok(*a),
        EntryArg::String(s) => s
            .parse()
            .map_err(|e| ContractError::BadArguments(format!("argument {i}: {e}"))),
        other => Err(ContractError::BadArguments(format!(
            "argument {i}: expected address, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> AccountAddress {
        AccountAddress::new([b; 32])
    }

    fn record(fp: &str, issuer: &str) -> LedgerCertificateRecord {
        LedgerCertificateRecord {
            certificate_id: "CERT-1".into(),
            fingerprint: fp.into(),
            recipient_name: "Barbara Liskov".into(),
            recipient_email: "liskov@example.org".into(),
            recipient_photo_url: String::new(),
            certificate_url: "https://certs.example.org/1".into(),
            description: "Data Abstraction".into(),
            issuance_date: "2026-04-10".into(),
            issuer: issuer.into(),
            is_valid: true,
        }
    }

    #[test]
    fn only_publisher_approves() {
        let mut m = CertManagement::new(addr(1));
        assert_eq!(
            m.add_approved_issuer(addr(2), addr(3)),
            Err(ContractError::NotPublisher)
        );
        m.add_approved_issuer(addr(1), addr(3)).unwrap();
        m.add_approved_issuer(addr(1), addr(3)).unwrap();
        assert!(m.is_approved(&addr(3)));
    }

    #[test]
    fn unapproved_sender_cannot_issue() {
        let mut m = CertManagement::new(addr(1));
        let err = m.issue_cert(addr(9), record("fp", "i")).unwrap_err();
        assert_eq!(err, ContractError::NotApproved(addr(9)));
        assert_eq!(m.certificate_count(), 0);
    }

    #[test]
    fn fingerprint_written_once() {
        let mut m = CertManagement::new(addr(1));
        m.issue_cert(addr(1), record("fp", "i")).unwrap();
        let mut second = record("fp", "i");
        second.recipient_name = "Someone Else".into();
        assert!(matches!(
            m.issue_cert(addr(1), second),
            Err(ContractError::CertificateExists(_))
        ));
        assert_eq!(
            m.get_certificate_issuance("fp").unwrap().recipient_name,
            "Barbara Liskov"
        );
    }

    #[test]
    fn revocation_is_monotonic() {
        let mut m = CertManagement::new(addr(1));
        m.issue_cert(addr(1), record("fp", "issuer-a")).unwrap();

        assert!(matches!(
            m.revoke_cert(addr(1), "fp", "issuer-b"),
            Err(ContractError::NotOriginalIssuer(_))
        ));
        assert!(m.get_certificate_issuance("fp").unwrap().is_valid);

        m.revoke_cert(addr(1), "fp", "issuer-a").unwrap();
        assert!(!m.get_certificate_issuance("fp").unwrap().is_valid);

        assert!(matches!(
            m.revoke_cert(addr(1), "fp", "issuer-a"),
            Err(ContractError::AlreadyRevoked(_))
        ));
        // Re-issuing does not resurrect it.
        assert!(m.issue_cert(addr(1), record("fp", "issuer-a")).is_err());
        assert!(!m.get_certificate_issuance("fp").unwrap().is_valid);
    }

    #[test]
    fn execute_decodes_positional_args() {
        let mut m = CertManagement::new(addr(1));
        let args: Vec<EntryArg> = [
            "fp", "Name", "mail", "photo", "url", "CERT-9", "2026-01-01", "desc", "issuer",
        ]
        .into_iter()
        .map(EntryArg::from)
        .collect();
        m.execute(addr(1), ISSUE_CERT_FUNCTION, &args).unwrap();

        let values = m
            .view(
                GET_CERTIFICATE_FUNCTION,
                &[EntryArg::Address(addr(1)), "fp".into()],
            )
            .unwrap();
        let decoded = LedgerCertificateRecord::decode(&values).unwrap();
        assert_eq!(decoded.certificate_id, "CERT-9");
        assert_eq!(decoded.issuance_date, "2026-01-01");
        assert!(decoded.is_valid);
    }

    #[test]
    fn execute_rejects_wrong_arity() {
        let mut m = CertManagement::new(addr(1));
        let err = m
            .execute(addr(1), ISSUE_CERT_FUNCTION, &["fp".into()])
            .unwrap_err();
        assert!(matches!(err, ContractError::BadArguments(_)));
        assert!(err.vm_status(addr(1)).contains("E_BAD_ARGUMENTS(0x7)"));
    }
}
