//! Scripted in-memory ledger for unit tests.
//!
//! Records every call as `"<stage> <function>"` so tests can assert on
//! ordering, applies just enough `CertManagement` behaviour for lookups to
//! work, and fails on demand.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::config::{GET_CERTIFICATE_FUNCTION, ISSUE_CERT_FUNCTION, REVOKE_CERT_FUNCTION};
use crate::ledger::{
    AccountAddress, EntryArg, FinalityOutcome, FunctionRef, LedgerCertificateRecord,
    LedgerClient, LedgerError, PendingTransaction, SignedTransaction, UnsignedTransaction,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fault {
    SubmitRejected(&'static str),
    FinalityFails(&'static str),
    FinalityTimesOut(&'static str),
    /// `view` returns a response with the wrong shape.
    MalformedView,
}

#[derive(Default)]
pub(crate) struct ScriptedLedger {
    calls: Mutex<Vec<String>>,
    faults: Mutex<Vec<Fault>>,
    sequence: Mutex<HashMap<AccountAddress, u64>>,
    submitted: Mutex<HashMap<String, SignedTransaction>>,
    certificates: Mutex<HashMap<String, LedgerCertificateRecord>>,
}

fn text(args: &[EntryArg], i: usize) -> String {
    match args.get(i) {
        Some(EntryArg::String(s)) => s.clone(),
        _ => String::new(),
    }
}

impl ScriptedLedger {
    pub(crate) fn inject(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn insert_certificate(&self, record: LedgerCertificateRecord) {
        self.certificates
            .lock()
            .insert(record.fingerprint.clone(), record);
    }

    pub(crate) fn certificate(&self, fingerprint: &str) -> Option<LedgerCertificateRecord> {
        self.certificates.lock().get(fingerprint).cloned()
    }

    fn record(&self, stage: &str, function: &FunctionRef) {
        self.calls
            .lock()
            .push(format!("{stage} {}", function.function));
    }

    fn has(&self, check: impl Fn(&Fault) -> bool) -> bool {
        self.faults.lock().iter().any(check)
    }

    fn apply(&self, tx: &UnsignedTransaction) {
        let args = &tx.payload.arguments;
        let function = tx.payload.function.function.as_str();
        if function == ISSUE_CERT_FUNCTION {
            let record = LedgerCertificateRecord {
                fingerprint: text(args, 0),
                recipient_name: text(args, 1),
                recipient_email: text(args, 2),
                recipient_photo_url: text(args, 3),
                certificate_url: text(args, 4),
                certificate_id: text(args, 5),
                issuance_date: text(args, 6),
                description: text(args, 7),
                issuer: text(args, 8),
                is_valid: true,
            };
            self.insert_certificate(record);
        } else if function == REVOKE_CERT_FUNCTION {
            if let Some(r) = self.certificates.lock().get_mut(&text(args, 0)) {
                r.is_valid = false;
            }
        }
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn build(
        &self,
        sender: AccountAddress,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<UnsignedTransaction, LedgerError> {
        self.record("build", &function);
        let mut seqs = self.sequence.lock();
        let seq = seqs.entry(sender).or_insert(0);
        let tx = UnsignedTransaction::new(sender, *seq, function, arguments);
        *seq += 1;
        Ok(tx)
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<PendingTransaction, LedgerError> {
        let function = tx.raw.payload.function.clone();
        self.record("submit", &function);
        if self.has(|f| matches!(f, Fault::SubmitRejected(n) if *n == function.function)) {
            return Err(LedgerError::Rejected("scripted rejection".into()));
        }
        let hash = tx.hash();
        self.submitted.lock().insert(hash.clone(), tx);
        Ok(PendingTransaction { hash })
    }

    async fn wait_for_finality(
        &self,
        hash: &str,
        timeout: Duration,
    ) -> Result<FinalityOutcome, LedgerError> {
        let tx = self
            .submitted
            .lock()
            .get(hash)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(hash.to_string()))?;
        let function = tx.raw.payload.function.clone();
        self.record("final", &function);
        let name = function.function.as_str();

        if self.has(|f| matches!(f, Fault::FinalityTimesOut(n) if *n == name)) {
            return Err(LedgerError::Timeout {
                hash: hash.to_string(),
                after: timeout,
            });
        }
        if self.has(|f| matches!(f, Fault::FinalityFails(n) if *n == name)) {
            return Ok(FinalityOutcome {
                hash: hash.to_string(),
                success: false,
                vm_status: "Move abort: scripted".into(),
            });
        }
        self.apply(&tx.raw);
        Ok(FinalityOutcome {
            hash: hash.to_string(),
            success: true,
            vm_status: "Executed successfully".into(),
        })
    }

    async fn view(
        &self,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<Vec<Value>, LedgerError> {
        self.record("view", &function);
        if function.function != GET_CERTIFICATE_FUNCTION {
            return Err(LedgerError::Rejected("unknown view".into()));
        }
        if self.has(|f| *f == Fault::MalformedView) {
            return Ok(vec![Value::String("only one field".into())]);
        }
        let fingerprint = text(&arguments, 1);
        self.certificate(&fingerprint)
            .map(|r| r.to_view_values())
            .ok_or_else(|| LedgerError::Rejected("certificate not found".into()))
    }
}
