//! # Local Ledger
//!
//! An in-process [`LedgerClient`] running the `CertManagement` module and a
//! minimal account model: balances, sequence numbers, gas fees. Devnet runs
//! and end-to-end tests use it in place of a fullnode.
//!
//! ## Execution model
//!
//! `submit` checks the signature, sequence number and expiry and parks the
//! transaction. It executes on the first `wait_for_finality` for its hash;
//! later waits return the stored outcome. Execution is serialized behind a
//! single mutex.
//!
//! A failed execution still charges the fee and consumes the sequence
//! number, as on a real network. An aborted transaction leaves module state
//! untouched.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use certichain_protocol::config::{
    CERT_MODULE, FRAMEWORK_ADDRESS, TRANSFER_FUNCTION, TRANSFER_MODULE,
};
use certichain_protocol::ledger::{
    AccountAddress, EntryArg, FinalityOutcome, FunctionRef, LedgerCertificateRecord,
    LedgerClient, LedgerError, PendingTransaction, SignedTransaction, UnsignedTransaction,
};

use crate::cert_management::CertManagement;

/// Gas units charged for every transaction, whatever it does.
pub const GAS_UNITS_PER_TRANSACTION: u64 = 10;

/// Balance `LocalLedger::devnet` gives the publisher at genesis.
pub const DEVNET_GENESIS_BALANCE: u64 = 100_000_000_000;

const EXECUTED: &str = "Executed successfully";

/// Failure modes tests can switch on, keyed by entry-function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalFault {
    /// `submit` refuses the transaction.
    RejectSubmit(String),
    /// Execution aborts with an injected error.
    AbortOnExecute(String),
    /// The transaction executes, but `wait_for_finality` reports a timeout.
    TimeoutAfterCommit(String),
}

#[derive(Debug)]
struct State {
    module_address: AccountAddress,
    module: CertManagement,
    balances: HashMap<AccountAddress, u64>,
    /// Next sequence number `build` hands out.
    next_sequence: HashMap<AccountAddress, u64>,
    /// Sequence numbers already accepted by `submit`.
    used_sequences: HashSet<(AccountAddress, u64)>,
    parked: HashMap<String, SignedTransaction>,
    outcomes: HashMap<String, FinalityOutcome>,
    faults: Vec<LocalFault>,
}

impl State {
    fn has_fault(&self, check: impl Fn(&LocalFault) -> bool) -> bool {
        self.faults.iter().any(check)
    }

    fn charge(&mut self, account: AccountAddress, amount: u64) -> Result<(), String> {
        let balance = self.balances.entry(account).or_insert(0);
        let current = *balance;
        *balance = current.checked_sub(amount).ok_or_else(|| {
            format!("EINSUFFICIENT_BALANCE: {account} has {current}, needs {amount}")
        })?;
        Ok(())
    }

    fn credit(&mut self, account: AccountAddress, amount: u64) -> Result<(), String> {
        let balance = self.balances.entry(account).or_insert(0);
        let current = *balance;
        *balance = current
            .checked_add(amount)
            .ok_or_else(|| format!("balance overflow for {account}"))?;
        Ok(())
    }

    fn transfer(&mut self, tx: &UnsignedTransaction) -> Result<(), String> {
        let args = &tx.payload.arguments;
        let (to, amount) = match args.as_slice() {
            [EntryArg::Address(to), EntryArg::U64(amount)] => (*to, *amount),
            _ => return Err("Move abort in 0x1::aptos_account: EBAD_ARGUMENTS".into()),
        };
        self.charge(tx.sender, amount)
            .map_err(|e| format!("Move abort in 0x1::coin: {e}"))?;
        self.credit(to, amount)
    }

    /// Applies `tx`. `Err` carries the `vm_status` of a failed execution.
    fn apply(&mut self, tx: &UnsignedTransaction) -> Result<(), String> {
        let function = &tx.payload.function;
        let fee = GAS_UNITS_PER_TRANSACTION.saturating_mul(tx.gas_unit_price);
        self.charge(tx.sender, fee)
            .map_err(|_| "INSUFFICIENT_BALANCE_FOR_TRANSACTION_FEE".to_string())?;

        if self.has_fault(|f| matches!(f, LocalFault::AbortOnExecute(n) if *n == function.function)) {
            return Err(format!(
                "Move abort in {}::{}: E_INJECTED(0xff)",
                function.address, function.module
            ));
        }

        let framework: AccountAddress = FRAMEWORK_ADDRESS
            .parse()
            .map_err(|e| format!("framework address: {e}"))?;
        if function.address == framework
            && function.module == TRANSFER_MODULE
            && function.function == TRANSFER_FUNCTION
        {
            return self.transfer(tx);
        }
        if function.address == self.module_address && function.module == CERT_MODULE {
            let module_address = self.module_address;
            return self
                .module
                .execute(tx.sender, &function.function, &tx.payload.arguments)
                .map_err(|e| e.vm_status(module_address));
        }
        Err(format!("LINKER_ERROR: {function} is not published"))
    }
}

/// See the module docs.
pub struct LocalLedger {
    state: Mutex<State>,
}

impl LocalLedger {
    /// A ledger with `CertManagement` published at `module_address` and no
    /// balances.
    pub fn new(module_address: AccountAddress) -> Self {
        Self {
            state: Mutex::new(State {
                module_address,
                module: CertManagement::new(module_address),
                balances: HashMap::new(),
                next_sequence: HashMap::new(),
                used_sequences: HashSet::new(),
                parked: HashMap::new(),
                outcomes: HashMap::new(),
                faults: Vec::new(),
            }),
        }
    }

    /// A ledger whose publisher starts with [`DEVNET_GENESIS_BALANCE`].
    pub fn devnet(module_address: AccountAddress) -> Self {
        let ledger = Self::new(module_address);
        ledger.mint(module_address, DEVNET_GENESIS_BALANCE);
        ledger
    }

    /// Faucet. Adds `amount` to `account`.
    pub fn mint(&self, account: AccountAddress, amount: u64) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(account).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, account: &AccountAddress) -> u64 {
        self.state.lock().balances.get(account).copied().unwrap_or(0)
    }

    pub fn inject(&self, fault: LocalFault) {
        self.state.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    pub fn certificate(&self, fingerprint: &str) -> Option<LedgerCertificateRecord> {
        self.state
            .lock()
            .module
            .get_certificate_issuance(fingerprint)
            .ok()
            .cloned()
    }

    pub fn is_approved_issuer(&self, address: &AccountAddress) -> bool {
        self.state.lock().module.is_approved(address)
    }

    /// Number of transactions that reached a final outcome.
    pub fn executed_count(&self) -> usize {
        self.state.lock().outcomes.len()
    }
}

#[async_trait]
impl LedgerClient for LocalLedger {
    async fn build(
        &self,
        sender: AccountAddress,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<UnsignedTransaction, LedgerError> {
        let mut state = self.state.lock();
        let seq = state.next_sequence.entry(sender).or_insert(0);
        let tx = UnsignedTransaction::new(sender, *seq, function, arguments);
        *seq += 1;
        Ok(tx)
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<PendingTransaction, LedgerError> {
        let mut state = self.state.lock();
        let name = tx.raw.payload.function.function.clone();

        if state.has_fault(|f| matches!(f, LocalFault::RejectSubmit(n) if *n == name)) {
            return Err(LedgerError::Rejected(format!("{name}: injected rejection")));
        }
        if !tx.verify() {
            return Err(LedgerError::Rejected("INVALID_SIGNATURE".into()));
        }
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        if tx.raw.expiration_timestamp_secs <= now {
            return Err(LedgerError::Rejected("TRANSACTION_EXPIRED".into()));
        }
        if !state
            .used_sequences
            .insert((tx.raw.sender, tx.raw.sequence_number))
        {
            return Err(LedgerError::Rejected("SEQUENCE_NUMBER_TOO_OLD".into()));
        }

        let hash = tx.hash();
        debug!(%hash, function = %name, "local ledger accepted transaction");
        state.parked.insert(hash.clone(), tx);
        Ok(PendingTransaction { hash })
    }

    async fn wait_for_finality(
        &self,
        hash: &str,
        timeout: Duration,
    ) -> Result<FinalityOutcome, LedgerError> {
        let mut state = self.state.lock();

        if let Some(outcome) = state.outcomes.get(hash).cloned() {
            return Ok(outcome);
        }

        let tx = state
            .parked
            .remove(hash)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {hash}")))?;
        let (success, vm_status) = match state.apply(&tx.raw) {
            Ok(()) => (true, EXECUTED.to_string()),
            Err(status) => (false, status),
        };
        let outcome = FinalityOutcome {
            hash: hash.to_string(),
            success,
            vm_status,
        };
        debug!(hash, success, "local ledger executed transaction");
        state.outcomes.insert(hash.to_string(), outcome.clone());

        let name = tx.raw.payload.function.function;
        if state.has_fault(|f| matches!(f, LocalFault::TimeoutAfterCommit(n) if *n == name)) {
            return Err(LedgerError::Timeout {
                hash: hash.to_string(),
                after: timeout,
            });
        }
        Ok(outcome)
    }

    async fn view(
        &self,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<Vec<Value>, LedgerError> {
        let state = self.state.lock();
        if function.address != state.module_address || function.module != CERT_MODULE {
            return Err(LedgerError::Rejected(format!(
                "FUNCTION_RESOLUTION_FAILURE: {function}"
            )));
        }
        state
            .module
            .view(&function.function, &arguments)
            .map_err(|e| LedgerError::Rejected(e.vm_status(state.module_address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certichain_protocol::crypto::keys::LedgerKeypair;
    use certichain_protocol::ledger::LedgerSigner;

    fn transfer_fn() -> FunctionRef {
        "0x1::aptos_account::transfer".parse().unwrap()
    }

    #[tokio::test]
    async fn transfer_moves_balance_and_charges_fee() {
        let signer = LedgerSigner::new(LedgerKeypair::from_seed(&[1; 32]));
        let ledger = LocalLedger::new(signer.address());
        ledger.mint(signer.address(), 10_000);
        let to = AccountAddress::new([8; 32]);

        let tx = ledger
            .build(signer.address(), transfer_fn(), vec![EntryArg::Address(to), EntryArg::U64(500)])
            .await
            .unwrap();
        let fee = GAS_UNITS_PER_TRANSACTION * tx.gas_unit_price;
        let pending = ledger.sign_and_submit(&signer, tx).await.unwrap();
        let outcome = ledger
            .wait_for_finality(&pending.hash, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(outcome.success, "{}", outcome.vm_status);
        assert_eq!(ledger.balance(&to), 500);
        assert_eq!(ledger.balance(&signer.address()), 10_000 - 500 - fee);
    }

    #[tokio::test]
    async fn broke_sender_fails_at_execution() {
        let signer = LedgerSigner::new(LedgerKeypair::from_seed(&[1; 32]));
        let ledger = LocalLedger::new(signer.address());
        let tx = ledger
            .build(
                signer.address(),
                transfer_fn(),
                vec![EntryArg::Address(signer.address()), EntryArg::U64(1)],
            )
            .await
            .unwrap();
        let pending = ledger.sign_and_submit(&signer, tx).await.unwrap();
        let outcome = ledger
            .wait_for_finality(&pending.hash, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.vm_status.contains("INSUFFICIENT_BALANCE"));
    }

    #[tokio::test]
    async fn forged_signature_rejected() {
        let admin = LedgerSigner::new(LedgerKeypair::from_seed(&[1; 32]));
        let mallory = LedgerSigner::new(LedgerKeypair::from_seed(&[2; 32]));
        let ledger = LocalLedger::devnet(admin.address());

        let tx = ledger
            .build(admin.address(), transfer_fn(), vec![])
            .await
            .unwrap();
        let err = ledger.submit(mallory.sign(tx)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(msg) if msg == "INVALID_SIGNATURE"));
    }

    #[tokio::test]
    async fn replayed_sequence_rejected() {
        let signer = LedgerSigner::new(LedgerKeypair::from_seed(&[1; 32]));
        let ledger = LocalLedger::devnet(signer.address());
        let tx = ledger
            .build(
                signer.address(),
                transfer_fn(),
                vec![EntryArg::Address(signer.address()), EntryArg::U64(1)],
            )
            .await
            .unwrap();
        let signed = signer.sign(tx);
        ledger.submit(signed.clone()).await.unwrap();
        assert!(matches!(
            ledger.submit(signed).await,
            Err(LedgerError::Rejected(msg)) if msg.contains("SEQUENCE_NUMBER")
        ));
    }

    #[tokio::test]
    async fn finality_is_idempotent() {
        let signer = LedgerSigner::new(LedgerKeypair::from_seed(&[1; 32]));
        let ledger = LocalLedger::devnet(signer.address());
        let tx = ledger
            .build(
                signer.address(),
                transfer_fn(),
                vec![EntryArg::Address(signer.address()), EntryArg::U64(1)],
            )
            .await
            .unwrap();
        let pending = ledger.sign_and_submit(&signer, tx).await.unwrap();
        let first = ledger
            .wait_for_finality(&pending.hash, Duration::from_secs(1))
            .await
            .unwrap();
        let second = ledger
            .wait_for_finality(&pending.hash, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.executed_count(), 1);
    }

    #[tokio::test]
    async fn unknown_hash_not_found() {
        let ledger = LocalLedger::new(AccountAddress::new([1; 32]));
        assert!(matches!(
            ledger.wait_for_finality("0xnope", Duration::from_secs(1)).await,
            Err(LedgerError::NotFound(_))
        ));
    }
}
