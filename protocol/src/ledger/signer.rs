//! The administrative signer.
//!
//! Constructed once at startup from configuration and handed to the
//! components that submit transactions. There is no other place a signing
//! key lives.

use std::fmt;

use super::types::{AccountAddress, SignedTransaction, UnsignedTransaction};
use crate::crypto::keys::{LedgerKeypair, LedgerPublicKey, LedgerSignature};

pub struct LedgerSigner {
    keypair: LedgerKeypair,
}

impl LedgerSigner {
    pub fn new(keypair: LedgerKeypair) -> Self {
        Self { keypair }
    }

    pub fn address(&self) -> AccountAddress {
        self.keypair.address()
    }

    pub fn public_key(&self) -> LedgerPublicKey {
        self.keypair.public_key()
    }

    /// Signs arbitrary bytes. Used when the ledger supplies its own signing
    /// message (see the REST client's encode step).
    pub fn sign_message(&self, message: &[u8]) -> LedgerSignature {
        self.keypair.sign(message)
    }

    /// Signs `tx` over its canonical signing message.
    pub fn sign(&self, tx: UnsignedTransaction) -> SignedTransaction {
        let signature = self.keypair.sign(&tx.signing_message());
        SignedTransaction {
            raw: tx,
            public_key: self.keypair.public_key(),
            signature,
        }
    }
}

impl fmt::Debug for LedgerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerSigner(address={})", self.address())
    }
}
