//! Value types shared by every [`LedgerClient`](super::LedgerClient)
//! implementation: addresses, function references, entry-function
//! arguments, and the unsigned → signed → pending → final transaction chain.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{DEFAULT_GAS_UNIT_PRICE, DEFAULT_MAX_GAS_AMOUNT, TX_EXPIRATION_SECS};
use crate::crypto::hash::{sha256_array, sha256_multi};
use crate::crypto::keys::{LedgerPublicKey, LedgerSignature};

/// Domain separator prepended to every signing message so a transaction
/// signature can never be replayed as a signature over something else.
const RAW_TRANSACTION_DOMAIN: &[u8] = b"CERTICHAIN::RawTransaction";

// ---------------------------------------------------------------------------
// AccountAddress
// ---------------------------------------------------------------------------

/// Errors parsing an [`AccountAddress`] or [`FunctionRef`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("address must be 1 to 64 hex characters after 0x")]
    BadLength,

    #[error("address contains non-hex characters")]
    NotHex,

    #[error("function reference must look like <address>::<module>::<function>")]
    BadFunction,
}

/// A 32-byte ledger account address.
///
/// Displays as `0x` followed by 64 lower-case hex characters. Parsing also
/// accepts the short form used for framework addresses (`0x1`), which is
/// left-padded with zeros.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress([u8; 32]);

impl AccountAddress {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for AccountAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").ok_or(AddressError::MissingPrefix)?;
        if digits.is_empty() || digits.len() > 64 {
            return Err(AddressError::BadLength);
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AddressError::NotHex);
        }
        let padded = format!("{:0>64}", digits.to_ascii_lowercase());
        let bytes = hex::decode(padded).map_err(|_| AddressError::NotHex)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountAddress> for String {
    fn from(value: AccountAddress) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self)
    }
}

// ---------------------------------------------------------------------------
// FunctionRef
// ---------------------------------------------------------------------------

/// A fully-qualified Move function: `<address>::<module>::<function>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub address: AccountAddress,
    pub module: String,
    pub function: String,
}

impl FunctionRef {
    pub fn new(address: AccountAddress, module: &str, function: &str) -> Self {
        Self {
            address,
            module: module.to_string(),
            function: function.to_string(),
        }
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.function)
    }
}

impl FromStr for FunctionRef {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split("::");
        let (Some(address), Some(module), Some(function), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AddressError::BadFunction);
        };
        if module.is_empty() || function.is_empty() {
            return Err(AddressError::BadFunction);
        }
        Ok(Self::new(address.parse()?, module, function))
    }
}

// ---------------------------------------------------------------------------
// EntryArg
// ---------------------------------------------------------------------------

/// An argument to an entry or view function.
///
/// The JSON form follows the fullnode REST conventions: `u64` travels as a
/// decimal string, addresses as `0x` hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryArg {
    Address(AccountAddress),
    U64(u64),
    String(String),
    Bool(bool),
}

impl EntryArg {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Address(a) => Value::String(a.to_string()),
            Self::U64(n) => Value::String(n.to_string()),
            Self::String(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
        }
    }

    /// Canonical bytes for the signing message. Tag byte, then a
    /// length-prefixed or fixed-width body.
    fn write_canonical(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Address(a) => {
                buf.push(0x00);
                buf.extend_from_slice(a.as_bytes());
            }
            Self::U64(n) => {
                buf.push(0x01);
                buf.extend_from_slice(&n.to_le_bytes());
            }
            Self::String(s) => {
                buf.push(0x02);
                buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            Self::Bool(b) => {
                buf.push(0x03);
                buf.push(u8::from(*b));
            }
        }
    }
}

impl From<&str> for EntryArg {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EntryArg {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<AccountAddress> for EntryArg {
    fn from(value: AccountAddress) -> Self {
        Self::Address(value)
    }
}

impl From<u64> for EntryArg {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// The entry-function call a transaction carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFunctionPayload {
    pub function: FunctionRef,
    pub arguments: Vec<EntryArg>,
}

/// A transaction ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub sender: AccountAddress,
    pub sequence_number: u64,
    pub payload: EntryFunctionPayload,
    pub max_gas_amount: u64,
    pub gas_unit_price: u64,
    /// Unix seconds after which the ledger must refuse the transaction.
    pub expiration_timestamp_secs: u64,
}

impl UnsignedTransaction {
    /// Builds a transaction with the default gas settings, expiring
    /// [`TX_EXPIRATION_SECS`] from now.
    pub fn new(
        sender: AccountAddress,
        sequence_number: u64,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Self {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
        Self {
            sender,
            sequence_number,
            payload: EntryFunctionPayload {
                function,
                arguments,
            },
            max_gas_amount: DEFAULT_MAX_GAS_AMOUNT,
            gas_unit_price: DEFAULT_GAS_UNIT_PRICE,
            expiration_timestamp_secs: now + TX_EXPIRATION_SECS,
        }
    }

    /// The bytes a signer signs.
    ///
    /// `SHA-256(domain) || sender || seq || function || args || gas || price || expiry`,
    /// integers little-endian, strings length-prefixed.
    pub fn signing_message(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&sha256_array(RAW_TRANSACTION_DOMAIN));
        buf.extend_from_slice(self.sender.as_bytes());
        buf.extend_from_slice(&self.sequence_number.to_le_bytes());

        let function = self.payload.function.to_string();
        buf.extend_from_slice(&(function.len() as u32).to_le_bytes());
        buf.extend_from_slice(function.as_bytes());

        buf.extend_from_slice(&(self.payload.arguments.len() as u32).to_le_bytes());
        for arg in &self.payload.arguments {
            arg.write_canonical(&mut buf);
        }

        buf.extend_from_slice(&self.max_gas_amount.to_le_bytes());
        buf.extend_from_slice(&self.gas_unit_price.to_le_bytes());
        buf.extend_from_slice(&self.expiration_timestamp_secs.to_le_bytes());
        buf
    }

    /// JSON body in the fullnode REST shape, without a signature.
    pub fn to_json(&self) -> Value {
        json!({
            "sender": self.sender.to_string(),
            "sequence_number": self.sequence_number.to_string(),
            "max_gas_amount": self.max_gas_amount.to_string(),
            "gas_unit_price": self.gas_unit_price.to_string(),
            "expiration_timestamp_secs": self.expiration_timestamp_secs.to_string(),
            "payload": {
                "type": "entry_function_payload",
                "function": self.payload.function.to_string(),
                "type_arguments": [],
                "arguments": self
                    .payload
                    .arguments
                    .iter()
                    .map(EntryArg::to_json)
                    .collect::<Vec<_>>(),
            },
        })
    }
}

/// A transaction with the sender's signature attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub raw: UnsignedTransaction,
    pub public_key: LedgerPublicKey,
    pub signature: LedgerSignature,
}

impl SignedTransaction {
    /// `0x` + hex SHA-256 of the signing message followed by the signature.
    pub fn hash(&self) -> String {
        let digest = sha256_multi(&[&self.raw.signing_message(), self.signature.as_bytes()]);
        format!("0x{}", hex::encode(digest))
    }

    /// Checks that the key owns the sender account and signed this payload.
    pub fn verify(&self) -> bool {
        self.public_key.address() == self.raw.sender
            && self
                .public_key
                .verify(&self.raw.signing_message(), &self.signature)
    }

    /// JSON body for `POST /transactions`.
    pub fn to_json(&self) -> Value {
        let mut body = self.raw.to_json();
        body["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": format!("0x{}", self.public_key.to_hex()),
            "signature": format!("0x{}", self.signature.to_hex()),
        });
        body
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: String,
}

/// Terminal result of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalityOutcome {
    pub hash: String,
    pub success: bool,
    pub vm_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::LedgerKeypair;

    fn transfer(sender: AccountAddress) -> UnsignedTransaction {
        UnsignedTransaction::new(
            sender,
            3,
            "0x1::aptos_account::transfer".parse().unwrap(),
            vec![EntryArg::Address(sender), EntryArg::U64(1_000)],
        )
    }

    #[test]
    fn short_addresses_are_padded() {
        let one: AccountAddress = "0x1".parse().unwrap();
        assert_eq!(one.to_string(), format!("0x{}1", "0".repeat(63)));
        assert_eq!(one.to_string().parse::<AccountAddress>().unwrap(), one);
    }

    #[test]
    fn bad_addresses_rejected() {
        assert_eq!("1".parse::<AccountAddress>(), Err(AddressError::MissingPrefix));
        assert_eq!("0x".parse::<AccountAddress>(), Err(AddressError::BadLength));
        assert_eq!("0xzz".parse::<AccountAddress>(), Err(AddressError::NotHex));
        let long = format!("0x{}", "a".repeat(65));
        assert_eq!(long.parse::<AccountAddress>(), Err(AddressError::BadLength));
    }

    #[test]
    fn function_ref_parses_and_displays() {
        let f: FunctionRef = "0x1::aptos_account::transfer".parse().unwrap();
        assert_eq!(f.module, "aptos_account");
        assert_eq!(f.function, "transfer");
        assert!(f.to_string().ends_with("1::aptos_account::transfer"));
        assert!("0x1::only_module".parse::<FunctionRef>().is_err());
        assert!("0x1::a::b::c".parse::<FunctionRef>().is_err());
    }

    #[test]
    fn u64_args_travel_as_strings() {
        assert_eq!(EntryArg::U64(42).to_json(), json!("42"));
        assert_eq!(EntryArg::Bool(true).to_json(), json!(true));
    }

    #[test]
    fn signed_transaction_verifies_and_hashes() {
        let kp = LedgerKeypair::generate();
        let raw = transfer(kp.address());
        let signed = SignedTransaction {
            signature: kp.sign(&raw.signing_message()),
            public_key: kp.public_key(),
            raw,
        };
        assert!(signed.verify());
        assert!(signed.hash().starts_with("0x"));
        assert_eq!(signed.hash().len(), 66);
    }

    #[test]
    fn signature_from_other_account_fails() {
        let kp = LedgerKeypair::generate();
        let other = LedgerKeypair::generate();
        let raw = transfer(kp.address());
        let signed = SignedTransaction {
            signature: other.sign(&raw.signing_message()),
            public_key: other.public_key(),
            raw,
        };
        assert!(!signed.verify());
    }

    #[test]
    fn signing_message_covers_arguments() {
        let kp = LedgerKeypair::generate();
        let a = transfer(kp.address());
        let mut b = a.clone();
        b.payload.arguments[1] = EntryArg::U64(1_001);
        assert_ne!(a.signing_message(), b.signing_message());
    }

    #[test]
    fn json_body_has_rest_shape() {
        let kp = LedgerKeypair::generate();
        let body = transfer(kp.address()).to_json();
        assert_eq!(body["sequence_number"], json!("3"));
        assert_eq!(body["payload"]["type"], json!("entry_function_payload"));
        assert_eq!(body["payload"]["arguments"][1], json!("1000"));
    }
}
