//! # Protocol Configuration & Constants
//!
//! Every magic number in CertiChain lives here, along with the
//! [`ProtocolConfig`] the node assembles once at startup. Configuration is
//! immutable after construction: components receive what they need through
//! their constructors, never through globals.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::crypto::fingerprint::FingerprintSalt;
use crate::crypto::keys::{KeyError, LedgerKeypair};
use crate::ledger::types::{AccountAddress, AddressError};

// ---------------------------------------------------------------------------
// Ledger Module Layout
// ---------------------------------------------------------------------------

/// Name of the Move module that owns certificate state on-ledger.
pub const CERT_MODULE: &str = "CertManagement";

/// Entry function recording a certificate under its fingerprint.
pub const ISSUE_CERT_FUNCTION: &str = "issue_cert";

/// Entry function flipping a certificate's validity flag to false.
pub const REVOKE_CERT_FUNCTION: &str = "revoke_cert";

/// Entry function adding an address to the approved-issuer allow-list.
pub const ADD_APPROVED_ISSUER_FUNCTION: &str = "add_approved_issuer";

/// View function returning the committed certificate for a fingerprint.
pub const GET_CERTIFICATE_FUNCTION: &str = "get_certificate_issuance";

/// Framework module and function used for the admission transfer.
pub const TRANSFER_MODULE: &str = "aptos_account";
pub const TRANSFER_FUNCTION: &str = "transfer";

/// Address of the ledger framework (`0x1`).
pub const FRAMEWORK_ADDRESS: &str = "0x1";

// ---------------------------------------------------------------------------
// Admission & Finality
// ---------------------------------------------------------------------------

/// Baseline cost estimate for one issuance, in the ledger's smallest unit.
/// A heuristic, not a fee oracle.
pub const DEFAULT_FUNDING_AMOUNT: u64 = 1_000;

/// Upper bound on how long any single finality wait may block a request.
pub const FINALITY_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the REST client polls a pending transaction.
pub const FINALITY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Gas ceiling attached to every transaction the node builds.
pub const DEFAULT_MAX_GAS_AMOUNT: u64 = 200_000;

/// Gas unit price attached to every transaction the node builds.
pub const DEFAULT_GAS_UNIT_PRICE: u64 = 100;

/// Transactions expire this many seconds after they are built.
pub const TX_EXPIRATION_SECS: u64 = 600;

/// Request timeout for the REST ledger client.
pub const LEDGER_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// Minimum fingerprint salt length in bytes. Shorter salts are rejected at
/// configuration time.
pub const MIN_SALT_LENGTH: usize = 16;

/// Hex length of a fingerprint (SHA-256, lower-case hex).
pub const FINGERPRINT_HEX_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Interval between reconciliation sweeps in the node's background task.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(60);

/// A pending issuance younger than this is left alone by the sweep; the
/// submission for it may still be in flight.
pub const ORPHAN_GRACE_PERIOD: Duration = Duration::from_secs(600);

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Default fullnode REST endpoint.
pub const DEFAULT_LEDGER_URL: &str = "https://fullnode.devnet.aptoslabs.com/v1";

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 3000;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 3001;

// ---------------------------------------------------------------------------
// ProtocolConfig
// ---------------------------------------------------------------------------

/// Errors raised while assembling a [`ProtocolConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fingerprint salt must be at least {min} bytes, got {got}")]
    SaltTooShort { min: usize, got: usize },

    #[error("invalid admin signing key: {0}")]
    AdminKey(#[from] KeyError),

    #[error("invalid module address: {0}")]
    ModuleAddress(#[from] AddressError),

    #[error("invalid ledger endpoint '{0}'")]
    LedgerEndpoint(String),

    #[error("finality timeout must be non-zero")]
    ZeroFinalityTimeout,
}

/// Where the node sends its transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEndpoint {
    /// The in-process ledger from the `contracts` crate. Devnet and tests only.
    Local,
    /// A fullnode REST API.
    Rest(Url),
}

impl LedgerEndpoint {
    /// Parses `"local"` or an absolute http(s) URL.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        let url = Url::parse(raw).map_err(|_| ConfigError::LedgerEndpoint(raw.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Rest(url)),
            _ => Err(ConfigError::LedgerEndpoint(raw.to_string())),
        }
    }
}

impl fmt::Display for LedgerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Rest(url) => write!(f, "{}", url),
        }
    }
}

/// Process-wide protocol configuration. Read once at startup, immutable after.
///
/// The admin key and the fingerprint salt are secrets; the `Debug`
/// implementation redacts both.
#[derive(Clone)]
pub struct ProtocolConfig {
    admin_key_hex: String,
    /// Address that publishes the `CertManagement` module.
    pub module_address: AccountAddress,
    /// Ledger network the node talks to.
    pub ledger_endpoint: LedgerEndpoint,
    /// Secret salt mixed into every fingerprint.
    pub salt: FingerprintSalt,
    /// Amount the admission gate transfers per issuance request.
    pub funding_amount: u64,
    /// Upper bound for every finality wait.
    pub finality_timeout: Duration,
}

impl fmt::Debug for ProtocolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolConfig")
            .field("admin_key_hex", &"[REDACTED]")
            .field("module_address", &self.module_address)
            .field("ledger_endpoint", &self.ledger_endpoint)
            .field("salt", &self.salt)
            .field("funding_amount", &self.funding_amount)
            .field("finality_timeout", &self.finality_timeout)
            .finish()
    }
}

impl ProtocolConfig {
    /// Validates raw settings into a config.
    ///
    /// When `module_address` is `None`, the module is assumed to be published
    /// by the admin account itself.
    pub fn new(
        admin_key_hex: &str,
        module_address: Option<&str>,
        ledger_endpoint: &str,
        salt: &[u8],
        funding_amount: u64,
        finality_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let admin = LedgerKeypair::from_hex(admin_key_hex.trim())?;
        let module_address = match module_address {
            Some(raw) => raw.parse::<AccountAddress>()?,
            None => admin.address(),
        };
        if finality_timeout.is_zero() {
            return Err(ConfigError::ZeroFinalityTimeout);
        }

        Ok(Self {
            admin_key_hex: admin_key_hex.trim().to_string(),
            module_address,
            ledger_endpoint: LedgerEndpoint::parse(ledger_endpoint)?,
            salt: FingerprintSalt::new(salt.to_vec())?,
            funding_amount,
            finality_timeout,
        })
    }

    /// Rebuilds the admin keypair. The key was validated in [`ProtocolConfig::new`].
    pub fn admin_keypair(&self) -> Result<LedgerKeypair, ConfigError> {
        Ok(LedgerKeypair::from_hex(&self.admin_key_hex)?)
    }
}
