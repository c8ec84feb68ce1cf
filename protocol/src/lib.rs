// Copyright (c) 2026 CertiChain Contributors. MIT License.
// See LICENSE for details.

//! # CertiChain Protocol: Core Library
//!
//! Issues educational certificates onto a ledger and verifies them later,
//! with an embedded record store mirroring every ledger-bound issuance.
//!
//! The interesting part is small: a certificate is keyed on-ledger by a
//! salted SHA-256 **fingerprint** of an opaque issuance id, the issuer has to
//! pass an **admission gate** (a funded, finalized transfer) before anything
//! is written, and verification works two ways: look the fingerprint up on
//! the ledger, or check an RSA-PSS signature over the certificate payload
//! with no ledger at all.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants and the process-wide [`config::ProtocolConfig`].
//! - **crypto**: Ed25519 ledger keys, hashing, fingerprints, RSA-PSS payload signatures.
//! - **ledger**: The [`ledger::LedgerClient`] seam, transaction types, view decoding,
//!   and an HTTP client for an Aptos-style fullnode.
//! - **store**: sled-backed off-chain records (issuers, pending issuances,
//!   confirmations, catalog, transaction log).
//! - **issuance**: Admission gate, pending-issuance ledger, transaction driver,
//!   verifier, issuer directory, reconciler, and the service that ties them together.
//!
//! ## Ground rules
//!
//! 1. Every component converts lower-level failures at its own boundary. A raw
//!    transport error never reaches an HTTP handler.
//! 2. Nothing retries behind your back. Retry policy belongs to the caller.
//! 3. The fingerprint salt and the admin signing key are never logged, persisted,
//!    or returned.

pub mod config;
pub mod crypto;
pub mod issuance;
pub mod ledger;
pub mod store;
