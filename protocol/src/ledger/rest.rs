//! Fullnode REST client.
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | GET    | `/accounts/{address}` | `build` (sequence number) |
//! | POST   | `/transactions/encode_submission` | `sign_and_submit` (signing message) |
//! | POST   | `/transactions` | `submit`, `sign_and_submit` |
//! | GET    | `/transactions/by_hash/{hash}` | `wait_for_finality` (polled) |
//! | POST   | `/view` | `view` |
//!
//! The node never computes the network's signing message itself: it asks
//! the fullnode to encode the transaction and signs the bytes it gets back.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::signer::LedgerSigner;
use super::types::{
    AccountAddress, EntryArg, FinalityOutcome, FunctionRef, PendingTransaction,
    SignedTransaction, UnsignedTransaction,
};
use super::{LedgerClient, LedgerError};
use crate::config::{FINALITY_POLL_INTERVAL, LEDGER_HTTP_TIMEOUT};

#[derive(Debug, Deserialize)]
struct AccountResponse {
    sequence_number: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct TransactionStatusResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    vm_status: Option<String>,
}

/// [`LedgerClient`] over a fullnode REST API.
#[derive(Debug, Clone)]
pub struct RestLedgerClient {
    http: reqwest::Client,
    base: String,
    poll_interval: Duration,
}

impl RestLedgerClient {
    /// `base_url` is the API root, e.g. `https://fullnode.devnet.aptoslabs.com/v1`.
    pub fn new(base_url: Url) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(LEDGER_HTTP_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base: base_url.as_str().trim_end_matches('/').to_string(),
            poll_interval: FINALITY_POLL_INTERVAL,
        })
    }

    /// Overrides how often `wait_for_finality` polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Sends a request and maps non-success statuses. 404 becomes
    /// `NotFound`, other 4xx `Rejected`, everything else `Transport`.
    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, LedgerError> {
        let resp = request
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("{endpoint}: {e}")))?;

        let status = resp.status();
        debug!(endpoint, status = status.as_u16(), "ledger round trip");
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        let detail = format!("{endpoint}: {} {message}", status.as_u16());
        Err(match status {
            reqwest::StatusCode::NOT_FOUND => LedgerError::NotFound(detail),
            s if s.is_client_error() => LedgerError::Rejected(detail),
            _ => LedgerError::Transport(detail),
        })
    }

    async fn json<T: for<'de> Deserialize<'de>>(
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<T, LedgerError> {
        resp.json::<T>()
            .await
            .map_err(|e| LedgerError::Decode(format!("{endpoint}: {e}")))
    }

    async fn post_transaction(&self, body: &Value) -> Result<PendingTransaction, LedgerError> {
        let endpoint = "POST /transactions";
        let resp = self
            .send(endpoint, self.http.post(self.url("/transactions")).json(body))
            .await?;
        let submitted: SubmitResponse = Self::json(endpoint, resp).await?;
        Ok(PendingTransaction {
            hash: submitted.hash,
        })
    }

    /// One status poll. `None` while the transaction is unknown or pending.
    async fn poll(&self, hash: &str) -> Result<Option<FinalityOutcome>, LedgerError> {
        let endpoint = "GET /transactions/by_hash";
        let request = self.http.get(self.url(&format!("/transactions/by_hash/{hash}")));
        let resp = match self.send(endpoint, request).await {
            Ok(resp) => resp,
            // Not yet propagated to this fullnode.
            Err(LedgerError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let status: TransactionStatusResponse = Self::json(endpoint, resp).await?;
        if status.kind == "pending_transaction" {
            return Ok(None);
        }
        Ok(Some(FinalityOutcome {
            hash: hash.to_string(),
            success: status.success.unwrap_or(false),
            vm_status: status.vm_status.unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl LedgerClient for RestLedgerClient {
    async fn build(
        &self,
        sender: AccountAddress,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<UnsignedTransaction, LedgerError> {
        let endpoint = "GET /accounts";
        let resp = self
            .send(endpoint, self.http.get(self.url(&format!("/accounts/{sender}"))))
            .await?;
        let account: AccountResponse = Self::json(endpoint, resp).await?;
        let sequence_number = account
            .sequence_number
            .parse::<u64>()
            .map_err(|_| LedgerError::Decode(format!("{endpoint}: bad sequence_number")))?;
        Ok(UnsignedTransaction::new(
            sender,
            sequence_number,
            function,
            arguments,
        ))
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<PendingTransaction, LedgerError> {
        self.post_transaction(&tx.to_json()).await
    }

    async fn sign_and_submit(
        &self,
        signer: &LedgerSigner,
        tx: UnsignedTransaction,
    ) -> Result<PendingTransaction, LedgerError> {
        let endpoint = "POST /transactions/encode_submission";
        let body = tx.to_json();
        let resp = self
            .send(
                endpoint,
                self.http
                    .post(self.url("/transactions/encode_submission"))
                    .json(&body),
            )
            .await?;
        let encoded: String = Self::json(endpoint, resp).await?;
        let message = hex::decode(encoded.trim_start_matches("0x"))
            .map_err(|_| LedgerError::Decode(format!("{endpoint}: signing message is not hex")))?;

        let signature = signer.sign_message(&message);
        let mut body = body;
        body["signature"] = json!({
            "type": "ed25519_signature",
            "public_key": format!("0x{}", signer.public_key().to_hex()),
            "signature": format!("0x{}", signature.to_hex()),
        });
        self.post_transaction(&body).await
    }

    async fn wait_for_finality(
        &self,
        hash: &str,
        timeout: Duration,
    ) -> Result<FinalityOutcome, LedgerError> {
        let started = Instant::now();
        loop {
            if let Some(outcome) = self.poll(hash).await? {
                debug!(hash, success = outcome.success, "transaction final");
                return Ok(outcome);
            }
            if started.elapsed() + self.poll_interval > timeout {
                return Err(LedgerError::Timeout {
                    hash: hash.to_string(),
                    after: timeout,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn view(
        &self,
        function: FunctionRef,
        arguments: Vec<EntryArg>,
    ) -> Result<Vec<Value>, LedgerError> {
        let endpoint = "POST /view";
        let body = json!({
            "function": function.to_string(),
            "type_arguments": [],
            "arguments": arguments.iter().map(EntryArg::to_json).collect::<Vec<_>>(),
        });
        let resp = self
            .send(endpoint, self.http.post(self.url("/view")).json(&body))
            .await?;
        Self::json(endpoint, resp).await
    }
}
