//! # HTTP API
//!
//! Builds the axum router for the issuance node. Handlers are thin: they
//! parse, call the [`IssuanceService`], record metrics, and map
//! [`IssuanceError`] onto a status code. No protocol logic lives here.
//!
//! ## Endpoints
//!
//! | Method | Path                                  | Description                          |
//! |--------|---------------------------------------|--------------------------------------|
//! | GET    | `/health`                             | Liveness check                       |
//! | POST   | `/issuers`                            | Register an issuer                   |
//! | GET    | `/issuers/:id`                        | Issuer record                        |
//! | GET    | `/issuers/:id/address`                | Issuer ledger address                |
//! | GET    | `/issuers/:id/certificates`           | Catalog entries                      |
//! | POST   | `/issuers/:id/certificates`           | Add a catalog entry                  |
//! | GET    | `/issuers/:id/transactions`           | Ledger transaction audit log         |
//! | POST   | `/accounts/:address/certificate-hash` | Fund issuer, create pending, fingerprint |
//! | POST   | `/accounts/:address/transfer-auth`    | Fund issuer, return module/admin     |
//! | POST   | `/certificates`                       | Write a certificate to the ledger    |
//! | GET    | `/certificates/:id`                   | Ledger record by issuance id         |
//! | POST   | `/certificates/:id/revoke`            | Revoke a certificate                 |
//! | POST   | `/certificates/verify-signature`      | Offline RSA-PSS check                |
//! | GET    | `/issuances/:id`                      | Pending record and status            |
//!
//! ## Error mapping
//!
//! | Error               | Status |
//! |---------------------|--------|
//! | `AdmissionDenied`   | 403    |
//! | `SubmissionFailed`  | 502    |
//! | `NotFound`          | 404    |
//! | `SignatureInvalid`  | 422    |
//! | `Persistence`       | 500    |
//! | `InvalidInput`      | 400    |
//! | `InvalidTransition` | 409    |

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use certichain_protocol::issuance::{
    CertificatePayload, FingerprintGrant, IssuanceError, IssuanceService, IssuanceView,
    NewCertificateMetadata, NewIssuer, SubmissionOutcome, TransferAuthorization,
};
use certichain_protocol::ledger::{AccountAddress, LedgerCertificateRecord};
use certichain_protocol::store::{CertificateMetadata, Issuer, TransactionRecord};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub service: Arc<IssuanceService>,
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/issuers", post(register_issuer_handler))
        .route("/issuers/:id", get(issuer_handler))
        .route("/issuers/:id/address", get(issuer_address_handler))
        .route(
            "/issuers/:id/certificates",
            get(list_catalog_handler).post(add_catalog_handler),
        )
        .route("/issuers/:id/transactions", get(transactions_handler))
        .route(
            "/accounts/:address/certificate-hash",
            post(certificate_hash_handler),
        )
        .route("/accounts/:address/transfer-auth", post(transfer_auth_handler))
        .route("/certificates", post(submit_certificate_handler))
        .route(
            "/certificates/verify-signature",
            post(verify_signature_handler),
        )
        .route("/certificates/:id", get(lookup_certificate_handler))
        .route("/certificates/:id/revoke", post(revoke_handler))
        .route("/issuances/:id", get(issuance_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub id: String,
    pub address: AccountAddress,
    pub approved_on_ledger: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_tx_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddressResponse {
    pub address: AccountAddress,
}

/// Body of `POST /accounts/:address/certificate-hash`. `id` is the issuer id.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateHashRequest {
    pub id: String,
    #[serde(default)]
    pub is_private: bool,
}

/// Body of `POST /certificates`: the issuance id plus the certificate fields.
#[derive(Debug, Deserialize)]
pub struct SubmitCertificateRequest {
    pub id: String,
    #[serde(flatten)]
    pub payload: CertificatePayload,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub issuer: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySignatureRequest {
    pub payload: String,
    pub signature: String,
    pub public_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifySignatureResponse {
    pub valid: bool,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// [`IssuanceError`] as an HTTP response.
pub struct ApiError(IssuanceError);

impl From<IssuanceError> for ApiError {
    fn from(e: IssuanceError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            IssuanceError::AdmissionDenied(_) => StatusCode::FORBIDDEN,
            IssuanceError::SubmissionFailed(_) => StatusCode::BAD_GATEWAY,
            IssuanceError::NotFound(_) => StatusCode::NOT_FOUND,
            IssuanceError::SignatureInvalid => StatusCode::UNPROCESSABLE_ENTITY,
            IssuanceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IssuanceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            IssuanceError::InvalidTransition { .. } => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Counts admission denials on the way out.
fn track_admission<T>(metrics: &SharedMetrics, result: Result<T, IssuanceError>) -> Result<T, IssuanceError> {
    if let Err(IssuanceError::AdmissionDenied(_)) = &result {
        metrics.admission_denied_total.inc();
    }
    result
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

async fn register_issuer_handler(
    State(state): State<AppState>,
    Json(body): Json<NewIssuer>,
) -> ApiResult<RegisterResponse> {
    let registration = state.service.directory().register(body).await?;
    Ok(Json(RegisterResponse {
        id: registration.issuer.id,
        address: registration.issuer.address,
        approved_on_ledger: registration.approved_on_ledger,
        approval_tx_hash: registration.approval_tx_hash,
    }))
}

async fn issuer_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Issuer> {
    Ok(Json(state.service.directory().fetch(&id)?))
}

async fn issuer_address_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AddressResponse> {
    let address = state.service.directory().address_of(&id)?;
    Ok(Json(AddressResponse { address }))
}

async fn list_catalog_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<CertificateMetadata>> {
    Ok(Json(state.service.directory().list_certificates(&id)?))
}

async fn add_catalog_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<NewCertificateMetadata>,
) -> ApiResult<CertificateMetadata> {
    Ok(Json(state.service.directory().add_certificate(&id, body)?))
}

async fn transactions_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<TransactionRecord>> {
    Ok(Json(state.service.directory().transactions_for(&id)?))
}

async fn certificate_hash_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(body): Json<CertificateHashRequest>,
) -> ApiResult<FingerprintGrant> {
    state.metrics.fingerprint_requests_total.inc();
    let grant = track_admission(
        &state.metrics,
        state
            .service
            .request_fingerprint(&address, &body.id, body.is_private)
            .await,
    )?;
    Ok(Json(grant))
}

async fn transfer_auth_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<TransferAuthorization> {
    let auth = track_admission(
        &state.metrics,
        state.service.authorize_transfer(&address).await,
    )?;
    Ok(Json(auth))
}

async fn submit_certificate_handler(
    State(state): State<AppState>,
    Json(body): Json<SubmitCertificateRequest>,
) -> ApiResult<SubmissionOutcome> {
    let started = Instant::now();
    let result = track_admission(
        &state.metrics,
        state
            .service
            .submit_certificate(&body.id, body.payload)
            .await,
    );
    state
        .metrics
        .finality_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    let label = if result.is_ok() { "ok" } else { "failed" };
    state
        .metrics
        .submissions_total
        .with_label_values(&[label])
        .inc();
    Ok(Json(result?))
}

async fn lookup_certificate_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<LedgerCertificateRecord> {
    state
        .metrics
        .verifications_total
        .with_label_values(&["ledger"])
        .inc();
    Ok(Json(state.service.lookup(&id).await?))
}

async fn revoke_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RevokeRequest>,
) -> ApiResult<SubmissionOutcome> {
    let outcome = track_admission(
        &state.metrics,
        state.service.revoke(&id, &body.issuer).await,
    )?;
    state.metrics.revocations_total.inc();
    Ok(Json(outcome))
}

/// Valid signatures are 200 `{valid: true}`; anything else is 422.
async fn verify_signature_handler(
    State(state): State<AppState>,
    Json(body): Json<VerifySignatureRequest>,
) -> ApiResult<VerifySignatureResponse> {
    state
        .metrics
        .verifications_total
        .with_label_values(&["signature"])
        .inc();
    if state
        .service
        .verify_signature(body.payload.as_bytes(), &body.signature, &body.public_key)
    {
        Ok(Json(VerifySignatureResponse { valid: true }))
    } else {
        Err(IssuanceError::SignatureInvalid.into())
    }
}

async fn issuance_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<IssuanceView> {
    Ok(Json(state.service.issuance(&id)?))
}
