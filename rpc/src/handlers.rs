//! Request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use proofmint_audit::AuditLogEntry;
use proofmint_engine::{MintRequestStatus, SubmitProof};
use proofmint_settlement::ReconciliationItem;
use proofmint_supply::SupplyStats;
use proofmint_types::{ChallengeId, Hash256, RequestId};
use proofmint_verification::ProofChallenge;
use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::server::RpcState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRegistered {
    pub challenge_id: ChallengeId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationBacklog {
    pub pending: usize,
    pub items: Vec<ReconciliationItem>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub valid: bool,
    pub entries: u64,
    pub head: Hash256,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
    pub open_challenges: usize,
    pub pending_reconciliation: usize,
}

fn parse_key(key: &str) -> Result<RequestId, RpcError> {
    key.parse()
        .map_err(|_| RpcError::InvalidRequest(format!("idempotency key {:?} is not a UUID", key)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RpcError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| RpcError::InvalidRequest(rejection.body_text()))
}

/// `POST /v1/challenges`
pub async fn register_challenge(
    State(state): State<RpcState>,
    payload: Result<Json<ProofChallenge>, JsonRejection>,
) -> Result<(StatusCode, Json<ChallengeRegistered>), RpcError> {
    let challenge = body(payload)?;
    let challenge_id = challenge.id.clone();
    state.engine.register_challenge(challenge)?;
    Ok((StatusCode::CREATED, Json(ChallengeRegistered { challenge_id })))
}

/// `POST /v1/proofs`
///
/// Resolves once the request reaches a terminal state, or `MINTING` when
/// the engine does not wait for settlement.
pub async fn submit_proof(
    State(state): State<RpcState>,
    payload: Result<Json<SubmitProof>, JsonRejection>,
) -> Result<Json<MintRequestStatus>, RpcError> {
    let submit = body(payload)?;
    let status = state.engine.submit_proof(submit).await?;
    Ok(Json(status))
}

/// `GET /v1/requests/:key`
pub async fn request_status(
    State(state): State<RpcState>,
    Path(key): Path<String>,
) -> Result<Json<MintRequestStatus>, RpcError> {
    let request_id = parse_key(&key)?;
    Ok(Json(state.engine.request_status(&request_id)?))
}

/// `POST /v1/requests/:key/cancel`
pub async fn cancel_request(
    State(state): State<RpcState>,
    Path(key): Path<String>,
) -> Result<Json<MintRequestStatus>, RpcError> {
    let request_id = parse_key(&key)?;
    Ok(Json(state.engine.cancel(&request_id).await?))
}

/// `GET /v1/supply`
pub async fn supply(State(state): State<RpcState>) -> Json<SupplyStats> {
    Json(state.engine.supply_stats())
}

/// `GET /v1/reconciliation`
pub async fn reconciliation(State(state): State<RpcState>) -> Json<ReconciliationBacklog> {
    let items = state.engine.reconciliation_items();
    Json(ReconciliationBacklog {
        pending: items.len(),
        items,
    })
}

/// `GET /v1/audit/:key`
pub async fn audit_entry(
    State(state): State<RpcState>,
    Path(key): Path<String>,
) -> Result<Json<AuditLogEntry>, RpcError> {
    let request_id = parse_key(&key)?;
    state
        .engine
        .audit_entry(&request_id)?
        .map(Json)
        .ok_or_else(|| RpcError::NotFound(format!("audit entry for {}", request_id)))
}

/// `GET /v1/audit/verify`
///
/// A broken chain is reported as `valid: false` rather than an error status.
pub async fn verify_audit(State(state): State<RpcState>) -> Json<ChainVerification> {
    match state.engine.verify_audit_chain() {
        Ok(report) => Json(ChainVerification {
            valid: true,
            entries: report.entries,
            head: report.head,
        }),
        Err(e) => {
            tracing::error!(error = %e, "audit chain verification failed");
            Json(ChainVerification {
                valid: false,
                entries: 0,
                head: Hash256::ZERO,
            })
        }
    }
}

/// `GET /metrics`
pub async fn metrics(State(state): State<RpcState>) -> Result<impl IntoResponse, RpcError> {
    let metrics = state.engine.metrics().ok_or(RpcError::MetricsDisabled)?;
    let text = metrics
        .encode()
        .map_err(|e| RpcError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], text))
}

/// `GET /health`
pub async fn health(State(state): State<RpcState>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        open_challenges: state.engine.open_challenges(),
        pending_reconciliation: state.engine.reconciliation_queue().pending_count(),
    })
}
