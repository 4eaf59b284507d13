//! Router and HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use proofmint_engine::IssuanceOrchestrator;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::error::RpcError;
use crate::handlers;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct RpcState {
    pub engine: Arc<IssuanceOrchestrator>,
}

impl RpcState {
    pub fn new(engine: Arc<IssuanceOrchestrator>) -> Self {
        Self { engine }
    }
}

/// Build the API router.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/v1/challenges", post(handlers::register_challenge))
        .route("/v1/proofs", post(handlers::submit_proof))
        .route("/v1/requests/:key", get(handlers::request_status))
        .route("/v1/requests/:key/cancel", post(handlers::cancel_request))
        .route("/v1/supply", get(handlers::supply))
        .route("/v1/reconciliation", get(handlers::reconciliation))
        .route("/v1/audit/verify", get(handlers::verify_audit))
        .route("/v1/audit/:key", get(handlers::audit_entry))
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// HTTP server for the issuance API.
pub struct RpcServer {
    addr: SocketAddr,
    state: RpcState,
}

impl RpcServer {
    pub fn new(addr: SocketAddr, engine: Arc<IssuanceOrchestrator>) -> Self {
        Self {
            addr,
            state: RpcState::new(engine),
        }
    }

    /// Serve until a shutdown signal arrives. In-flight requests are drained
    /// before this returns.
    pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), RpcError> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {}: {}", self.addr, e)))?;
        let local = listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))?;
        tracing::info!(addr = %local, "RPC server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("RPC server shutting down");
            })
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
