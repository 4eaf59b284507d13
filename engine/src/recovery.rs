//! Startup recovery of requests a previous process left unfinished.

use proofmint_types::RequestState;
use serde::Serialize;

use crate::error::EngineError;
use crate::orchestrator::IssuanceOrchestrator;
use crate::spans;

/// What [`IssuanceOrchestrator::recover`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    /// Terminal requests whose audit entry was written now.
    pub reaudited: usize,
    /// Committed issuances moved to `MINT_FAILED` and queued for reconciliation.
    pub queued_for_reconciliation: usize,
    /// Requests interrupted before the ledger, now `FAILED`.
    pub failed: usize,
    /// Requests that could not be resolved (their audit write failed again).
    pub unresolved: usize,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl IssuanceOrchestrator {
    /// Resolve every persisted request that is not terminal and audited.
    ///
    /// Run once at startup, before accepting submissions. A request that
    /// fails to resolve is logged and left for a later retry with its key.
    pub fn recover(&self) -> Result<RecoveryReport, EngineError> {
        let _span = spans::recovery_span().entered();
        let mut report = RecoveryReport::default();

        for record in self.stored_records()? {
            if record.is_settled() || self.is_in_flight(&record.request_id) {
                continue;
            }
            let request_id = record.request_id;
            let was_terminal = record.state.is_terminal();
            let outcome = if was_terminal {
                self.write_audit(record)
            } else {
                self.resolve_interrupted(record)
            };
            match outcome {
                Ok(_) if was_terminal => report.reaudited += 1,
                Ok(status) if status.state == RequestState::MintFailed => {
                    report.queued_for_reconciliation += 1
                }
                Ok(_) => report.failed += 1,
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "could not recover request");
                    report.unresolved += 1;
                }
            }
        }

        if report.is_empty() {
            tracing::debug!("no requests to recover");
        } else {
            tracing::info!(
                reaudited = report.reaudited,
                queued = report.queued_for_reconciliation,
                failed = report.failed,
                unresolved = report.unresolved,
                "recovered interrupted requests"
            );
        }
        Ok(report)
    }
}
