//! Audit entry and the snapshots it freezes.

use proofmint_store::StoreError;
use proofmint_supply::{MintTransaction, RewardBreakdown, SupplyState};
use proofmint_types::{
    AuditStatus, ChallengeId, ComplianceStatus, Hash256, IssuanceRate, RequestId, RequestState,
    RequesterId, ScreeningAction, Timestamp, TokenAmount,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSnapshot {
    pub challenge_id: ChallengeId,
    pub proof_ref: Hash256,
    pub difficulty: u8,
    pub correct_count: u32,
    pub total_count: u32,
    pub grading_errors: u32,
    pub valid: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningSnapshot {
    pub action: ScreeningAction,
    pub confidence_bps: u32,
    pub reasons: Vec<String>,
    pub degraded: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSnapshot {
    pub status: ComplianceStatus,
    pub log_id: Option<String>,
    pub from_cache: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplySnapshot {
    pub total_minted: TokenAmount,
    pub max_supply: TokenAmount,
    pub issuance_rate: IssuanceRate,
    pub issuance_events_count: u64,
}

impl From<&SupplyState> for SupplySnapshot {
    fn from(state: &SupplyState) -> Self {
        Self {
            total_minted: state.total_minted,
            max_supply: state.max_supply,
            issuance_rate: state.current_issuance_rate,
            issuance_events_count: state.issuance_events_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintDetails {
    pub transaction: MintTransaction,
    /// Settlement rail tx id; absent when settlement went to reconciliation.
    pub settlement_tx_id: Option<String>,
    pub settlement_attempts: u32,
}

/// One terminal outcome. Built by the orchestrator; the chain fields
/// (`sequence`, `prev_hash`, `entry_hash`) are assigned by [`crate::AuditLog`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub sequence: u64,
    pub request_id: RequestId,
    pub requester_id: RequesterId,
    pub status: AuditStatus,
    pub final_state: RequestState,
    pub proof_snapshot: Option<ProofSnapshot>,
    pub screening_snapshot: Option<ScreeningSnapshot>,
    pub compliance_snapshot: Option<ComplianceSnapshot>,
    pub supply_snapshot_before: Option<SupplySnapshot>,
    pub supply_snapshot_after: Option<SupplySnapshot>,
    pub reward: Option<RewardBreakdown>,
    pub mint_details: Option<MintDetails>,
    pub error_details: Option<String>,
    /// The screen flagged this issuance for human review.
    pub review_required: bool,
    pub timestamp: Timestamp,
    pub prev_hash: Hash256,
    pub entry_hash: Hash256,
}

impl AuditLogEntry {
    /// An entry for a request that ended in `final_state`.
    ///
    /// The audit status is derived from the state; non-terminal states
    /// record as `failed`.
    pub fn new(
        request_id: RequestId,
        requester_id: RequesterId,
        final_state: RequestState,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            sequence: 0,
            request_id,
            requester_id,
            status: final_state.audit_status().unwrap_or(AuditStatus::Failed),
            final_state,
            proof_snapshot: None,
            screening_snapshot: None,
            compliance_snapshot: None,
            supply_snapshot_before: None,
            supply_snapshot_after: None,
            reward: None,
            mint_details: None,
            error_details: None,
            review_required: false,
            timestamp,
            prev_hash: Hash256::ZERO,
            entry_hash: Hash256::ZERO,
        }
    }

    /// Bytes covered by `entry_hash`: the entry with `entry_hash` zeroed.
    pub(crate) fn hashed_body(&self) -> Result<Vec<u8>, StoreError> {
        let mut body = self.clone();
        body.entry_hash = Hash256::ZERO;
        body.encode()
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
