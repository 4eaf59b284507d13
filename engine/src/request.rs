//! Mint request records and the status reported to callers.

use proofmint_audit::AuditLogEntry;
use proofmint_store::StoreError;
use proofmint_supply::RequesterProfile;
use proofmint_types::{
    ChallengeId, Hash256, RequestId, RequestState, RequesterId, Timestamp, TokenAmount,
};
use serde::{Deserialize, Serialize};

/// A proof submission with its idempotency key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitProof {
    pub idempotency_key: RequestId,
    pub challenge_id: ChallengeId,
    pub requester_id: RequesterId,
    pub answers: Vec<String>,
    #[serde(default)]
    pub profile: RequesterProfile,
    /// Client-side submission time; informational only.
    #[serde(default)]
    pub submitted_at: Option<Timestamp>,
}

/// Persisted lifecycle record of a mint request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequestRecord {
    pub request_id: RequestId,
    pub requester_id: RequesterId,
    pub challenge_id: ChallengeId,
    pub proof_ref: Hash256,
    pub state: RequestState,
    /// Committed amount, once the ledger accepted it.
    pub amount: Option<TokenAmount>,
    pub transaction_hash: Option<Hash256>,
    pub settlement_tx_id: Option<String>,
    pub review_required: bool,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Whether the terminal audit entry is durable.
    pub audited: bool,
    /// Terminal entry still to be written, kept so a retry writes exactly it.
    pub pending_audit: Option<AuditLogEntry>,
}

impl MintRequestRecord {
    pub fn new(
        request_id: RequestId,
        requester_id: RequesterId,
        challenge_id: ChallengeId,
        proof_ref: Hash256,
        now: Timestamp,
    ) -> Self {
        Self {
            request_id,
            requester_id,
            challenge_id,
            proof_ref,
            state: RequestState::Received,
            amount: None,
            transaction_hash: None,
            settlement_tx_id: None,
            review_required: false,
            error: None,
            created_at: now,
            updated_at: now,
            audited: false,
            pending_audit: None,
        }
    }

    /// Terminal and durably audited: safe to report as final.
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal() && self.audited
    }

    pub fn status(&self) -> MintRequestStatus {
        MintRequestStatus {
            request_id: self.request_id,
            requester_id: self.requester_id.clone(),
            state: self.state,
            amount: self.amount,
            transaction_hash: self.transaction_hash,
            settlement_tx_id: self.settlement_tx_id.clone(),
            review_required: self.review_required,
            error: self.error.clone(),
            audited: self.audited,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// What callers see for a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequestStatus {
    pub request_id: RequestId,
    pub requester_id: RequesterId,
    pub state: RequestState,
    pub amount: Option<TokenAmount>,
    pub transaction_hash: Option<Hash256>,
    pub settlement_tx_id: Option<String>,
    pub review_required: bool,
    pub error: Option<String>,
    pub audited: bool,
    pub updated_at: Timestamp,
}
