//! Evidence gathered while a request moves through the pipeline, frozen into
//! its audit entry at the terminal state.

use proofmint_audit::{
    AuditLogEntry, ComplianceSnapshot, MintDetails, ProofSnapshot, ScreeningSnapshot, SupplySnapshot,
};
use proofmint_compliance::ComplianceVerdict;
use proofmint_screening::AntiGamingVerdict;
use proofmint_supply::{MintTransaction, RewardBreakdown, SupplyState};
use proofmint_types::{Hash256, RequestId, RequestState, RequesterId, Timestamp};
use proofmint_verification::VerifiedProof;

#[derive(Default)]
pub(crate) struct Trail {
    proof: Option<ProofSnapshot>,
    screening: Option<ScreeningSnapshot>,
    compliance: Option<ComplianceSnapshot>,
    supply_before: Option<SupplySnapshot>,
    supply_after: Option<SupplySnapshot>,
    reward: Option<RewardBreakdown>,
    mint: Option<MintDetails>,
    review_required: bool,
}

impl Trail {
    pub(crate) fn proof(&mut self, proof: &VerifiedProof, proof_ref: Hash256) {
        self.proof = Some(ProofSnapshot {
            challenge_id: proof.challenge.id.clone(),
            proof_ref,
            difficulty: proof.challenge.difficulty,
            correct_count: proof.score.correct_count,
            total_count: proof.score.total_count,
            grading_errors: proof.score.grading_errors,
            valid: proof.score.valid,
        });
    }

    pub(crate) fn screening(&mut self, verdict: &AntiGamingVerdict) {
        self.review_required = verdict.requires_review();
        self.screening = Some(ScreeningSnapshot {
            action: verdict.action,
            confidence_bps: verdict.confidence_bps,
            reasons: verdict.reasons.clone(),
            degraded: verdict.degraded,
        });
    }

    pub(crate) fn compliance(&mut self, verdict: &ComplianceVerdict) {
        self.compliance = Some(ComplianceSnapshot {
            status: verdict.status,
            log_id: verdict.log_id.clone(),
            from_cache: verdict.from_cache,
        });
    }

    pub(crate) fn reward(&mut self, reward: RewardBreakdown) {
        self.reward = Some(reward);
    }

    /// Supply around the ledger call. Outcomes that never reached the
    /// ledger record the same snapshot on both sides.
    pub(crate) fn supply(&mut self, before: &SupplyState, after: &SupplyState) {
        self.supply_before = Some(before.into());
        self.supply_after = Some(after.into());
    }

    pub(crate) fn has_supply(&self) -> bool {
        self.supply_before.is_some()
    }

    pub(crate) fn mint(&mut self, transaction: MintTransaction) {
        self.mint = Some(MintDetails {
            transaction,
            settlement_tx_id: None,
            settlement_attempts: 0,
        });
    }

    pub(crate) fn settlement(&mut self, tx_id: Option<String>, attempts: u32) {
        if let Some(mint) = self.mint.as_mut() {
            mint.settlement_tx_id = tx_id;
            mint.settlement_attempts = attempts;
        }
    }

    pub(crate) fn review_required(&self) -> bool {
        self.review_required
    }

    pub(crate) fn into_entry(
        self,
        request_id: RequestId,
        requester_id: RequesterId,
        final_state: RequestState,
        error: Option<String>,
        timestamp: Timestamp,
    ) -> AuditLogEntry {
        let mut entry = AuditLogEntry::new(request_id, requester_id, final_state, timestamp);
        entry.proof_snapshot = self.proof;
        entry.screening_snapshot = self.screening;
        entry.compliance_snapshot = self.compliance;
        entry.supply_snapshot_before = self.supply_before;
        entry.supply_snapshot_after = self.supply_after;
        entry.reward = self.reward;
        entry.mint_details = self.mint;
        entry.error_details = error;
        entry.review_required = self.review_required;
        entry
    }
}
