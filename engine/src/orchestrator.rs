//! The issuance orchestrator: wires the verifier, screen, gate, ledger,
//! adapter and audit log into the request lifecycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proofmint_audit::{AuditLog, AuditLogEntry, ChainReport, WriteOutcome};
use proofmint_compliance::{ComplianceAuthority, ComplianceGate};
use proofmint_crypto::proof_reference;
use proofmint_screening::{AntiGamingScreen, SignalSource};
use proofmint_settlement::{
    MintAdapter, MintInstruction, ReconciliationItem, ReconciliationQueue, ReconciliationWorker,
    SettlementError, SettlementOutcome, SettlementRail,
};
use proofmint_store::{AuditStore, ReconciliationStore, RequestStore, SupplyStore};
use proofmint_supply::{
    compute_reward, IssueOutcome, IssueRequest, MintTransaction, Rejection, SupplyLedger,
    SupplyState, SupplyStats,
};
use proofmint_types::{
    Clock, IssuancePolicy, IssuanceRate, RequestId, RequestState, ScreeningAction,
};
use proofmint_verification::{ChallengeRegistry, ProofChallenge, ProofGrader, ProofSubmission, ProofVerifier};
use tracing::Instrument;

use crate::config::backoff_from_policy;
use crate::error::EngineError;
use crate::metrics::EngineMetrics;
use crate::request::{MintRequestRecord, MintRequestStatus, SubmitProof};
use crate::spans;
use crate::table::{wait_for_result, Claim, RequestTable, Slot};
use crate::trail::Trail;

const CANCELLED_BY_CLIENT: &str = "cancelled by client";

/// External collaborators and storage the orchestrator is built from.
pub struct EngineDeps {
    pub supply_store: Arc<dyn SupplyStore>,
    pub audit_store: Arc<dyn AuditStore>,
    pub request_store: Arc<dyn RequestStore>,
    pub reconciliation_store: Arc<dyn ReconciliationStore>,
    pub compliance: Arc<dyn ComplianceAuthority>,
    pub rail: Arc<dyn SettlementRail>,
    /// External risk signal for the screen; `None` disables it.
    pub signal: Option<Arc<dyn SignalSource>>,
    /// Grader for delegated questions.
    pub grader: Option<Arc<dyn ProofGrader>>,
    pub clock: Arc<dyn Clock>,
}

impl EngineDeps {
    /// Deps backed by one store implementing every storage trait.
    pub fn with_store<S>(
        store: Arc<S>,
        compliance: Arc<dyn ComplianceAuthority>,
        rail: Arc<dyn SettlementRail>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: SupplyStore + AuditStore + RequestStore + ReconciliationStore + 'static,
    {
        Self {
            supply_store: store.clone(),
            audit_store: store.clone(),
            request_store: store.clone(),
            reconciliation_store: store,
            compliance,
            rail,
            signal: None,
            grader: None,
            clock,
        }
    }

    pub fn with_signal(mut self, signal: Arc<dyn SignalSource>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_grader(mut self, grader: Arc<dyn ProofGrader>) -> Self {
        self.grader = Some(grader);
        self
    }
}

#[derive(Clone)]
pub struct EngineOptions {
    /// Wait for settlement before replying; otherwise reply `MINTING` once
    /// the ledger has committed.
    pub await_settlement: bool,
    pub metrics: Option<Arc<EngineMetrics>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            await_settlement: true,
            metrics: None,
        }
    }
}

/// A request moving through the pipeline.
struct Run<'a> {
    record: MintRequestRecord,
    trail: Trail,
    slot: &'a Slot,
    started: Instant,
}

pub struct IssuanceOrchestrator {
    policy: IssuancePolicy,
    clock: Arc<dyn Clock>,
    verifier: ProofVerifier,
    screen: AntiGamingScreen,
    gate: ComplianceGate,
    ledger: SupplyLedger,
    adapter: MintAdapter,
    reconciliation: Arc<ReconciliationQueue>,
    audit: AuditLog,
    requests: Arc<dyn RequestStore>,
    table: RequestTable,
    metrics: Option<Arc<EngineMetrics>>,
    await_settlement: bool,
}

impl IssuanceOrchestrator {
    pub fn new(
        policy: IssuancePolicy,
        deps: EngineDeps,
        options: EngineOptions,
    ) -> Result<Arc<Self>, EngineError> {
        policy
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let registry = Arc::new(ChallengeRegistry::new());
        let mut verifier = ProofVerifier::new(
            registry,
            deps.clock.clone(),
            policy.pass_threshold_bps,
            policy.challenge_validity_secs,
        );
        if let Some(grader) = deps.grader {
            verifier = verifier.with_grader(grader, Duration::from_millis(policy.grading_timeout_ms));
        }

        let mut screen = AntiGamingScreen::new(policy.screening.clone());
        if let Some(signal) = deps.signal {
            screen = screen.with_signal_source(signal);
        }

        let gate = ComplianceGate::new(
            deps.compliance,
            Duration::from_millis(policy.compliance_timeout_ms),
            Duration::from_secs(policy.compliance_cache_ttl_secs),
        );

        let ledger = SupplyLedger::open(deps.supply_store, &policy)?;
        let adapter = MintAdapter::new(deps.rail, backoff_from_policy(&policy));
        let reconciliation = Arc::new(ReconciliationQueue::load(deps.reconciliation_store)?);
        let audit = AuditLog::open(deps.audit_store)?;

        let engine = Self {
            policy,
            clock: deps.clock,
            verifier,
            screen,
            gate,
            ledger,
            adapter,
            reconciliation,
            audit,
            requests: deps.request_store,
            table: RequestTable::default(),
            metrics: options.metrics,
            await_settlement: options.await_settlement,
        };
        engine.refresh_supply_metrics();
        engine.refresh_reconciliation_depth();
        Ok(Arc::new(engine))
    }

    // ── Inbound operations ──────────────────────────────────────────────

    /// Register a challenge issued by the learning platform.
    pub fn register_challenge(&self, challenge: ProofChallenge) -> Result<(), EngineError> {
        self.verifier.registry().register(challenge)?;
        Ok(())
    }

    /// Submit a proof and drive it to an outcome.
    ///
    /// A key seen before returns its recorded result. A key that is in
    /// flight waits for the in-flight execution. The pipeline runs on its
    /// own task, so dropping this future does not abandon the request.
    pub async fn submit_proof(
        self: &Arc<Self>,
        submit: SubmitProof,
    ) -> Result<MintRequestStatus, EngineError> {
        let request_id = submit.idempotency_key;
        let claim = self
            .table
            .claim(request_id, || self.load_record(&request_id))?;

        match claim {
            Claim::Existing(record) => {
                if record.requester_id != submit.requester_id
                    || record.challenge_id != submit.challenge_id
                {
                    tracing::warn!(
                        request_id = %request_id,
                        "idempotency key reused with a different submission, returning recorded result"
                    );
                }
                self.resume(record)
            }
            Claim::Follower(rx) => {
                tracing::debug!(request_id = %request_id, "joining in-flight request");
                wait_for_result(rx).await
            }
            Claim::Leader(slot) => {
                let rx = slot.subscribe();
                let engine = Arc::clone(self);
                let span = spans::issuance_span(&request_id, &submit.requester_id);
                tokio::spawn(
                    async move {
                        let guard = engine.table.guard(request_id, slot);
                        let result = engine.run_pipeline(submit, guard.slot()).await;
                        guard.complete(result);
                    }
                    .instrument(span),
                );
                wait_for_result(rx).await
            }
        }
    }

    /// Status of a request by idempotency key.
    pub fn request_status(&self, request_id: &RequestId) -> Result<MintRequestStatus, EngineError> {
        let record = self
            .load_record(request_id)?
            .ok_or(EngineError::UnknownRequest(*request_id))?;
        let mut status = record.status();
        // Reconciliation settles after the audit entry is frozen; surface it here.
        if status.settlement_tx_id.is_none() {
            if let Some(item) = self.reconciliation.get(request_id) {
                status.settlement_tx_id = item.settled_tx_id;
            }
        }
        Ok(status)
    }

    /// Cancel a request that has not reached the ledger yet, and wait for
    /// it to stop.
    pub async fn cancel(&self, request_id: &RequestId) -> Result<MintRequestStatus, EngineError> {
        if let Some(slot) = self.table.get(request_id) {
            let rx = slot.subscribe();
            slot.request_cancel()
                .map_err(|state| EngineError::NotCancellable {
                    request_id: *request_id,
                    state,
                })?;
            tracing::info!(request_id = %request_id, "cancellation requested");
            return wait_for_result(rx).await;
        }
        match self.load_record(request_id)? {
            Some(record) => Err(EngineError::NotCancellable {
                request_id: *request_id,
                state: record.state,
            }),
            None => Err(EngineError::UnknownRequest(*request_id)),
        }
    }

    // ── Inspection ──────────────────────────────────────────────────────

    pub fn supply_stats(&self) -> SupplyStats {
        self.ledger.stats()
    }

    pub fn supply_snapshot(&self) -> SupplyState {
        self.ledger.snapshot()
    }

    /// Issuances still waiting for settlement, oldest first.
    pub fn reconciliation_items(&self) -> Vec<ReconciliationItem> {
        self.reconciliation.pending()
    }

    pub fn reconciliation_queue(&self) -> &Arc<ReconciliationQueue> {
        &self.reconciliation
    }

    /// A background worker that retries the reconciliation queue.
    pub fn reconciliation_worker(&self, interval: Duration) -> ReconciliationWorker {
        ReconciliationWorker::new(self.reconciliation.clone(), self.adapter.rail().clone(), interval)
    }

    pub fn audit_entry(&self, request_id: &RequestId) -> Result<Option<AuditLogEntry>, EngineError> {
        Ok(self.audit.get(request_id)?)
    }

    pub fn audit_entries(&self) -> Result<Vec<AuditLogEntry>, EngineError> {
        Ok(self.audit.entries()?)
    }

    pub fn verify_audit_chain(&self) -> Result<ChainReport, EngineError> {
        Ok(self.audit.verify_chain()?)
    }

    pub fn metrics(&self) -> Option<&Arc<EngineMetrics>> {
        self.metrics.as_ref()
    }

    pub fn policy(&self) -> &IssuancePolicy {
        &self.policy
    }

    pub fn open_challenges(&self) -> usize {
        self.verifier.registry().len()
    }

    /// Drop challenges past their validity window.
    pub fn purge_expired_challenges(&self) -> usize {
        self.verifier
            .registry()
            .purge_expired(self.policy.challenge_validity_secs, self.clock.now())
    }

    // ── Pipeline ────────────────────────────────────────────────────────

    async fn run_pipeline(
        &self,
        submit: SubmitProof,
        slot: &Slot,
    ) -> Result<MintRequestStatus, EngineError> {
        let received_at = self.clock.now();
        let proof_ref = proof_reference(&submit.challenge_id, &submit.requester_id, &submit.answers);
        let record = MintRequestRecord::new(
            submit.idempotency_key,
            submit.requester_id.clone(),
            submit.challenge_id.clone(),
            proof_ref,
            received_at,
        );
        self.persist(&record)?;
        tracing::info!(challenge = %submit.challenge_id, "mint request received");

        let mut run = Run {
            record,
            trail: Trail::default(),
            slot,
            started: Instant::now(),
        };

        // VERIFYING: grading and the external risk lookup run side by side.
        if !self.advance(&mut run, RequestState::Verifying)? {
            return self.finish(run, RequestState::Cancelled, Some(CANCELLED_BY_CLIENT.into()));
        }
        let submission = ProofSubmission {
            challenge_id: submit.challenge_id.clone(),
            requester_id: submit.requester_id.clone(),
            answers: submit.answers,
            submitted_at: submit.submitted_at.unwrap_or(received_at),
        };
        let (verified, external) = tokio::select! {
            biased;
            _ = slot.cancelled() => {
                return self.finish(run, RequestState::Cancelled, Some(CANCELLED_BY_CLIENT.into()));
            }
            both = async {
                tokio::join!(
                    self.verifier.verify(&submission),
                    self.screen.fetch_external(&submit.requester_id)
                )
            } => both,
        };
        let proof = match verified {
            Ok(proof) => proof,
            Err(e) => {
                tracing::info!(error = %e, "proof rejected by verifier");
                return self.finish(run, RequestState::Failed, Some(e.to_string()));
            }
        };
        run.trail.proof(&proof, proof_ref);

        // SCREENING
        if !self.advance(&mut run, RequestState::Screening)? {
            return self.finish(run, RequestState::Cancelled, Some(CANCELLED_BY_CLIENT.into()));
        }
        let verdict = self.screen.assess(&proof, external, received_at);
        run.trail.screening(&verdict);
        if verdict.action == ScreeningAction::Block {
            tracing::warn!(
                confidence_bps = verdict.confidence_bps,
                reasons = ?verdict.reasons,
                "submission blocked by anti-gaming screen"
            );
            let reasons = verdict.reasons.join("; ");
            return self.finish(run, RequestState::Blocked, Some(format!("blocked: {}", reasons)));
        }
        if !proof.score.valid {
            let error = format!(
                "score {}/{} below pass threshold",
                proof.score.correct_count, proof.score.total_count
            );
            return self.finish(run, RequestState::Failed, Some(error));
        }

        // COMPLIANCE_CHECK
        if !self.advance(&mut run, RequestState::ComplianceCheck)? {
            return self.finish(run, RequestState::Cancelled, Some(CANCELLED_BY_CLIENT.into()));
        }
        let compliance = tokio::select! {
            biased;
            _ = slot.cancelled() => {
                return self.finish(run, RequestState::Cancelled, Some(CANCELLED_BY_CLIENT.into()));
            }
            verdict = self.gate.check(&submit.requester_id) => verdict,
        };
        run.trail.compliance(&compliance);
        if let Some(failure) = &compliance.failure {
            if let Some(m) = &self.metrics {
                m.compliance_failures_total.inc();
            }
            tracing::warn!(error = %failure, "compliance check failed closed");
        }
        if !compliance.permits_issuance() {
            let error = match &compliance.failure {
                Some(failure) => format!("compliance unavailable: {}", failure),
                None => format!("compliance status {:?}", compliance.status).to_lowercase(),
            };
            return self.finish(run, RequestState::Rejected, Some(error));
        }

        // CALCULATING
        if !self.advance(&mut run, RequestState::Calculating)? {
            return self.finish(run, RequestState::Cancelled, Some(CANCELLED_BY_CLIENT.into()));
        }
        let score = proof.score;
        let mut rate = self.ledger.current_rate();
        let mut reward = match compute_reward(
            &self.policy,
            score.correct_count,
            score.total_count,
            rate,
            &submit.profile,
        ) {
            Ok(reward) => reward,
            Err(e) => return self.finish(run, RequestState::Failed, Some(e.to_string())),
        };

        // LEDGER_CHECK: re-price while a halving lands between pricing and commit.
        if !self.advance(&mut run, RequestState::LedgerCheck)? {
            run.trail.reward(reward);
            return self.finish(run, RequestState::Cancelled, Some(CANCELLED_BY_CLIENT.into()));
        }
        let mut reprices = 0u32;
        let transaction = loop {
            if reward.amount.is_zero() {
                run.trail.reward(reward);
                let error = format!("reward floors to zero at rate {}", rate);
                return self.finish(run, RequestState::Failed, Some(error));
            }
            let request = IssueRequest {
                request_id: run.record.request_id,
                amount: reward.amount,
                priced_at: rate,
                timestamp: self.clock.now(),
            };
            let outcome = match self.ledger.try_issue(request) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "supply ledger failed");
                    run.trail.reward(reward);
                    return self.finish(run, RequestState::Failed, Some(e.to_string()));
                }
            };
            match outcome {
                IssueOutcome::Accepted {
                    transaction,
                    new_rate,
                    replayed,
                } => {
                    let (before, after) = self.around(&transaction, new_rate);
                    run.trail.supply(&before, &after);
                    run.trail.reward(reward);
                    if !replayed {
                        if let Some(m) = &self.metrics {
                            m.record_minted(transaction.amount, transaction.new_total_supply, new_rate.as_f64());
                        }
                    }
                    break transaction;
                }
                IssueOutcome::Rejected {
                    rejection: Rejection::RateChanged { current, .. },
                    ..
                } => {
                    reprices += 1;
                    if reprices > self.policy.max_reprice_attempts {
                        run.trail.reward(reward);
                        let error = format!("issuance rate changed {} times while pricing", reprices);
                        return self.finish(run, RequestState::Failed, Some(error));
                    }
                    tracing::debug!(rate = %current, "rate changed before commit, re-pricing");
                    rate = current;
                    reward = match compute_reward(
                        &self.policy,
                        score.correct_count,
                        score.total_count,
                        rate,
                        &submit.profile,
                    ) {
                        Ok(reward) => reward,
                        Err(e) => return self.finish(run, RequestState::Failed, Some(e.to_string())),
                    };
                }
                IssueOutcome::Rejected {
                    rejection: Rejection::SupplyExceeded { requested, remaining },
                    state,
                } => {
                    run.trail.supply(&state, &state);
                    run.trail.reward(reward);
                    let error = format!("requested {} but only {} remains", requested, remaining);
                    return self.finish(run, RequestState::SupplyExceeded, Some(error));
                }
            }
        };
        run.record.amount = Some(transaction.amount);
        run.record.transaction_hash = Some(transaction.hash);
        let instruction = MintInstruction {
            request_id: run.record.request_id,
            requester_id: run.record.requester_id.clone(),
            amount: transaction.amount,
        };
        run.trail.mint(transaction);

        // MINTING
        self.advance(&mut run, RequestState::Minting)?;
        self.screen.record_accepted(&submit.requester_id, received_at);
        if !self.await_settlement {
            slot.publish(Ok(run.record.status()));
        }
        self.settle(run, instruction)
            .instrument(spans::settlement_span(&submit.idempotency_key))
            .await
    }

    async fn settle(
        &self,
        mut run: Run<'_>,
        instruction: MintInstruction,
    ) -> Result<MintRequestStatus, EngineError> {
        let outcome = self.adapter.settle(&instruction).await;
        if let Some(m) = &self.metrics {
            m.settlement_retries_total
                .inc_by(u64::from(outcome.attempts().saturating_sub(1)));
        }
        match outcome {
            SettlementOutcome::Settled { receipt, attempts } => {
                run.trail.settlement(Some(receipt.tx_id.clone()), attempts);
                run.record.settlement_tx_id = Some(receipt.tx_id);
                self.finish(run, RequestState::Confirmed, None)
            }
            SettlementOutcome::Failed { error, attempts } => {
                run.trail.settlement(None, attempts);
                // Left in MINTING if this fails; a retry or restart re-queues it.
                self.reconciliation
                    .enqueue(&instruction, &error, attempts, self.clock.now())?;
                self.refresh_reconciliation_depth();
                let error = format!(
                    "settlement failed after {} attempts: {}; queued for reconciliation",
                    attempts, error
                );
                self.finish(run, RequestState::MintFailed, Some(error))
            }
        }
    }

    /// Move to the next stage. `false` means a cancellation got there first.
    fn advance(&self, run: &mut Run<'_>, next: RequestState) -> Result<bool, EngineError> {
        let from = run.record.state;
        if !from.can_transition_to(next) {
            return Err(EngineError::IllegalTransition { from, to: next });
        }
        if !run.slot.enter(next) {
            return Ok(false);
        }
        run.record.state = next;
        run.record.updated_at = self.clock.now();
        self.persist(&run.record)?;
        tracing::debug!(state = %next, "request advanced");
        Ok(true)
    }

    fn finish(
        &self,
        run: Run<'_>,
        state: RequestState,
        error: Option<String>,
    ) -> Result<MintRequestStatus, EngineError> {
        let Run {
            record,
            trail,
            slot,
            started,
        } = run;
        let result = self.conclude(record, trail, state, error);
        slot.set_state(state);
        if let Some(m) = &self.metrics {
            m.request_latency_seconds.observe(started.elapsed().as_secs_f64());
        }
        result
    }

    /// Record the terminal state and audit it.
    fn conclude(
        &self,
        mut record: MintRequestRecord,
        mut trail: Trail,
        state: RequestState,
        error: Option<String>,
    ) -> Result<MintRequestStatus, EngineError> {
        let from = record.state;
        if !from.can_transition_to(state) {
            return Err(EngineError::IllegalTransition { from, to: state });
        }
        if !trail.has_supply() {
            let current = self.ledger.snapshot();
            trail.supply(&current, &current);
        }
        let now = self.clock.now();
        record.state = state;
        record.error = error.clone();
        record.review_required = trail.review_required();
        record.updated_at = now;
        record.pending_audit = Some(trail.into_entry(
            record.request_id,
            record.requester_id.clone(),
            state,
            error,
            now,
        ));
        self.persist(&record)?;
        if let Some(m) = &self.metrics {
            m.record_terminal(state);
        }
        tracing::info!(
            request_id = %record.request_id,
            state = %state,
            amount = ?record.amount,
            error = record.error.as_deref().unwrap_or(""),
            "request reached terminal state"
        );
        self.write_audit(record)
    }

    /// Write the pending audit entry of a terminal record.
    pub(crate) fn write_audit(
        &self,
        mut record: MintRequestRecord,
    ) -> Result<MintRequestStatus, EngineError> {
        let Some(entry) = record.pending_audit.clone() else {
            return Ok(record.status());
        };
        match self.audit.write(entry) {
            Ok(outcome) => {
                if let WriteOutcome::AlreadyRecorded(_) = outcome {
                    tracing::debug!(request_id = %record.request_id, "audit entry already recorded");
                }
                record.audited = true;
                record.pending_audit = None;
                // The entry is durable; a stale record only costs a no-op rewrite later.
                if let Err(e) = self.persist(&record) {
                    tracing::warn!(request_id = %record.request_id, error = %e, "failed to mark request audited");
                }
                Ok(record.status())
            }
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.audit_failures_total.inc();
                }
                tracing::error!(request_id = %record.request_id, error = %e, "audit write failed");
                Err(EngineError::AuditUnavailable(e.to_string()))
            }
        }
    }

    /// A key that is no longer in flight.
    fn resume(&self, record: MintRequestRecord) -> Result<MintRequestStatus, EngineError> {
        if record.is_settled() {
            return self.request_status(&record.request_id);
        }
        if record.state.is_terminal() {
            tracing::info!(request_id = %record.request_id, "retrying audit write");
            return self.write_audit(record);
        }
        self.resolve_interrupted(record)
    }

    /// Close out a non-terminal record whose pipeline is gone. Issuances the
    /// ledger journaled go to reconciliation; everything else fails.
    pub(crate) fn resolve_interrupted(
        &self,
        mut record: MintRequestRecord,
    ) -> Result<MintRequestStatus, EngineError> {
        let mut trail = Trail::default();
        match self.ledger.transaction(&record.request_id)? {
            Some(transaction) => {
                let instruction = MintInstruction {
                    request_id: record.request_id,
                    requester_id: record.requester_id.clone(),
                    amount: transaction.amount,
                };
                let reason = SettlementError::Transient("interrupted before settlement".into());
                self.reconciliation
                    .enqueue(&instruction, &reason, 0, self.clock.now())?;
                self.refresh_reconciliation_depth();
                record.amount = Some(transaction.amount);
                record.transaction_hash = Some(transaction.hash);
                if record.state != RequestState::Minting {
                    // The commit landed but MINTING was never persisted.
                    record.state = RequestState::LedgerCheck;
                }
                let current = self.ledger.snapshot();
                trail.supply(&current, &current);
                trail.mint(transaction);
                tracing::warn!(request_id = %record.request_id, "interrupted issuance queued for reconciliation");
                self.conclude(
                    record,
                    trail,
                    RequestState::MintFailed,
                    Some("interrupted before settlement; queued for reconciliation".into()),
                )
            }
            None => {
                if record.state.is_post_commit() {
                    // Nothing journaled, so nothing was issued.
                    record.state = RequestState::LedgerCheck;
                }
                tracing::warn!(request_id = %record.request_id, state = %record.state, "interrupted request failed");
                self.conclude(
                    record,
                    trail,
                    RequestState::Failed,
                    Some("interrupted before completion".into()),
                )
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    /// Supply just before and just after an accepted issuance.
    fn around(&self, transaction: &MintTransaction, new_rate: IssuanceRate) -> (SupplyState, SupplyState) {
        let template = self.ledger.snapshot();
        let after = SupplyState {
            total_minted: transaction.new_total_supply,
            current_issuance_rate: new_rate,
            issuance_events_count: transaction.event_index,
            ..template
        };
        let before = SupplyState {
            total_minted: transaction.new_total_supply.saturating_sub(transaction.amount),
            current_issuance_rate: transaction.rate,
            issuance_events_count: transaction.event_index.saturating_sub(1),
            ..after.clone()
        };
        (before, after)
    }

    pub(crate) fn load_record(&self, request_id: &RequestId) -> Result<Option<MintRequestRecord>, EngineError> {
        match self.requests.get_request(request_id)? {
            Some(bytes) => Ok(Some(MintRequestRecord::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn stored_records(&self) -> Result<Vec<MintRequestRecord>, EngineError> {
        self.requests
            .iter_requests()?
            .into_iter()
            .map(|(_, bytes)| MintRequestRecord::decode(&bytes).map_err(EngineError::from))
            .collect()
    }

    pub(crate) fn is_in_flight(&self, request_id: &RequestId) -> bool {
        self.table.contains(request_id)
    }

    fn persist(&self, record: &MintRequestRecord) -> Result<(), EngineError> {
        self.requests.put_request(&record.request_id, &record.encode()?)?;
        Ok(())
    }

    pub(crate) fn refresh_reconciliation_depth(&self) {
        if let Some(m) = &self.metrics {
            m.reconciliation_depth
                .set(i64::try_from(self.reconciliation.pending_count()).unwrap_or(i64::MAX));
        }
    }

    fn refresh_supply_metrics(&self) {
        if let Some(m) = &self.metrics {
            let state = self.ledger.snapshot();
            m.total_minted
                .set(i64::try_from(state.total_minted.raw()).unwrap_or(i64::MAX));
            m.issuance_rate.set(state.current_issuance_rate.as_f64());
        }
    }
}
