//! Nullable external collaborators: compliance authority, settlement rail,
//! risk signal and grader. Each is scriptable and records its calls.

use async_trait::async_trait;
use proofmint_compliance::{AuthorityResponse, ComplianceAuthority, ComplianceError};
use proofmint_screening::{ScreeningError, SignalSource};
use proofmint_settlement::{MintInstruction, SettlementError, SettlementRail, SettlementReceipt};
use proofmint_types::{ComplianceStatus, RequestId, RequesterId};
use proofmint_verification::{GradeError, ProofGrader, Question};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A compliance authority that answers from a script.
///
/// Approves everyone by default. Per-requester verdicts override the default.
pub struct NullComplianceAuthority {
    default_status: ComplianceStatus,
    overrides: Mutex<HashMap<RequesterId, ComplianceStatus>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicU32,
}

impl NullComplianceAuthority {
    pub fn new() -> Self {
        Self::answering(ComplianceStatus::Approved)
    }

    pub fn answering(status: ComplianceStatus) -> Self {
        Self {
            default_status: status,
            overrides: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    pub fn set_status(&self, requester: &RequesterId, status: ComplianceStatus) {
        self.overrides.lock().unwrap().insert(requester.clone(), status);
    }

    /// Make every call fail as if the authority were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep this long before answering (drive past the gate's timeout).
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for NullComplianceAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ComplianceAuthority for NullComplianceAuthority {
    async fn check(&self, requester: &RequesterId) -> Result<AuthorityResponse, ComplianceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ComplianceError::Unavailable("null authority is failing".into()));
        }
        let status = self
            .overrides
            .lock()
            .unwrap()
            .get(requester)
            .copied()
            .unwrap_or(self.default_status);
        Ok(AuthorityResponse {
            status,
            log_id: Some(format!("null-log-{}", requester)),
        })
    }
}

/// A settlement rail that settles idempotently by request id, after an
/// optional number of scripted failures.
pub struct NullSettlementRail {
    failures_left: AtomicU32,
    permanent: AtomicBool,
    submitted: Mutex<Vec<MintInstruction>>,
    settled: Mutex<HashMap<RequestId, SettlementReceipt>>,
}

impl NullSettlementRail {
    pub fn new() -> Self {
        Self {
            failures_left: AtomicU32::new(0),
            permanent: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
            settled: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next `n` submissions with a transient error.
    pub fn fail_transient(&self, n: u32) {
        self.permanent.store(false, Ordering::SeqCst);
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` submissions with a permanent rejection.
    pub fn fail_permanent(&self, n: u32) {
        self.permanent.store(true, Ordering::SeqCst);
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Every instruction submitted, failed attempts included.
    pub fn submitted(&self) -> Vec<MintInstruction> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// Number of distinct requests that settled.
    pub fn settled_count(&self) -> usize {
        self.settled.lock().unwrap().len()
    }

    pub fn receipt(&self, request_id: &RequestId) -> Option<SettlementReceipt> {
        self.settled.lock().unwrap().get(request_id).cloned()
    }
}

impl Default for NullSettlementRail {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettlementRail for NullSettlementRail {
    async fn submit_mint(&self, instruction: &MintInstruction) -> Result<SettlementReceipt, SettlementError> {
        self.submitted.lock().unwrap().push(instruction.clone());
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(if self.permanent.load(Ordering::SeqCst) {
                SettlementError::Permanent("null rail rejected".into())
            } else {
                SettlementError::Transient("null rail unavailable".into())
            });
        }
        let receipt = self
            .settled
            .lock()
            .unwrap()
            .entry(instruction.request_id)
            .or_insert_with(|| SettlementReceipt {
                tx_id: format!("null-tx-{}", instruction.request_id),
            })
            .clone();
        Ok(receipt)
    }
}

/// A risk-signal source returning a fixed score.
pub struct NullSignalSource {
    risk_bps: AtomicU32,
    failing: AtomicBool,
}

impl NullSignalSource {
    pub fn new(risk_bps: u32) -> Self {
        Self {
            risk_bps: AtomicU32::new(risk_bps),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_risk(&self, risk_bps: u32) {
        self.risk_bps.store(risk_bps, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for NullSignalSource {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl SignalSource for NullSignalSource {
    async fn risk_bps(&self, _requester: &RequesterId) -> Result<u32, ScreeningError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ScreeningError::SignalUnavailable("null signal is failing".into()));
        }
        Ok(self.risk_bps.load(Ordering::SeqCst))
    }
}

/// A grader that accepts an answer iff it contains the configured keyword.
/// It can be made to fail or to never answer.
pub struct NullGrader {
    keyword: String,
    failing: AtomicBool,
    hanging: AtomicBool,
}

impl NullGrader {
    pub fn accepting(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            failing: AtomicBool::new(false),
            hanging: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProofGrader for NullGrader {
    async fn grade(&self, _question: &Question, answer: &str) -> Result<bool, GradeError> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GradeError::Unavailable("null grader is failing".into()));
        }
        Ok(answer.contains(&self.keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofmint_types::TokenAmount;

    fn instruction() -> MintInstruction {
        MintInstruction {
            request_id: RequestId::random(),
            requester_id: RequesterId::new("learner-1").unwrap(),
            amount: TokenAmount::new(10),
        }
    }

    #[tokio::test]
    async fn rail_fails_scripted_times_then_settles_idempotently() {
        let rail = NullSettlementRail::new();
        rail.fail_transient(2);
        let ix = instruction();

        assert!(rail.submit_mint(&ix).await.unwrap_err().is_transient());
        assert!(rail.submit_mint(&ix).await.unwrap_err().is_transient());
        let first = rail.submit_mint(&ix).await.unwrap();
        let again = rail.submit_mint(&ix).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(rail.calls(), 4);
        assert_eq!(rail.settled_count(), 1);
    }

    #[tokio::test]
    async fn authority_overrides_default_per_requester() {
        let authority = NullComplianceAuthority::new();
        let flagged = RequesterId::new("flagged").unwrap();
        authority.set_status(&flagged, ComplianceStatus::Rejected);

        let ok = authority.check(&RequesterId::new("fine").unwrap()).await.unwrap();
        let no = authority.check(&flagged).await.unwrap();
        assert_eq!(ok.status, ComplianceStatus::Approved);
        assert_eq!(no.status, ComplianceStatus::Rejected);

        authority.set_failing(true);
        assert!(authority.check(&flagged).await.is_err());
        assert_eq!(authority.calls(), 3);
    }
}
