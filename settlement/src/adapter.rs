//! Inline settlement with bounded retries.

use std::sync::Arc;

use crate::backoff::BackoffPolicy;
use crate::error::SettlementError;
use crate::rail::{MintInstruction, SettlementRail, SettlementReceipt};

/// How an inline settlement attempt ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled { receipt: SettlementReceipt, attempts: u32 },
    /// Retries exhausted or the rail refused; hand over to reconciliation.
    Failed { error: SettlementError, attempts: u32 },
}

impl SettlementOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Settled { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

pub struct MintAdapter {
    rail: Arc<dyn SettlementRail>,
    backoff: BackoffPolicy,
}

impl MintAdapter {
    pub fn new(rail: Arc<dyn SettlementRail>, backoff: BackoffPolicy) -> Self {
        Self { rail, backoff }
    }

    pub fn rail(&self) -> &Arc<dyn SettlementRail> {
        &self.rail
    }

    /// Submit an instruction, retrying transient failures with backoff.
    /// Permanent rejections are not retried.
    pub async fn settle(&self, instruction: &MintInstruction) -> SettlementOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.rail.submit_mint(instruction).await {
                Ok(receipt) => {
                    tracing::info!(
                        request_id = %instruction.request_id,
                        tx_id = %receipt.tx_id,
                        attempts = attempt,
                        "mint settled"
                    );
                    return SettlementOutcome::Settled {
                        receipt,
                        attempts: attempt,
                    };
                }
                Err(error) if error.is_transient() && attempt < self.backoff.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    tracing::warn!(
                        request_id = %instruction.request_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "settlement attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    tracing::error!(
                        request_id = %instruction.request_id,
                        attempts = attempt,
                        error = %error,
                        "settlement failed"
                    );
                    return SettlementOutcome::Failed {
                        error,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use proofmint_types::{RequestId, RequesterId, TokenAmount};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` calls with `error`, then settles.
    pub(crate) struct FlakyRail {
        pub failures: u32,
        pub error: SettlementError,
        pub calls: AtomicU32,
    }

    impl FlakyRail {
        pub(crate) fn new(failures: u32, error: SettlementError) -> Arc<Self> {
            Arc::new(Self {
                failures,
                error,
                calls: AtomicU32::new(0),
            })
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SettlementRail for FlakyRail {
        async fn submit_mint(&self, ix: &MintInstruction) -> Result<SettlementReceipt, SettlementError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(self.error.clone())
            } else {
                Ok(SettlementReceipt {
                    tx_id: format!("tx-{}", ix.request_id),
                })
            }
        }
    }

    pub(crate) fn instruction() -> MintInstruction {
        MintInstruction {
            request_id: RequestId::random(),
            requester_id: RequesterId::new("learner-1").unwrap(),
            amount: TokenAmount::new(13),
        }
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(5, Duration::from_millis(200), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let rail = FlakyRail::new(2, SettlementError::Transient("503".into()));
        let adapter = MintAdapter::new(rail.clone(), policy());

        let started = tokio::time::Instant::now();
        let outcome = adapter.settle(&instruction()).await;

        assert!(matches!(outcome, SettlementOutcome::Settled { attempts: 3, .. }));
        assert_eq!(rail.calls(), 3);
        // 200ms + 400ms of backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let rail = FlakyRail::new(u32::MAX, SettlementError::Transient("timeout".into()));
        let adapter = MintAdapter::new(rail.clone(), policy());

        let outcome = adapter.settle(&instruction()).await;

        assert_eq!(outcome.attempts(), 5);
        assert!(matches!(outcome, SettlementOutcome::Failed { ref error, .. } if error.is_transient()));
        assert_eq!(rail.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_rejection_is_not_retried() {
        let rail = FlakyRail::new(u32::MAX, SettlementError::Permanent("HTTP 422".into()));
        let adapter = MintAdapter::new(rail.clone(), policy());

        let outcome = adapter.settle(&instruction()).await;

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(rail.calls(), 1);
    }
}
