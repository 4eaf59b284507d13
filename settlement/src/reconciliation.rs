//! Reconciliation of committed issuances that failed to settle inline.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use proofmint_store::{ReconciliationStore, StoreError};
use proofmint_types::{RequestId, RequesterId, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::SettlementError;
use crate::rail::{MintInstruction, SettlementRail};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationItem {
    pub request_id: RequestId,
    pub requester_id: RequesterId,
    pub amount: TokenAmount,
    /// Settlement attempts so far, inline ones included.
    pub attempts: u32,
    pub last_error: String,
    pub enqueued_at: Timestamp,
    /// Set once the rail acknowledges the mint.
    pub settled_tx_id: Option<String>,
}

impl ReconciliationItem {
    pub fn is_settled(&self) -> bool {
        self.settled_tx_id.is_some()
    }

    pub fn instruction(&self) -> MintInstruction {
        MintInstruction {
            request_id: self.request_id,
            requester_id: self.requester_id.clone(),
            amount: self.amount,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Durable queue of unsettled issuances, mirrored in memory.
///
/// Every mutation is written through to the store before the in-memory copy
/// changes.
pub struct ReconciliationQueue {
    store: Arc<dyn ReconciliationStore>,
    items: Mutex<BTreeMap<RequestId, ReconciliationItem>>,
}

impl ReconciliationQueue {
    /// Restore the queue from the store.
    pub fn load(store: Arc<dyn ReconciliationStore>) -> Result<Self, SettlementError> {
        let mut items = BTreeMap::new();
        for (id, bytes) in store.iter_items()? {
            items.insert(id, ReconciliationItem::decode(&bytes)?);
        }
        let pending = items.values().filter(|i| !i.is_settled()).count();
        if pending > 0 {
            tracing::info!(pending, "restored reconciliation queue");
        }
        Ok(Self {
            store,
            items: Mutex::new(items),
        })
    }

    /// Queue an instruction that failed to settle. Re-enqueuing a request that
    /// is already queued keeps the original item and adds to its attempts.
    pub fn enqueue(
        &self,
        instruction: &MintInstruction,
        error: &SettlementError,
        attempts: u32,
        now: Timestamp,
    ) -> Result<ReconciliationItem, SettlementError> {
        let mut items = self.lock();
        let item = match items.get(&instruction.request_id) {
            Some(existing) => ReconciliationItem {
                attempts: existing.attempts.saturating_add(attempts),
                last_error: error.to_string(),
                ..existing.clone()
            },
            None => ReconciliationItem {
                request_id: instruction.request_id,
                requester_id: instruction.requester_id.clone(),
                amount: instruction.amount,
                attempts,
                last_error: error.to_string(),
                enqueued_at: now,
                settled_tx_id: None,
            },
        };
        self.store.put_item(&item.request_id, &item.encode()?)?;
        items.insert(item.request_id, item.clone());
        tracing::warn!(
            request_id = %item.request_id,
            amount = %item.amount,
            attempts = item.attempts,
            "issuance queued for reconciliation"
        );
        Ok(item)
    }

    /// Items still waiting for settlement, oldest first.
    pub fn pending(&self) -> Vec<ReconciliationItem> {
        let mut pending: Vec<_> = self
            .lock()
            .values()
            .filter(|i| !i.is_settled())
            .cloned()
            .collect();
        pending.sort_by_key(|i| i.enqueued_at);
        pending
    }

    pub fn pending_count(&self) -> usize {
        self.lock().values().filter(|i| !i.is_settled()).count()
    }

    pub fn get(&self, request_id: &RequestId) -> Option<ReconciliationItem> {
        self.lock().get(request_id).cloned()
    }

    pub fn mark_settled(&self, request_id: &RequestId, tx_id: &str) -> Result<(), SettlementError> {
        self.update(request_id, |item| {
            item.attempts = item.attempts.saturating_add(1);
            item.settled_tx_id = Some(tx_id.to_string());
        })
    }

    pub fn record_failure(&self, request_id: &RequestId, error: &SettlementError) -> Result<(), SettlementError> {
        self.update(request_id, |item| {
            item.attempts = item.attempts.saturating_add(1);
            item.last_error = error.to_string();
        })
    }

    fn update(
        &self,
        request_id: &RequestId,
        f: impl FnOnce(&mut ReconciliationItem),
    ) -> Result<(), SettlementError> {
        let mut items = self.lock();
        let Some(current) = items.get(request_id) else {
            return Ok(());
        };
        let mut item = current.clone();
        f(&mut item);
        self.store.put_item(request_id, &item.encode()?)?;
        items.insert(*request_id, item);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<RequestId, ReconciliationItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Result of one reconciliation pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconciliationPass {
    pub settled: usize,
    pub failed: usize,
}

/// Background task that keeps retrying queued settlements until the rail
/// acknowledges them.
pub struct ReconciliationWorker {
    queue: Arc<ReconciliationQueue>,
    rail: Arc<dyn SettlementRail>,
    interval: Duration,
}

impl ReconciliationWorker {
    pub fn new(queue: Arc<ReconciliationQueue>, rail: Arc<dyn SettlementRail>, interval: Duration) -> Self {
        Self { queue, rail, interval }
    }

    /// Try every pending item once.
    pub async fn run_once(&self) -> ReconciliationPass {
        let mut pass = ReconciliationPass::default();
        for item in self.queue.pending() {
            let result = self.rail.submit_mint(&item.instruction()).await;
            let recorded = match result {
                Ok(receipt) => {
                    tracing::info!(
                        request_id = %item.request_id,
                        tx_id = %receipt.tx_id,
                        "reconciled settlement"
                    );
                    pass.settled += 1;
                    self.queue.mark_settled(&item.request_id, &receipt.tx_id)
                }
                Err(e) => {
                    tracing::debug!(request_id = %item.request_id, error = %e, "reconciliation attempt failed");
                    pass.failed += 1;
                    self.queue.record_failure(&item.request_id, &e)
                }
            };
            if let Err(e) = recorded {
                tracing::error!(request_id = %item.request_id, error = %e, "failed to persist reconciliation item");
            }
        }
        pass
    }

    /// Run passes every `interval` until shutdown.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("reconciliation worker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if self.queue.pending_count() == 0 {
                        continue;
                    }
                    let pass = self.run_once().await;
                    if pass.settled > 0 || pass.failed > 0 {
                        tracing::info!(settled = pass.settled, failed = pass.failed, "reconciliation pass");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::{instruction, FlakyRail};

    #[derive(Default)]
    struct MemStore {
        items: Mutex<BTreeMap<RequestId, Vec<u8>>>,
    }

    impl ReconciliationStore for MemStore {
        fn put_item(&self, request_id: &RequestId, item: &[u8]) -> Result<(), StoreError> {
            self.items.lock().unwrap().insert(*request_id, item.to_vec());
            Ok(())
        }

        fn iter_items(&self) -> Result<Vec<(RequestId, Vec<u8>)>, StoreError> {
            Ok(self.items.lock().unwrap().iter().map(|(k, v)| (*k, v.clone())).collect())
        }
    }

    fn transient() -> SettlementError {
        SettlementError::Transient("HTTP 503".into())
    }

    #[test]
    fn queue_survives_reload() {
        let store = Arc::new(MemStore::default());
        let queue = ReconciliationQueue::load(store.clone()).unwrap();
        let ix = instruction();
        queue.enqueue(&ix, &transient(), 5, Timestamp::new(100)).unwrap();

        let reloaded = ReconciliationQueue::load(store).unwrap();
        let pending = reloaded.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].request_id, ix.request_id);
        assert_eq!(pending[0].attempts, 5);
        assert_eq!(pending[0].last_error, "transient settlement failure: HTTP 503");
    }

    #[test]
    fn re_enqueue_accumulates_attempts() {
        let queue = ReconciliationQueue::load(Arc::new(MemStore::default())).unwrap();
        let ix = instruction();
        queue.enqueue(&ix, &transient(), 5, Timestamp::new(100)).unwrap();
        let item = queue
            .enqueue(&ix, &SettlementError::Permanent("HTTP 422".into()), 1, Timestamp::new(200))
            .unwrap();

        assert_eq!(item.attempts, 6);
        assert_eq!(item.enqueued_at, Timestamp::new(100));
        assert_eq!(queue.pending(), vec![item]);
    }

    #[tokio::test]
    async fn worker_settles_and_keeps_history() {
        let store = Arc::new(MemStore::default());
        let queue = Arc::new(ReconciliationQueue::load(store.clone()).unwrap());
        let ix = instruction();
        queue.enqueue(&ix, &transient(), 5, Timestamp::new(100)).unwrap();

        let rail = FlakyRail::new(1, transient());
        let worker = ReconciliationWorker::new(queue.clone(), rail.clone(), Duration::from_secs(30));

        let first = worker.run_once().await;
        assert_eq!(first, ReconciliationPass { settled: 0, failed: 1 });
        assert_eq!(queue.pending_count(), 1);

        let second = worker.run_once().await;
        assert_eq!(second, ReconciliationPass { settled: 1, failed: 0 });
        assert_eq!(queue.pending_count(), 0);

        let item = ReconciliationQueue::load(store).unwrap().get(&ix.request_id).unwrap();
        assert_eq!(item.settled_tx_id, Some(format!("tx-{}", ix.request_id)));
        assert_eq!(item.attempts, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_stops_on_shutdown() {
        let queue = Arc::new(ReconciliationQueue::load(Arc::new(MemStore::default())).unwrap());
        queue.enqueue(&instruction(), &transient(), 5, Timestamp::new(1)).unwrap();
        let rail = FlakyRail::new(0, transient());
        let worker = ReconciliationWorker::new(queue.clone(), rail.clone(), Duration::from_secs(30));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.pending_count(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(rail.calls(), 1);
    }
}
