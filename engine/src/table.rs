//! In-flight request slots.
//!
//! The first submission of a key claims a slot and runs the pipeline; later
//! submissions of the same key subscribe to the slot and receive the same
//! result. A slot lives until its final result is published.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use proofmint_types::{RequestId, RequestState};
use tokio::sync::watch;

use crate::error::EngineError;
use crate::request::{MintRequestRecord, MintRequestStatus};

pub(crate) type SlotResult = Result<MintRequestStatus, EngineError>;

struct Progress {
    state: RequestState,
    cancel_requested: bool,
}

pub(crate) struct Slot {
    result_tx: watch::Sender<Option<SlotResult>>,
    cancel_tx: watch::Sender<bool>,
    progress: Mutex<Progress>,
}

impl Slot {
    fn new() -> Self {
        let (result_tx, _) = watch::channel(None);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            result_tx,
            cancel_tx,
            progress: Mutex::new(Progress {
                state: RequestState::Received,
                cancel_requested: false,
            }),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<SlotResult>> {
        self.result_tx.subscribe()
    }

    /// Publish a result without retiring the slot (early `MINTING` reply).
    pub(crate) fn publish(&self, result: SlotResult) {
        self.result_tx.send_replace(Some(result));
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> RequestState {
        self.lock().state
    }

    /// Move to `next` unless a cancellation is pending while the request is
    /// still cancellable. Returns `false` in that case and leaves the state.
    pub(crate) fn enter(&self, next: RequestState) -> bool {
        let mut progress = self.lock();
        if progress.cancel_requested && progress.state.is_cancellable() {
            return false;
        }
        progress.state = next;
        true
    }

    pub(crate) fn set_state(&self, state: RequestState) {
        self.lock().state = state;
    }

    /// Ask the pipeline to stop. Fails with the current state once the
    /// request has reached the ledger.
    pub(crate) fn request_cancel(&self) -> Result<(), RequestState> {
        let mut progress = self.lock();
        if !progress.state.is_cancellable() {
            return Err(progress.state);
        }
        progress.cancel_requested = true;
        drop(progress);
        self.cancel_tx.send_replace(true);
        Ok(())
    }

    /// Resolves once cancellation is requested; never resolves otherwise.
    pub(crate) async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        if rx.wait_for(|c| *c).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Wait for a slot's published result.
pub(crate) async fn wait_for_result(mut rx: watch::Receiver<Option<SlotResult>>) -> SlotResult {
    match rx.wait_for(|r| r.is_some()).await {
        Ok(result) => result.clone().unwrap_or(Err(EngineError::Interrupted)),
        Err(_) => Err(EngineError::Interrupted),
    }
}

pub(crate) enum Claim {
    /// First submission: run the pipeline and publish into this slot.
    Leader(Arc<Slot>),
    /// The key is in flight; wait on the leader's result.
    Follower(watch::Receiver<Option<SlotResult>>),
    /// The key was seen before and is no longer in flight.
    Existing(MintRequestRecord),
}

#[derive(Default)]
pub(crate) struct RequestTable {
    slots: Mutex<HashMap<RequestId, Arc<Slot>>>,
}

impl RequestTable {
    /// Claim a key. `lookup` reads the persisted record and runs under the
    /// table lock, so two first submissions can't both lead.
    pub(crate) fn claim(
        &self,
        id: RequestId,
        lookup: impl FnOnce() -> Result<Option<MintRequestRecord>, EngineError>,
    ) -> Result<Claim, EngineError> {
        let mut slots = self.lock();
        if let Some(slot) = slots.get(&id) {
            return Ok(Claim::Follower(slot.subscribe()));
        }
        if let Some(record) = lookup()? {
            return Ok(Claim::Existing(record));
        }
        let slot = Arc::new(Slot::new());
        slots.insert(id, slot.clone());
        Ok(Claim::Leader(slot))
    }

    pub(crate) fn get(&self, id: &RequestId) -> Option<Arc<Slot>> {
        self.lock().get(id).cloned()
    }

    pub(crate) fn contains(&self, id: &RequestId) -> bool {
        self.lock().contains_key(id)
    }

    /// Guard that retires the slot when the pipeline ends, however it ends.
    pub(crate) fn guard(&self, id: RequestId, slot: Arc<Slot>) -> SlotGuard<'_> {
        SlotGuard {
            table: self,
            id,
            slot,
            done: false,
        }
    }

    fn retire(&self, id: &RequestId, slot: &Slot, result: SlotResult) {
        let mut slots = self.lock();
        slot.publish(result);
        slots.remove(id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) struct SlotGuard<'a> {
    table: &'a RequestTable,
    id: RequestId,
    slot: Arc<Slot>,
    done: bool,
}

impl SlotGuard<'_> {
    pub(crate) fn slot(&self) -> &Slot {
        &self.slot
    }

    pub(crate) fn complete(mut self, result: SlotResult) {
        self.done = true;
        self.table.retire(&self.id, &self.slot, result);
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::error!(request_id = %self.id, "request pipeline ended without a result");
            self.table.retire(&self.id, &self.slot, Err(EngineError::Interrupted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(table: &RequestTable, id: RequestId) -> Arc<Slot> {
        match table.claim(id, || Ok(None)).unwrap() {
            Claim::Leader(slot) => slot,
            _ => panic!("first claim must lead"),
        }
    }

    #[tokio::test]
    async fn followers_share_the_leaders_result() {
        let table = RequestTable::default();
        let id = RequestId::random();
        let slot = leader(&table, id);
        let Claim::Follower(rx) = table.claim(id, || Ok(None)).unwrap() else {
            panic!("second claim must follow");
        };

        table.guard(id, slot).complete(Err(EngineError::UnknownRequest(id)));
        assert!(matches!(wait_for_result(rx).await, Err(EngineError::UnknownRequest(_))));
        assert!(!table.contains(&id));
    }

    #[tokio::test]
    async fn abandoned_guard_reports_interruption() {
        let table = RequestTable::default();
        let id = RequestId::random();
        let slot = leader(&table, id);
        let rx = slot.subscribe();
        drop(table.guard(id, slot));
        assert!(matches!(wait_for_result(rx).await, Err(EngineError::Interrupted)));
        assert!(!table.contains(&id));
    }

    #[test]
    fn cancellation_is_refused_once_the_ledger_is_reached() {
        let slot = Slot::new();
        assert!(slot.enter(RequestState::Calculating));
        assert!(slot.enter(RequestState::LedgerCheck));
        assert_eq!(slot.request_cancel(), Err(RequestState::LedgerCheck));
    }

    #[test]
    fn pending_cancellation_blocks_the_next_stage() {
        let slot = Slot::new();
        assert!(slot.enter(RequestState::ComplianceCheck));
        slot.request_cancel().unwrap();
        assert!(!slot.enter(RequestState::Calculating));
        assert_eq!(slot.state(), RequestState::ComplianceCheck);
    }

    #[tokio::test]
    async fn cancellation_wakes_waiters() {
        let slot = Arc::new(Slot::new());
        let waiter = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.cancelled().await })
        };
        slot.request_cancel().unwrap();
        waiter.await.unwrap();
    }
}
