//! The supply ledger: capped, halving issuance behind one lock.

use std::sync::{Arc, Mutex, MutexGuard};

use proofmint_crypto::transaction_id;
use proofmint_store::SupplyStore;
use proofmint_types::{IssuancePolicy, IssuanceRate, RequestId, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};

use crate::error::SupplyError;
use crate::state::{MintTransaction, SupplyState, SupplyStats};

/// An amount to issue, priced by the caller at `priced_at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IssueRequest {
    pub request_id: RequestId,
    pub amount: TokenAmount,
    pub priced_at: IssuanceRate,
    pub timestamp: Timestamp,
}

/// Why the ledger refused an issuance. Nothing was mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Rejection {
    /// The amount would take the total past the cap.
    SupplyExceeded { requested: TokenAmount, remaining: TokenAmount },
    /// A halving landed between pricing and commit; re-price and retry.
    RateChanged { priced_at: IssuanceRate, current: IssuanceRate },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssueOutcome {
    Accepted {
        transaction: MintTransaction,
        /// Rate in force for the next issuance.
        new_rate: IssuanceRate,
        /// The request id was already journaled; this is the original
        /// transaction and nothing was incremented.
        replayed: bool,
    },
    Rejected {
        rejection: Rejection,
        state: SupplyState,
    },
}

impl IssueOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn transaction(&self) -> Option<&MintTransaction> {
        match self {
            Self::Accepted { transaction, .. } => Some(transaction),
            Self::Rejected { .. } => None,
        }
    }
}

/// The single serialization point for supply mutation.
///
/// Every accepted issuance is written to the store (new state plus journal
/// record, atomically) before the in-memory state changes, so a failed write
/// leaves both untouched.
pub struct SupplyLedger {
    store: Arc<dyn SupplyStore>,
    state: Mutex<SupplyState>,
}

impl SupplyLedger {
    /// Load the persisted state, or start from the policy's genesis state.
    pub fn open(store: Arc<dyn SupplyStore>, policy: &IssuancePolicy) -> Result<Self, SupplyError> {
        let state = match store.load_supply_state()? {
            Some(bytes) => {
                let state = SupplyState::decode(&bytes)?;
                if state.max_supply.raw() != policy.max_supply as u128
                    || state.halving_interval != policy.halving_interval
                {
                    tracing::warn!(
                        persisted_max = %state.max_supply,
                        persisted_interval = state.halving_interval,
                        "persisted supply parameters differ from policy, keeping persisted"
                    );
                }
                tracing::info!(
                    total_minted = %state.total_minted,
                    events = state.issuance_events_count,
                    rate = %state.current_issuance_rate,
                    "loaded supply state"
                );
                state
            }
            None => SupplyState::genesis(policy),
        };
        Ok(Self {
            store,
            state: Mutex::new(state),
        })
    }

    /// Atomically check the cap and commit.
    ///
    /// At most one concurrent caller can observe room under the cap and
    /// commit; the others see the updated state.
    pub fn try_issue(&self, request: IssueRequest) -> Result<IssueOutcome, SupplyError> {
        if request.amount.is_zero() {
            return Err(SupplyError::ZeroAmount);
        }

        let mut state = self.lock();

        if let Some(bytes) = self.store.get_issuance(&request.request_id)? {
            let transaction = MintTransaction::decode(&bytes)?;
            tracing::debug!(request_id = %request.request_id, "issuance already journaled");
            return Ok(IssueOutcome::Accepted {
                transaction,
                new_rate: state.current_issuance_rate,
                replayed: true,
            });
        }

        if request.priced_at != state.current_issuance_rate {
            return Ok(IssueOutcome::Rejected {
                rejection: Rejection::RateChanged {
                    priced_at: request.priced_at,
                    current: state.current_issuance_rate,
                },
                state: state.clone(),
            });
        }

        let new_total = state
            .total_minted
            .checked_add(request.amount)
            .ok_or(SupplyError::Overflow)?;
        if new_total > state.max_supply {
            tracing::info!(
                request_id = %request.request_id,
                requested = %request.amount,
                remaining = %state.remaining(),
                "issuance would exceed supply cap"
            );
            return Ok(IssueOutcome::Rejected {
                rejection: Rejection::SupplyExceeded {
                    requested: request.amount,
                    remaining: state.remaining(),
                },
                state: state.clone(),
            });
        }

        let mut next = state.clone();
        next.total_minted = new_total;
        next.issuance_events_count += 1;
        if next.issuance_events_count % next.halving_interval.max(1) == 0 {
            next.current_issuance_rate = next.current_issuance_rate.halved();
            tracing::info!(
                events = next.issuance_events_count,
                rate = %next.current_issuance_rate,
                "issuance rate halved"
            );
        }

        let transaction = MintTransaction {
            hash: transaction_id(&request.request_id, request.amount, new_total),
            request_id: request.request_id,
            amount: request.amount,
            new_total_supply: new_total,
            event_index: next.issuance_events_count,
            rate: request.priced_at,
            timestamp: request.timestamp,
        };

        self.store
            .commit_issuance(&request.request_id, &next.encode()?, &transaction.encode()?)?;
        *state = next;

        Ok(IssueOutcome::Accepted {
            transaction,
            new_rate: state.current_issuance_rate,
            replayed: false,
        })
    }

    /// The journaled transaction for a request, if it was issued.
    pub fn transaction(&self, request_id: &RequestId) -> Result<Option<MintTransaction>, SupplyError> {
        match self.store.get_issuance(request_id)? {
            Some(bytes) => Ok(Some(MintTransaction::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn snapshot(&self) -> SupplyState {
        self.lock().clone()
    }

    pub fn current_rate(&self) -> IssuanceRate {
        self.lock().current_issuance_rate
    }

    pub fn stats(&self) -> SupplyStats {
        SupplyStats::from(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, SupplyState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
