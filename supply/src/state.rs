//! Supply state and the mint transaction journal record.

use proofmint_store::StoreError;
use proofmint_types::{Hash256, IssuancePolicy, IssuanceRate, RequestId, Timestamp, TokenAmount};
use serde::{Deserialize, Serialize};

/// The singleton supply state. Only [`crate::SupplyLedger`] mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyState {
    pub total_minted: TokenAmount,
    pub max_supply: TokenAmount,
    pub current_issuance_rate: IssuanceRate,
    /// Accepted issuances so far.
    pub issuance_events_count: u64,
    pub halving_interval: u64,
}

impl SupplyState {
    /// Genesis state for a fresh ledger.
    pub fn genesis(policy: &IssuancePolicy) -> Self {
        Self {
            total_minted: TokenAmount::ZERO,
            max_supply: TokenAmount::new(policy.max_supply as u128),
            current_issuance_rate: IssuanceRate::new(policy.initial_rate_bps),
            issuance_events_count: 0,
            halving_interval: policy.halving_interval.max(1),
        }
    }

    pub fn remaining(&self) -> TokenAmount {
        self.max_supply.saturating_sub(self.total_minted)
    }

    /// Accepted issuances left before the next halving.
    pub fn events_until_halving(&self) -> u64 {
        let interval = self.halving_interval.max(1);
        interval - self.issuance_events_count % interval
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Journal record of one accepted issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTransaction {
    /// Domain-separated hash of `(request_id, amount, new_total_supply)`;
    /// doubles as the transaction id.
    pub hash: Hash256,
    pub request_id: RequestId,
    pub amount: TokenAmount,
    pub new_total_supply: TokenAmount,
    /// 1-based index of this issuance among all accepted issuances.
    pub event_index: u64,
    /// Rate the amount was priced at.
    pub rate: IssuanceRate,
    pub timestamp: Timestamp,
}

impl MintTransaction {
    pub fn id(&self) -> Hash256 {
        self.hash
    }

    pub(crate) fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

/// Read-only view for operators and the status API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyStats {
    pub total_minted: TokenAmount,
    pub max_supply: TokenAmount,
    pub remaining: TokenAmount,
    pub issuance_rate: IssuanceRate,
    /// Rate as a decimal, for display.
    pub issuance_rate_value: f64,
    pub issuance_events_count: u64,
    pub halving_interval: u64,
    pub events_until_halving: u64,
}

impl From<&SupplyState> for SupplyStats {
    fn from(state: &SupplyState) -> Self {
        Self {
            total_minted: state.total_minted,
            max_supply: state.max_supply,
            remaining: state.remaining(),
            issuance_rate: state.current_issuance_rate,
            issuance_rate_value: state.current_issuance_rate.as_f64(),
            issuance_events_count: state.issuance_events_count,
            halving_interval: state.halving_interval,
            events_until_halving: state.events_until_halving(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_follows_policy() {
        let mut policy = IssuancePolicy::standard();
        policy.max_supply = 1_000;
        policy.halving_interval = 4;
        let state = SupplyState::genesis(&policy);

        assert_eq!(state.remaining(), TokenAmount::new(1_000));
        assert_eq!(state.events_until_halving(), 4);
        assert_eq!(SupplyState::decode(&state.encode().unwrap()).unwrap(), state);
    }

    #[test]
    fn events_until_halving_wraps() {
        let state = SupplyState {
            total_minted: TokenAmount::ZERO,
            max_supply: TokenAmount::new(10),
            current_issuance_rate: IssuanceRate::new(10_000),
            issuance_events_count: 8,
            halving_interval: 4,
        };
        assert_eq!(state.events_until_halving(), 4);
    }
}
