//! The fail-closed gate with its approval cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use proofmint_types::{ComplianceStatus, RequesterId};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::authority::ComplianceAuthority;
use crate::error::ComplianceError;

/// Verdict used by the orchestrator. Anything but `Approved` halts issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceVerdict {
    pub status: ComplianceStatus,
    pub log_id: Option<String>,
    /// Served from the approval cache without calling the authority.
    pub from_cache: bool,
    /// Why the gate failed closed, when it did.
    pub failure: Option<String>,
}

impl ComplianceVerdict {
    fn failed(err: &ComplianceError) -> Self {
        Self {
            status: ComplianceStatus::Error,
            log_id: None,
            from_cache: false,
            failure: Some(err.to_string()),
        }
    }

    pub fn permits_issuance(&self) -> bool {
        self.status.permits_issuance()
    }
}

struct CachedApproval {
    log_id: Option<String>,
    expires_at: Instant,
}

pub struct ComplianceGate {
    authority: Arc<dyn ComplianceAuthority>,
    timeout: Duration,
    cache_ttl: Duration,
    approvals: Mutex<HashMap<RequesterId, CachedApproval>>,
}

impl ComplianceGate {
    /// A zero `cache_ttl` disables caching.
    pub fn new(authority: Arc<dyn ComplianceAuthority>, timeout: Duration, cache_ttl: Duration) -> Self {
        Self {
            authority,
            timeout,
            cache_ttl,
            approvals: Mutex::new(HashMap::new()),
        }
    }

    /// Ask the authority about a requester. Never errors: failures come back
    /// as a verdict with status `Error`.
    pub async fn check(&self, requester: &RequesterId) -> ComplianceVerdict {
        if let Some(log_id) = self.cached(requester) {
            tracing::debug!(requester = %requester, "compliance approval served from cache");
            return ComplianceVerdict {
                status: ComplianceStatus::Approved,
                log_id,
                from_cache: true,
                failure: None,
            };
        }

        let result = match tokio::time::timeout(self.timeout, self.authority.check(requester)).await {
            Ok(result) => result,
            Err(_) => Err(ComplianceError::Timeout(self.timeout.as_millis() as u64)),
        };

        match result {
            Ok(response) => {
                if response.status == ComplianceStatus::Approved && !self.cache_ttl.is_zero() {
                    self.lock().insert(
                        requester.clone(),
                        CachedApproval {
                            log_id: response.log_id.clone(),
                            expires_at: Instant::now() + self.cache_ttl,
                        },
                    );
                }
                if response.status != ComplianceStatus::Approved {
                    tracing::info!(requester = %requester, status = ?response.status, "compliance did not approve");
                }
                ComplianceVerdict {
                    status: response.status,
                    log_id: response.log_id,
                    from_cache: false,
                    failure: None,
                }
            }
            Err(e) => {
                tracing::warn!(requester = %requester, error = %e, "compliance check failed, failing closed");
                ComplianceVerdict::failed(&e)
            }
        }
    }

    fn cached(&self, requester: &RequesterId) -> Option<Option<String>> {
        let mut cache = self.lock();
        match cache.get(requester) {
            Some(approval) if approval.expires_at > Instant::now() => Some(approval.log_id.clone()),
            Some(_) => {
                cache.remove(requester);
                None
            }
            None => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequesterId, CachedApproval>> {
        self.approvals.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
