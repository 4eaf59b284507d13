//! Span constructors for engine operations, so traces share names and
//! field sets.

use proofmint_types::{RequestId, RequesterId};
use tracing::{info_span, Span};

/// The full lifecycle of one mint request.
pub fn issuance_span(request_id: &RequestId, requester: &RequesterId) -> Span {
    info_span!("issuance", request_id = %request_id, requester = %requester)
}

/// Settlement of a committed issuance.
pub fn settlement_span(request_id: &RequestId) -> Span {
    info_span!("settlement", request_id = %request_id)
}

/// Startup recovery of interrupted requests.
pub fn recovery_span() -> Span {
    info_span!("recovery")
}
