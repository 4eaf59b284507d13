//! Lifecycle and verdict enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a mint request.
///
/// ```text
/// RECEIVED → VERIFYING → SCREENING → COMPLIANCE_CHECK → CALCULATING
///          → LEDGER_CHECK → MINTING → CONFIRMED
/// ```
/// Terminal failure exits: `BLOCKED`, `REJECTED`, `SUPPLY_EXCEEDED`,
/// `MINT_FAILED`, `FAILED`, `CANCELLED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Received,
    Verifying,
    Screening,
    ComplianceCheck,
    Calculating,
    LedgerCheck,
    Minting,
    Confirmed,
    Blocked,
    Rejected,
    SupplyExceeded,
    MintFailed,
    Failed,
    Cancelled,
}

impl RequestState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed
                | Self::Blocked
                | Self::Rejected
                | Self::SupplyExceeded
                | Self::MintFailed
                | Self::Failed
                | Self::Cancelled
        )
    }

    /// Cancellation is only possible before the ledger is touched.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            Self::Received
                | Self::Verifying
                | Self::Screening
                | Self::ComplianceCheck
                | Self::Calculating
        )
    }

    /// Whether the supply ledger may already have committed for this request.
    pub fn is_post_commit(&self) -> bool {
        matches!(self, Self::Minting | Self::Confirmed | Self::MintFailed)
    }

    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        if self.is_cancellable() && matches!(next, Cancelled | Failed) {
            return true;
        }
        matches!(
            (self, next),
            (Received, Verifying)
                | (Verifying, Screening)
                | (Screening, ComplianceCheck)
                | (Screening, Blocked)
                | (ComplianceCheck, Calculating)
                | (ComplianceCheck, Rejected)
                | (Calculating, LedgerCheck)
                | (LedgerCheck, Minting)
                | (LedgerCheck, SupplyExceeded)
                | (LedgerCheck, Failed)
                | (LedgerCheck, MintFailed)
                | (Minting, Confirmed)
                | (Minting, MintFailed)
        )
    }

    /// Stable status code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Verifying => "VERIFYING",
            Self::Screening => "SCREENING",
            Self::ComplianceCheck => "COMPLIANCE_CHECK",
            Self::Calculating => "CALCULATING",
            Self::LedgerCheck => "LEDGER_CHECK",
            Self::Minting => "MINTING",
            Self::Confirmed => "CONFIRMED",
            Self::Blocked => "BLOCKED",
            Self::Rejected => "REJECTED",
            Self::SupplyExceeded => "SUPPLY_EXCEEDED",
            Self::MintFailed => "MINT_FAILED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Audit status recorded for a terminal state.
    pub fn audit_status(&self) -> Option<AuditStatus> {
        match self {
            Self::Confirmed => Some(AuditStatus::Success),
            Self::Blocked => Some(AuditStatus::Blocked),
            s if s.is_terminal() => Some(AuditStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Verdict from the compliance authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceStatus {
    Approved,
    Pending,
    Rejected,
    Error,
}

impl ComplianceStatus {
    /// Only an explicit approval permits issuance.
    pub fn permits_issuance(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Action decided by the anti-gaming screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreeningAction {
    Allow,
    Flag,
    Block,
}

/// Outcome class recorded in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Blocked,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        use RequestState::*;
        let path = [
            Received,
            Verifying,
            Screening,
            ComplianceCheck,
            Calculating,
            LedgerCheck,
            Minting,
            Confirmed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn cancellation_stops_at_ledger_check() {
        assert!(RequestState::Calculating.can_transition_to(RequestState::Cancelled));
        assert!(!RequestState::LedgerCheck.can_transition_to(RequestState::Cancelled));
        assert!(!RequestState::Minting.can_transition_to(RequestState::Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use RequestState::*;
        for terminal in [Confirmed, Blocked, Rejected, SupplyExceeded, MintFailed, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Failed));
            assert!(terminal.audit_status().is_some());
        }
    }

    #[test]
    fn status_codes_match_serde_names() {
        let json = serde_json_like(RequestState::ComplianceCheck);
        assert_eq!(json, RequestState::ComplianceCheck.code());
    }

    fn serde_json_like(state: RequestState) -> String {
        #[derive(Serialize)]
        struct Wrap {
            s: RequestState,
        }
        let out = toml::to_string(&Wrap { s: state }).unwrap();
        out.trim()
            .trim_start_matches("s = ")
            .trim_matches('"')
            .to_string()
    }
}
