//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use proofmint_settlement::BackoffPolicy;
use proofmint_types::IssuancePolicy;
use proofmint_utils::LogFormat;

use crate::EngineError;

/// Configuration for the issuance engine and its daemon.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Data directory for LMDB storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP API port.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to expose the Prometheus `/metrics` endpoint.
    #[serde(default)]
    pub enable_metrics: bool,

    /// Base URL of the compliance authority.
    #[serde(default = "default_compliance_url")]
    pub compliance_url: String,

    /// Base URL of the settlement rail.
    #[serde(default = "default_settlement_url")]
    pub settlement_url: String,

    /// Per-request deadline for the settlement rail (milliseconds).
    #[serde(default = "default_settlement_timeout_ms")]
    pub settlement_timeout_ms: u64,

    /// Base URL of the optional risk-signal service.
    #[serde(default)]
    pub signal_url: Option<String>,

    /// Base URL of the grading service for delegated (code, essay)
    /// questions. Without one those answers count as grading errors.
    #[serde(default)]
    pub grader_url: Option<String>,

    /// Seconds between reconciliation passes.
    #[serde(default = "default_reconciliation_interval_secs")]
    pub reconciliation_interval_secs: u64,

    /// Seconds between expired-challenge sweeps.
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,

    /// Whether `submitProof` waits for settlement before answering.
    #[serde(default = "default_true")]
    pub await_settlement: bool,

    /// Issuance policy.
    #[serde(default)]
    pub policy: IssuancePolicy,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./proofmint_data")
}

fn default_rpc_port() -> u16 {
    7380
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_compliance_url() -> String {
    "http://127.0.0.1:7381".to_string()
}

fn default_settlement_url() -> String {
    "http://127.0.0.1:7382".to_string()
}

fn default_settlement_timeout_ms() -> u64 {
    5_000
}

fn default_reconciliation_interval_secs() -> u64 {
    30
}

fn default_maintenance_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.policy
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        if self.reconciliation_interval_secs == 0 {
            return Err(EngineError::Config(
                "reconciliation_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Settlement retry schedule from the policy.
    pub fn backoff(&self) -> BackoffPolicy {
        backoff_from_policy(&self.policy)
    }

    pub fn settlement_timeout(&self) -> Duration {
        Duration::from_millis(self.settlement_timeout_ms)
    }

    pub fn reconciliation_interval(&self) -> Duration {
        Duration::from_secs(self.reconciliation_interval_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}

pub(crate) fn backoff_from_policy(policy: &IssuancePolicy) -> BackoffPolicy {
    BackoffPolicy::new(
        policy.mint_max_attempts,
        Duration::from_millis(policy.mint_backoff_base_ms),
        Duration::from_millis(policy.mint_backoff_max_ms),
    )
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rpc_port: default_rpc_port(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            enable_metrics: false,
            compliance_url: default_compliance_url(),
            settlement_url: default_settlement_url(),
            settlement_timeout_ms: default_settlement_timeout_ms(),
            signal_url: None,
            grader_url: None,
            reconciliation_interval_secs: default_reconciliation_interval_secs(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
            await_settlement: default_true(),
            policy: IssuancePolicy::standard(),
        }
    }
}
