//! Prometheus metrics for the issuance engine.
//!
//! [`EngineMetrics`] owns a dedicated [`Registry`] that the HTTP `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_gauge_with_registry, register_histogram_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Gauge, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use proofmint_types::{RequestState, TokenAmount};

pub struct EngineMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Requests reaching each terminal state.
    pub requests_total: IntCounterVec,
    /// Tokens committed by the supply ledger.
    pub tokens_minted_total: IntCounter,
    /// Settlement attempts beyond the first.
    pub settlement_retries_total: IntCounter,
    /// Compliance checks that failed closed (timeout, transport, bad reply).
    pub compliance_failures_total: IntCounter,
    pub audit_failures_total: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub total_minted: IntGauge,
    pub issuance_rate: Gauge,
    /// Issuances waiting in the reconciliation queue.
    pub reconciliation_depth: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from receipt to the reported outcome, in seconds.
    pub request_latency_seconds: Histogram,
}

impl EngineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = register_int_counter_vec_with_registry!(
            Opts::new("proofmint_requests_total", "Mint requests by terminal state"),
            &["state"],
            registry
        )
        .expect("failed to register requests_total counter");

        let tokens_minted_total = register_int_counter_with_registry!(
            Opts::new(
                "proofmint_tokens_minted_total",
                "Tokens committed by the supply ledger"
            ),
            registry
        )
        .expect("failed to register tokens_minted_total counter");

        let settlement_retries_total = register_int_counter_with_registry!(
            Opts::new(
                "proofmint_settlement_retries_total",
                "Settlement attempts beyond the first"
            ),
            registry
        )
        .expect("failed to register settlement_retries_total counter");

        let compliance_failures_total = register_int_counter_with_registry!(
            Opts::new(
                "proofmint_compliance_failures_total",
                "Compliance checks that failed closed"
            ),
            registry
        )
        .expect("failed to register compliance_failures_total counter");

        let audit_failures_total = register_int_counter_with_registry!(
            Opts::new("proofmint_audit_failures_total", "Failed audit writes"),
            registry
        )
        .expect("failed to register audit_failures_total counter");

        let total_minted = register_int_gauge_with_registry!(
            Opts::new("proofmint_total_minted", "Current total minted supply"),
            registry
        )
        .expect("failed to register total_minted gauge");

        let issuance_rate = register_gauge_with_registry!(
            Opts::new("proofmint_issuance_rate", "Current issuance rate"),
            registry
        )
        .expect("failed to register issuance_rate gauge");

        let reconciliation_depth = register_int_gauge_with_registry!(
            Opts::new(
                "proofmint_reconciliation_depth",
                "Issuances waiting for settlement reconciliation"
            ),
            registry
        )
        .expect("failed to register reconciliation_depth gauge");

        let request_latency_seconds = register_histogram_with_registry!(
            HistogramOpts::new(
                "proofmint_request_latency_seconds",
                "Time from receipt to reported outcome"
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            registry
        )
        .expect("failed to register request_latency_seconds histogram");

        Self {
            registry,
            requests_total,
            tokens_minted_total,
            settlement_retries_total,
            compliance_failures_total,
            audit_failures_total,
            total_minted,
            issuance_rate,
            reconciliation_depth,
            request_latency_seconds,
        }
    }

    pub fn record_terminal(&self, state: RequestState) {
        self.requests_total.with_label_values(&[state.code()]).inc();
    }

    pub fn record_minted(&self, amount: TokenAmount, total: TokenAmount, rate: f64) {
        self.tokens_minted_total
            .inc_by(u64::try_from(amount.raw()).unwrap_or(u64::MAX));
        self.total_minted
            .set(i64::try_from(total.raw()).unwrap_or(i64::MAX));
        self.issuance_rate.set(rate);
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
