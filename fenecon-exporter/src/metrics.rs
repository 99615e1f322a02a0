// FENECON Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Process-level metrics of the exporter itself.
//!
//! These live in the default registry and are served on `/metrics`. Device
//! gauges never end up here; each probe renders its own registry.

use fenecon_probe::ProbeReport;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_int_counter, CounterVec, Encoder,
    Histogram, IntCounter, TextEncoder,
};
use tracing::error;

lazy_static! {
    // ============================================================
    // Probe Metrics
    // ============================================================

    /// Probes served, by outcome.
    /// Values: success, partial, invalid, error
    pub static ref PROBES_TOTAL: CounterVec = register_counter_vec!(
        "fenecon_exporter_probes_total",
        "Total probes served by outcome",
        &["result"]
    ).unwrap();

    /// Wall-clock duration of completed probes.
    pub static ref PROBE_DURATION_SECONDS: Histogram = register_histogram!(
        "fenecon_exporter_probe_duration_seconds",
        "Duration of device probes in seconds",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Device queries that failed after all retries.
    pub static ref QUERY_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "fenecon_exporter_query_failures_total",
        "Total device queries that failed"
    ).unwrap();
}

/// Probe outcome categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Every query answered before the deadline
    Success,
    /// Some queries failed or the deadline fired
    Partial,
    /// Request rejected before probing
    Invalid,
    /// Probe could not be set up
    Error,
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Success => "success",
            ProbeOutcome::Partial => "partial",
            ProbeOutcome::Invalid => "invalid",
            ProbeOutcome::Error => "error",
        }
    }
}

impl From<&ProbeReport> for ProbeOutcome {
    fn from(report: &ProbeReport) -> Self {
        if report.failed == 0 && !report.deadline_exceeded {
            ProbeOutcome::Success
        } else {
            ProbeOutcome::Partial
        }
    }
}

/// Record a finished probe.
pub fn record_probe(report: &ProbeReport) {
    record_outcome(ProbeOutcome::from(report));
    PROBE_DURATION_SECONDS.observe(report.elapsed.as_secs_f64());
    QUERY_FAILURES_TOTAL.inc_by(report.failed as u64);
}

/// Increment the probe counter for an outcome.
pub fn record_outcome(outcome: ProbeOutcome) {
    PROBES_TOTAL.with_label_values(&[outcome.as_str()]).inc();
}

/// Encode all metrics of the default registry to Prometheus text format.
pub fn encode_metrics() -> String {
    encode_registry(&prometheus::gather())
}

/// Encode gathered metric families to Prometheus text format.
pub fn encode_registry(metric_families: &[prometheus::proto::MetricFamily]) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(metric_families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
