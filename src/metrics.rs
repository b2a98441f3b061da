// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the shoot cleanup engine.
//!
//! All metrics carry the namespace prefix `botanist_gardener_cloud_` and a `resource`
//! label holding the plural resource name (e.g. `pods`).
//!
//! # Metrics
//!
//! - **Clean attempts** - every delete + re-list attempt and its outcome
//! - **Forced finalizations** - objects whose finalizers were force-removed
//! - **Remaining objects** - objects seen by the most recent re-list
//! - **Cleanup duration** - wall time of a full retry driver run
//!
//! # Example
//!
//! ```rust,no_run
//! use botanist::metrics::{gather_metrics, record_clean_attempt};
//!
//! record_clean_attempt("pods", "remaining");
//! println!("{}", gather_metrics().unwrap());
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

/// Namespace prefix for all Botanist metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "botanist_gardener_cloud";

/// Attempt outcome: nothing matching the selector is left
pub const OUTCOME_CONVERGED: &str = "converged";

/// Attempt outcome: objects are still remaining
pub const OUTCOME_REMAINING: &str = "remaining";

/// Attempt outcome: a fatal API error occurred
pub const OUTCOME_ERROR: &str = "error";

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of clean attempts by resource and outcome
///
/// Labels:
/// - `resource`: Plural resource name
/// - `outcome`: `converged`, `remaining` or `error`
pub static CLEAN_ATTEMPTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_clean_attempts_total"),
        "Total number of cleanup attempts by resource and outcome",
    );
    let counter = CounterVec::new(opts, &["resource", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of objects whose finalizers were force-removed
///
/// Labels:
/// - `resource`: Plural resource name
pub static FORCED_FINALIZATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_forced_finalizations_total"),
        "Total number of objects finalized by force after the finalize window elapsed",
    );
    let counter = CounterVec::new(opts, &["resource"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Objects matching the cleanup selector after the latest attempt
///
/// Labels:
/// - `resource`: Plural resource name
pub static REMAINING_OBJECTS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_remaining_objects"),
        "Number of objects still matching the cleanup selector",
    );
    let gauge = GaugeVec::new(opts, &["resource"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Duration of a retry driver run in seconds
///
/// Labels:
/// - `resource`: Plural resource name
/// - `result`: `success` or `failure`
pub static CLEANUP_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_cleanup_duration_seconds"),
        "Duration of the cleanup of one resource kind in seconds",
    )
    .buckets(vec![
        1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
    ]);
    let histogram = HistogramVec::new(opts, &["resource", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Record one clean attempt
///
/// # Arguments
/// * `resource` - Plural resource name
/// * `outcome` - One of [`OUTCOME_CONVERGED`], [`OUTCOME_REMAINING`], [`OUTCOME_ERROR`]
pub fn record_clean_attempt(resource: &str, outcome: &str) {
    CLEAN_ATTEMPTS_TOTAL
        .with_label_values(&[resource, outcome])
        .inc();
}

/// Record the number of objects left after an attempt
///
/// # Arguments
/// * `resource` - Plural resource name
/// * `count` - Number of matching objects
#[allow(clippy::cast_precision_loss)]
pub fn set_remaining_objects(resource: &str, count: usize) {
    REMAINING_OBJECTS
        .with_label_values(&[resource])
        .set(count as f64);
}

/// Record one forced finalization
///
/// # Arguments
/// * `resource` - Plural resource name
pub fn record_forced_finalization(resource: &str) {
    FORCED_FINALIZATIONS_TOTAL
        .with_label_values(&[resource])
        .inc();
}

/// Record the duration of a finished retry driver run
///
/// # Arguments
/// * `resource` - Plural resource name
/// * `success` - Whether the run converged
/// * `duration` - Wall time of the run
pub fn record_cleanup_duration(resource: &str, success: bool, duration: Duration) {
    let result = if success { "success" } else { "failure" };
    CLEANUP_DURATION_SECONDS
        .with_label_values(&[resource, result])
        .observe(duration.as_secs_f64());
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
