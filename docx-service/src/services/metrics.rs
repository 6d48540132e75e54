//! Metrics collection and Prometheus export.
//!
//! Installs the global Prometheus recorder and names the service counters.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// `docx_compositions_total{variant, outcome}`
pub const COMPOSITIONS_TOTAL: &str = "docx_compositions_total";
/// `docx_documents_swept_total`
pub const DOCUMENTS_SWEPT_TOTAL: &str = "docx_documents_swept_total";

/// Install the Prometheus recorder.
///
/// Call before any metric is recorded. Later calls are no-ops, so test
/// harnesses that build several applications can call it freely.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            // Another recorder owns the global slot; keep a detached one so
            // rendering still works.
            tracing::warn!(error = %e, "Prometheus recorder already installed");
            PrometheusBuilder::new().build_recorder().handle()
        }
    });
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_composition(variant: &'static str, outcome: &'static str) {
    metrics::counter!(COMPOSITIONS_TOTAL, "variant" => variant, "outcome" => outcome).increment(1);
}

pub fn record_swept(count: usize) {
    metrics::counter!(DOCUMENTS_SWEPT_TOTAL).increment(count as u64);
}
