//! Prometheus metrics for the worker.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder with an HTTP listener on `port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config(format!("Failed to install metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const CLIPS_PROCESSED_TOTAL: &str = "hclip_clips_processed_total";
    pub const ANALYSIS_EVENTS_TOTAL: &str = "hclip_analysis_events_total";
    pub const ANALYZER_FAILURES_TOTAL: &str = "hclip_analyzer_failures_total";
    pub const CLIP_ANALYSIS_SECONDS: &str = "hclip_clip_analysis_seconds";
    pub const COMPILATIONS_TOTAL: &str = "hclip_compilations_total";
    pub const HYPE_TRANSITIONS_TOTAL: &str = "hclip_hype_transitions_total";
}

/// Record a clip reaching a terminal outcome.
pub fn record_clip_processed(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::CLIPS_PROCESSED_TOTAL, &labels).increment(1);
}

/// Record an analysis event delivered to the correlator channel.
pub fn record_analysis_event(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::ANALYSIS_EVENTS_TOTAL, &labels).increment(1);
}

/// Record a dropped analyzer sample.
pub fn record_analyzer_failure(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::ANALYZER_FAILURES_TOTAL, &labels).increment(1);
}

/// Record how long event collection took for one clip.
pub fn record_analysis_duration(duration_secs: f64) {
    histogram!(names::CLIP_ANALYSIS_SECONDS).record(duration_secs);
}

/// Record a compilation attempt.
pub fn record_compilation(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::COMPILATIONS_TOTAL, &labels).increment(1);
}

/// Record a chat hype transition.
pub fn record_hype_transition(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::HYPE_TRANSITIONS_TOTAL, &labels).increment(1);
}
