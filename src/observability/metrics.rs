//! Metrics for the VO query helpers.
//!
//! Recording goes through the `metrics` facade; without an installed recorder
//! every call is a no-op. The CLI installs a Prometheus recorder on request.

use std::fmt;
use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// All metric names used in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Request metrics
    RequestsAttempted,
    RequestsSuccess,
    RequestsTimeout,
    RequestsConnectError,
    RequestsRetried,
    RequestsExhausted,
    RequestDuration,
    PayloadBytes,

    // VOTABLE metrics
    VotableParsed,
    VotableParseError,
    VotableRows,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RequestsAttempted => "navo_requests_attempted_total",
            MetricName::RequestsSuccess => "navo_requests_success_total",
            MetricName::RequestsTimeout => "navo_requests_timeout_total",
            MetricName::RequestsConnectError => "navo_requests_connect_error_total",
            MetricName::RequestsRetried => "navo_requests_retried_total",
            MetricName::RequestsExhausted => "navo_requests_exhausted_total",
            MetricName::RequestDuration => "navo_request_duration_seconds",
            MetricName::PayloadBytes => "navo_payload_bytes",
            MetricName::VotableParsed => "navo_votable_parsed_total",
            MetricName::VotableParseError => "navo_votable_parse_error_total",
            MetricName::VotableRows => "navo_votable_rows",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        [
            MetricName::RequestsAttempted,
            MetricName::RequestsSuccess,
            MetricName::RequestsTimeout,
            MetricName::RequestsConnectError,
            MetricName::RequestsRetried,
            MetricName::RequestsExhausted,
            MetricName::RequestDuration,
            MetricName::PayloadBytes,
            MetricName::VotableParsed,
            MetricName::VotableParseError,
            MetricName::VotableRows,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics recorder installed");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod requests {
    use super::MetricName;

    pub fn attempted(service: &str) {
        ::metrics::counter!(MetricName::RequestsAttempted.as_str(), "service" => service.to_string())
            .increment(1);
    }

    pub fn success(service: &str) {
        ::metrics::counter!(MetricName::RequestsSuccess.as_str(), "service" => service.to_string())
            .increment(1);
    }

    pub fn timeout(service: &str) {
        ::metrics::counter!(MetricName::RequestsTimeout.as_str(), "service" => service.to_string())
            .increment(1);
    }

    pub fn connect_error(service: &str) {
        ::metrics::counter!(MetricName::RequestsConnectError.as_str(), "service" => service.to_string())
            .increment(1);
    }

    pub fn retried() {
        ::metrics::counter!(MetricName::RequestsRetried.as_str()).increment(1);
    }

    pub fn exhausted() {
        ::metrics::counter!(MetricName::RequestsExhausted.as_str()).increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::RequestDuration.as_str()).record(secs);
    }

    pub fn payload_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::PayloadBytes.as_str()).record(bytes as f64);
    }
}

pub mod votable {
    use super::MetricName;

    pub fn parsed(rows: usize) {
        ::metrics::counter!(MetricName::VotableParsed.as_str()).increment(1);
        ::metrics::histogram!(MetricName::VotableRows.as_str()).record(rows as f64);
    }

    pub fn parse_error() {
        ::metrics::counter!(MetricName::VotableParseError.as_str()).increment(1);
    }
}
