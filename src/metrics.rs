//! Submission metrics
//!
//! Counters and histograms recorded through the `metrics` facade. The crate
//! installs no recorder; the embedding application picks one. Without a
//! recorder every call is a no-op.

pub const UPLOAD_ATTEMPTS: &str = "dte_dispatch_upload_attempts_total";
pub const TRANSIENT_FAILURES: &str = "dte_dispatch_upload_transient_failures_total";
pub const SUBMISSIONS: &str = "dte_dispatch_submissions_total";
pub const PAYLOAD_BYTES: &str = "dte_dispatch_payload_bytes";

/// Why an upload attempt will be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientReason {
    /// No response at all: connection, TLS or timeout failure.
    Transport,
    /// The service answered with an empty body.
    EmptyResponse,
    /// The service answered with its internal fault sentinel.
    InternalFault,
}

impl TransientReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientReason::Transport => "transport",
            TransientReason::EmptyResponse => "empty_response",
            TransientReason::InternalFault => "internal_fault",
        }
    }
}

pub struct SubmissionMetrics;

impl SubmissionMetrics {
    pub fn record_attempt() {
        ::metrics::counter!(UPLOAD_ATTEMPTS).increment(1);
    }

    pub fn record_transient_failure(reason: TransientReason) {
        ::metrics::counter!(TRANSIENT_FAILURES, "reason" => reason.as_str()).increment(1);
    }

    /// Size of the staged artifact, after compression when it applied.
    pub fn record_payload_size(bytes: usize) {
        ::metrics::histogram!(PAYLOAD_BYTES).record(bytes as f64);
    }

    /// Final outcome of one `submit` call: `accepted`, or the error kind.
    pub fn record_outcome(outcome: &'static str) {
        ::metrics::counter!(SUBMISSIONS, "outcome" => outcome).increment(1);
    }

    /// Touches every metric so exporters list them before first use.
    pub fn register_metrics() {
        let _ = ::metrics::counter!(UPLOAD_ATTEMPTS);
        let _ = ::metrics::counter!(TRANSIENT_FAILURES);
        let _ = ::metrics::counter!(SUBMISSIONS);
        let _ = ::metrics::histogram!(PAYLOAD_BYTES);
    }
}
