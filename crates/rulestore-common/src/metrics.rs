//! Metrics for adapter and storage operations
//!
//! Recorded through the `metrics` facade; the embedding process decides which
//! recorder (if any) to install.

use std::time::Instant;

use metrics::{counter, histogram};

// ============================================================================
// Rule Metrics
// ============================================================================

/// Record rows decoded into the policy model
pub fn record_rules_loaded(count: u64) {
    counter!("rulestore_rules_loaded_total").increment(count);
}

/// Record rows written to the store
pub fn record_rules_written(count: u64) {
    counter!("rulestore_rules_written_total").increment(count);
}

/// Record rows removed from the store
pub fn record_rules_deleted(count: u64) {
    counter!("rulestore_rules_deleted_total").increment(count);
}

/// Record a stored row whose trailing fields were dropped on decode
pub fn record_truncated_decode(ptype: &str) {
    counter!("rulestore_truncated_decodes_total", "ptype" => ptype.to_string()).increment(1);
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Record a store request outcome
pub fn record_request(operation: &'static str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("rulestore_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a store request that hit its deadline
pub fn record_timeout(operation: &'static str) {
    counter!("rulestore_request_timeouts_total", "operation" => operation).increment(1);
}

/// Timer guard recording request latency when dropped
pub struct LatencyTimer {
    start: Instant,
    operation: &'static str,
}

impl LatencyTimer {
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!("rulestore_request_duration_ms", "operation" => self.operation)
            .record(self.elapsed_ms());
    }
}
