//! Storage operation metrics.
//!
//! Metrics go through the `metrics` facade. The library installs no
//! recorder; without one every call here is a no-op.

use std::time::Instant;

/// Records one completed Record Store operation.
///
/// Emits `storage_operations_total` (counter) and
/// `storage_operation_duration_ms` (histogram), both labelled with
/// `backend`, `operation` and `status`.
///
/// # Arguments
///
/// * `backend` - Backend name ("sqlite", "postgresql")
/// * `operation` - Operation name (e.g. "create", "search")
/// * `start` - Operation start time from `Instant::now()`
/// * `status` - "success", "rejected" (precondition failure) or "error"
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_operation_metrics("sqlite", "count", Instant::now(), "success");
        record_operation_metrics("sqlite", "create", Instant::now(), "rejected");
    }
}
