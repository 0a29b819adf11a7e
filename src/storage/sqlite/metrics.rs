//! Storage operation metrics.

use crate::Result;
use std::time::Instant;

/// Records operation metrics for a storage operation.
///
/// Emits `storage_operations_total` (counter) and
/// `storage_operation_duration_ms` (histogram), both labelled by backend,
/// operation and status.
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

/// Runs `call` and records its outcome under `operation`.
pub fn timed<T>(
    backend: &'static str,
    operation: &'static str,
    call: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let start = Instant::now();
    let result = call();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_timed_passes_result_through() {
        let ok = timed("sqlite", "test", || Ok(3));
        assert_eq!(ok.unwrap(), 3);

        let err: Result<()> = timed("sqlite", "test", || {
            Err(Error::NotFound("x".to_string()))
        });
        assert!(matches!(err, Err(Error::NotFound(_))));
    }
}
