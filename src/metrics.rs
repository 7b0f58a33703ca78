/// Metrics and telemetry for Coffey
///
/// Prometheus-compatible metrics for monitoring:
/// - Record creation and dedup hits
/// - Enrichment provider failures
/// - Bookmark sync and retry-queue activity
/// - Background job execution
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Records created by kind
    pub static ref RECORDS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "records_created_total",
        "Total number of records created",
        &["kind"]
    )
    .unwrap();

    /// Duplicate submissions short-circuited by content hash
    pub static ref DEDUP_HITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "dedup_hits_total",
        "Total number of duplicate submissions detected by content hash",
        &["kind"]
    )
    .unwrap();

    /// Enrichment provider failures by category
    pub static ref PROVIDER_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "provider_failures_total",
        "Total number of enrichment provider failures",
        &["category"]
    )
    .unwrap();

    /// Bookmark queue messages by outcome
    pub static ref QUEUE_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "queue_messages_total",
        "Total number of bookmark queue messages processed",
        &["outcome"]
    )
    .unwrap();

    /// Explicit artifact retries scheduled
    pub static ref ARTIFACT_RETRIES_TOTAL: IntGauge = register_int_gauge!(
        "artifact_retries_total",
        "Number of artifact retries currently scheduled"
    )
    .unwrap();

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Record a created record
pub fn record_created(kind: &str) {
    RECORDS_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a dedup short-circuit
pub fn record_dedup_hit(kind: &str) {
    DEDUP_HITS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a provider failure
pub fn record_provider_failure(category: &str) {
    PROVIDER_FAILURES_TOTAL.with_label_values(&[category]).inc();
}

/// Record a processed queue message
pub fn record_queue_message(outcome: &str) {
    QUEUE_MESSAGES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_rendering() {
        record_created("chatter");
        record_dedup_hit("image");
        record_provider_failure("weather");
        record_queue_message("success");

        let metrics = render_metrics();
        assert!(metrics.contains("records_created_total"));
        assert!(metrics.contains("dedup_hits_total"));
        assert!(metrics.contains("provider_failures_total"));
        assert!(metrics.contains("queue_messages_total"));
    }
}
