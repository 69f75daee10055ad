//! Firestore and AI cache metrics.

use metrics::{counter, histogram};

/// Metric name constants.
pub mod names {
    /// Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";

    /// Retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "firestore_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";

    /// Documents deleted through batch writes, by collection.
    pub const DOCUMENTS_DELETED_TOTAL: &str = "firestore_documents_deleted_total";

    /// AI cache lookups that returned a live entry.
    pub const AI_CACHE_HITS_TOTAL: &str = "ai_cache_hits_total";

    /// AI cache lookups that found nothing usable.
    pub const AI_CACHE_MISSES_TOTAL: &str = "ai_cache_misses_total";

    /// AI cache operations that failed and were swallowed.
    pub const AI_CACHE_ERRORS_TOTAL: &str = "ai_cache_errors_total";
}

/// Record a completed Firestore request.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(names::LATENCY_SECONDS, "operation" => operation.to_string())
        .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(names::RETRIES_TOTAL, "operation" => operation.to_string()).increment(1);
}

pub fn record_deleted(collection: &str, count: usize) {
    counter!(names::DOCUMENTS_DELETED_TOTAL, "collection" => collection.to_string())
        .increment(count as u64);
}

/// Outcome of an AI cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    Expired,
    Error,
}

pub fn record_cache_lookup(endpoint: &str, outcome: CacheLookup) {
    let endpoint = endpoint.to_string();
    match outcome {
        CacheLookup::Hit => counter!(names::AI_CACHE_HITS_TOTAL, "endpoint" => endpoint).increment(1),
        CacheLookup::Miss => counter!(
            names::AI_CACHE_MISSES_TOTAL,
            "endpoint" => endpoint,
            "reason" => "absent"
        )
        .increment(1),
        CacheLookup::Expired => counter!(
            names::AI_CACHE_MISSES_TOTAL,
            "endpoint" => endpoint,
            "reason" => "expired"
        )
        .increment(1),
        CacheLookup::Error => {
            counter!(names::AI_CACHE_ERRORS_TOTAL, "endpoint" => endpoint.clone(), "op" => "get")
                .increment(1);
            counter!(
                names::AI_CACHE_MISSES_TOTAL,
                "endpoint" => endpoint,
                "reason" => "error"
            )
            .increment(1);
        }
    }
}

/// Record a swallowed cache write/invalidate failure.
pub fn record_cache_write_error(endpoint: &str, op: &'static str) {
    counter!(names::AI_CACHE_ERRORS_TOTAL, "endpoint" => endpoint.to_string(), "op" => op)
        .increment(1);
}
