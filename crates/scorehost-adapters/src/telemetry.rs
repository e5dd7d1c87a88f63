//! Metric names and descriptions recorded by the harness
//!
//! No recorder is installed here; embedding applications pick the exporter.

/// Dispatched calls, labelled by adapter and operation
pub const CALLS_TOTAL: &str = "scorehost_calls_total";

/// Failed calls, labelled by adapter and error kind
pub const ERRORS_TOTAL: &str = "scorehost_errors_total";

/// Adapter invocation latency, labelled by adapter and operation
pub const CALL_LATENCY_US: &str = "scorehost_call_latency_us";

/// Adapter instances constructed, labelled by adapter
pub const ADAPTERS_LOADED_TOTAL: &str = "scorehost_adapters_loaded_total";

/// Register descriptions for every harness metric with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(CALLS_TOTAL, "Total number of dispatched adapter calls");
    metrics::describe_counter!(ERRORS_TOTAL, "Total number of failed adapter calls by kind");
    metrics::describe_histogram!(
        CALL_LATENCY_US,
        metrics::Unit::Microseconds,
        "Adapter invocation latency in microseconds by operation"
    );
    metrics::describe_counter!(
        ADAPTERS_LOADED_TOTAL,
        "Total number of adapter instances constructed"
    );
}
