//! Prometheus metrics for sales-invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// HTTP request counter by method, matched route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_invoicing_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register http_requests_total")
});

pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sales_invoicing_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register http_request_duration")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sales_invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Derived invoice status changes, labelled with the new status.
pub static INVOICE_STATUS_TRANSITIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_invoicing_invoice_status_transitions_total",
        "Invoice status changes by resulting status",
        &["status"] // Pending, Partial, Paid, Past Due
    )
    .expect("Failed to register invoice_status_transitions")
});

pub static PAYMENTS_LOGGED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_invoicing_payments_logged_total",
        "Total number of payments logged by payment method",
        &["payment_method"]
    )
    .expect("Failed to register payments_logged_total")
});

pub static PIPELINE_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_invoicing_pipeline_transitions_total",
        "Manual pipeline stage changes by target stage",
        &["stage"]
    )
    .expect("Failed to register pipeline_transitions_total")
});

pub static PIPELINE_ESCALATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_invoicing_pipeline_escalations_total",
        "Payment issue escalations raised",
        &["trigger"]
    )
    .expect("Failed to register pipeline_escalations_total")
});

/// Failed calls to the audit and notification collaborators.
pub static COLLABORATOR_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_invoicing_collaborator_failures_total",
        "Failed audit or notification dispatches",
        &["collaborator"]
    )
    .expect("Failed to register collaborator_failures_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sales_invoicing_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICE_STATUS_TRANSITIONS);
    Lazy::force(&PAYMENTS_LOGGED_TOTAL);
    Lazy::force(&PIPELINE_TRANSITIONS_TOTAL);
    Lazy::force(&PIPELINE_ESCALATIONS_TOTAL);
    Lazy::force(&COLLABORATOR_FAILURES_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
