//! W3C trace context propagation for calls to collaborator services.

use opentelemetry::trace::TraceContextExt;
use reqwest::header::HeaderMap;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Writes the current span's context as `traceparent`/`tracestate` headers.
/// Leaves the map untouched when no sampled OpenTelemetry span is active.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let span = Span::current();
    let context = span.context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();

    if !span_context.is_valid() {
        return;
    }

    let traceparent = format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    );
    if let Ok(value) = traceparent.parse() {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty()
        && let Ok(value) = tracestate.parse()
    {
        headers.insert(TRACESTATE_HEADER, value);
    }
}

/// `reqwest::Client` helpers that attach the trace headers.
pub trait TracedClientExt {
    fn traced_post(&self, url: &str) -> reqwest::RequestBuilder;
}

impl TracedClientExt for reqwest::Client {
    fn traced_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        self.post(url).headers(headers)
    }
}
