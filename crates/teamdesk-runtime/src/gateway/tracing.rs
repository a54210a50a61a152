use std::time::Instant;

use axum::extract::Request;
use axum::http::header::HeaderName;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, Instrument};
use uuid::Uuid;

/// Header name for trace ID.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request identifiers, available to handlers as an extension.
#[derive(Debug, Clone)]
pub struct TracingState {
    /// Propagated from the caller when present.
    pub trace_id: String,
    pub request_id: String,
    pub start_time: Instant,
}

impl TracingState {
    pub fn new() -> Self {
        Self::with_trace_id(Uuid::new_v4().to_string())
    }

    /// Create with an existing trace ID (for propagation).
    pub fn with_trace_id(trace_id: String) -> Self {
        Self {
            trace_id,
            request_id: Uuid::new_v4().to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for TracingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Assign trace and request ids, run the request inside a span carrying
/// them, and echo both ids back as response headers.
pub async fn tracing_middleware(mut req: Request, next: Next) -> Response {
    let state = req
        .headers()
        .get(HeaderName::from_static(TRACE_ID_HEADER))
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(|v| TracingState::with_trace_id(v.to_string()))
        .unwrap_or_default();

    let span = tracing::info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        trace_id = %state.trace_id,
        request_id = %state.request_id,
    );
    req.extensions_mut().insert(state.clone());

    let mut response = next.run(req).instrument(span).await;
    debug!(
        trace_id = %state.trace_id,
        status = response.status().as_u16(),
        elapsed_ms = state.elapsed().as_millis() as u64,
        "Request finished"
    );

    if let Ok(val) = state.trace_id.parse() {
        response.headers_mut().insert(TRACE_ID_HEADER, val);
    }
    if let Ok(val) = state.request_id.parse() {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    response
}
