use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id for one HTTP exchange, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Reuses a caller-supplied id when it is short printable ASCII, otherwise mints a v4 UUID.
    fn from_header(value: Option<&HeaderValue>) -> Self {
        let supplied = value
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
            .filter(|s| s.bytes().all(|b| b.is_ascii_graphic()));
        match supplied {
            Some(id) => Self(id.to_string()),
            None => Self(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Attaches a [`RequestId`] to the request and echoes it on the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId::from_header(request.headers().get(&REQUEST_ID_HEADER));
    let header = HeaderValue::from_str(&id.0).ok();
    request.extensions_mut().insert(id);

    let mut response = next.run(request).await;
    if let Some(value) = header {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

/// Runs the request inside a span tagged with its id and logs the outcome.
///
/// Server errors log at `warn`; everything else at `info`. Latency also feeds the
/// `binfp_http_request_duration_seconds` histogram.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_default();

    let span = tracing::info_span!("http", request_id = %id, method = %method, path = %path);
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let elapsed = start.elapsed();
    let status = response.status();
    metrics::histogram!(
        "binfp_http_request_duration_seconds",
        "path" => path.clone(),
        "status" => status.as_u16().to_string()
    )
    .record(elapsed.as_secs_f64());

    span.in_scope(|| {
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), elapsed_ms = elapsed.as_millis() as u64, "request failed");
        } else {
            tracing::info!(status = status.as_u16(), elapsed_ms = elapsed.as_millis() as u64, "request done");
        }
    });

    response
}
