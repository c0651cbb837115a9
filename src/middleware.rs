//! HTTP boundary: correlation header in and out, one audit record per request.
//!
//! - The correlation id is taken from the configured header when valid,
//!   otherwise generated.
//! - The inner service runs inside that id's correlation scope, so every
//!   domain record emitted while handling the request carries it.
//! - The same header is set on the response.
//! - Exactly one audit record is emitted per request. When the inner service
//!   fails or a handler panics, the record uses status 500 with the error
//!   text or panic message in `error`; the error is returned unchanged and
//!   the panic is resumed.

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use futures::FutureExt;
use std::{
    any::Any,
    fmt::Display,
    future::Future,
    net::SocketAddr,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};

use crate::config::DEFAULT_REQUEST_ID_HEADER;
use crate::context::CorrelationContext;
use crate::logger::StructuredLogger;
use crate::record::{AuditEvent, AuditFields};

pub const UNKNOWN_CLIENT: &str = "unknown";
pub const UNKNOWN_CLIENT_IP: &str = "0.0.0.0";

/// Audit logging layer
///
/// Wraps services to provide correlation ids and request audit records.
#[derive(Clone)]
pub struct AuditLayer {
    logger: StructuredLogger,
    header: HeaderName,
}

impl AuditLayer {
    /// Uses the logger's configured `request_id_header`, falling back to
    /// `x-request-id` if that name is not a valid header.
    pub fn new(logger: StructuredLogger) -> Self {
        let header = HeaderName::from_bytes(logger.config().request_id_header.as_bytes())
            .unwrap_or_else(|_| HeaderName::from_static(DEFAULT_REQUEST_ID_HEADER));
        Self { logger, header }
    }

    pub fn header_name(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditMiddleware {
            inner,
            logger: self.logger.clone(),
            header: self.header.clone(),
        }
    }
}

/// Audit middleware service
#[derive(Clone)]
pub struct AuditMiddleware<S> {
    inner: S,
    logger: StructuredLogger,
    header: HeaderName,
}

impl<S> Service<Request> for AuditMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Display,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        // The clone may not be ready; keep the instance that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let logger = self.logger.clone();
        let header = self.header.clone();

        let inbound = request
            .headers()
            .get(&header)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let request_id = CorrelationContext::ensure(inbound.as_deref());
        let info = RequestInfo::from_request(&request);

        Box::pin(CorrelationContext::scope(Some(request_id.clone()), async move {
            let started = Instant::now();
            let outcome = AssertUnwindSafe(async move { inner.call(request).await })
                .catch_unwind()
                .await;
            let process_time_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
            let failed = |error: String| {
                info.audit_event("http_request_failed", StatusCode::INTERNAL_SERVER_ERROR, &request_id)
                    .field("process_time_ms", process_time_ms)
                    .field("error", error)
            };

            match outcome {
                Ok(Ok(mut response)) => {
                    if let Ok(value) = HeaderValue::from_str(&request_id) {
                        response.headers_mut().insert(header, value);
                    }
                    let event = info
                        .audit_event("http_request", response.status(), &request_id)
                        .field("process_time_ms", process_time_ms);
                    record_request(&logger, event);
                    Ok(response)
                }
                Ok(Err(e)) => {
                    record_request(&logger, failed(e.to_string()));
                    Err(e)
                }
                Err(payload) => {
                    record_request(&logger, failed(panic_message(&*payload)));
                    panic::resume_unwind(payload)
                }
            }
        }))
    }
}

fn record_request(logger: &StructuredLogger, event: AuditEvent) {
    logger.audit(event.at(crate::callsite!()));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// The request attributes an audit record needs, captured before the
/// request is handed to the inner service.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestInfo {
    base_url: String,
    client: String,
    client_ip_address: String,
    http_method: String,
    path: String,
}

impl RequestInfo {
    fn from_request(request: &Request) -> Self {
        let headers = request.headers();
        let uri = request.uri();

        let scheme = uri.scheme_str().unwrap_or("http");
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| "localhost".to_string());

        let client = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_CLIENT)
            .to_string();

        let client_ip_address = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT_IP.to_string());

        RequestInfo {
            base_url: format!("{scheme}://{host}"),
            client,
            client_ip_address,
            http_method: request.method().to_string(),
            path: uri.path().to_string(),
        }
    }

    fn audit_event(&self, event: &str, status: StatusCode, request_id: &str) -> AuditEvent {
        AuditEvent::new(
            event,
            AuditFields {
                base_url: self.base_url.clone(),
                client: self.client.clone(),
                client_ip_address: self.client_ip_address.clone(),
                http_method: self.http_method.clone(),
                path: self.path.clone(),
                status_code: status.as_u16(),
            },
        )
        .request_id(request_id)
    }
}
