#![cfg(feature = "middleware")]

use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde_json::json;
use structured_audit_log::diagnostics::CollectingDiagnostics;
use structured_audit_log::init::LoggerBuilder;
use structured_audit_log::memory_sink::MemorySink;
use structured_audit_log::middleware::AuditLayer;
use structured_audit_log::{domain_info, ExtraFields, LogType, LoggerConfig, StructuredLogger};
use tower::{service_fn, Layer, ServiceExt};

fn logger(sink: &MemorySink) -> StructuredLogger {
    let config = LoggerConfig { extra_fields: ExtraFields::Allow, ..LoggerConfig::default() };
    LoggerBuilder::new(config)
        .sink(sink.clone())
        .diagnostics(CollectingDiagnostics::new())
        .build()
}

async fn explode() -> StatusCode {
    panic!("inventory store unreachable")
}

fn app(logger: StructuredLogger) -> Router {
    let handler_logger = logger.clone();
    Router::new()
        .route(
            "/health",
            get(move || {
                let logger = handler_logger.clone();
                async move {
                    domain_info!(logger, "health_checked", status = "healthy");
                    "ok"
                }
            }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/error", get(explode))
        .layer(AuditLayer::new(logger))
}

#[tokio::test]
async fn generated_request_id_is_shared_by_records_and_response_header() {
    let sink = MemorySink::new();
    let response = app(logger(&sink))
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/health")
                .header("host", "x")
                .header("user-agent", "curl")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let header = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("correlation header on response")
        .to_string();
    assert!(uuid::Uuid::parse_str(&header).is_ok());

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].log_type(), LogType::Domain);
    assert_eq!(records[1].log_type(), LogType::Audit);
    for record in &records {
        assert_eq!(record.request_id(), Some(header.as_str()));
    }

    let audit = &records[1];
    assert_eq!(audit.get("base_url"), Some(&json!("http://x")));
    assert_eq!(audit.get("client"), Some(&json!("curl")));
    assert_eq!(audit.get("client_ip_address"), Some(&json!("0.0.0.0")));
    assert_eq!(audit.get("http_method"), Some(&json!("GET")));
    assert_eq!(audit.get("path"), Some(&json!("/health")));
    assert_eq!(audit.get("status_code"), Some(&json!(200)));
    assert!(audit.get("process_time_ms").is_some());
}

#[tokio::test]
async fn inbound_request_id_is_reused() {
    let sink = MemorySink::new();
    let response = app(logger(&sink))
        .oneshot(
            Request::builder()
                .uri("/missing")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-request-id"], "abc-123");
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_id(), Some("abc-123"));
    assert_eq!(records[0].get("status_code"), Some(&json!(404)));
}

#[tokio::test]
async fn blank_inbound_request_id_is_replaced() {
    let sink = MemorySink::new();
    let response = app(logger(&sink))
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let header = response.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(!header.is_empty());
    assert_eq!(sink.records()[1].request_id(), Some(header.as_str()));
}

#[tokio::test]
async fn failing_handler_is_audited_as_500_and_error_propagates() {
    let sink = MemorySink::new();
    let service = AuditLayer::new(logger(&sink)).layer(service_fn(|_req: Request| async {
        Err::<Response, _>("database unavailable")
    }));

    let result = service
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/products")
                .header("x-request-id", "r-500")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(result.unwrap_err(), "database unavailable");
    let records = sink.records();
    assert_eq!(records.len(), 1);
    let audit = &records[0];
    assert_eq!(audit.get("status_code"), Some(&json!(500)));
    assert_eq!(audit.get("error"), Some(&json!("database unavailable")));
    assert_eq!(audit.get("http_method"), Some(&json!("POST")));
    assert_eq!(audit.request_id(), Some("r-500"));
}

#[tokio::test]
async fn panicking_handler_is_audited_as_500_before_unwinding() {
    let sink = MemorySink::new();
    let pending = app(logger(&sink)).oneshot(
        Request::builder()
            .method(Method::GET)
            .uri("/error")
            .header("x-request-id", "r-panic")
            .body(Body::empty())
            .unwrap(),
    );

    let joined = tokio::spawn(pending).await;
    assert!(joined.unwrap_err().is_panic());

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let audit = &records[0];
    assert_eq!(audit.log_type(), LogType::Audit);
    assert_eq!(audit.get("event"), Some(&json!("http_request_failed")));
    assert_eq!(audit.get("status_code"), Some(&json!(500)));
    assert_eq!(audit.get("error"), Some(&json!("inventory store unreachable")));
    assert_eq!(audit.get("path"), Some(&json!("/error")));
    assert_eq!(audit.request_id(), Some("r-panic"));
}
