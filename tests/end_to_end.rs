use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use structured_audit_log::diagnostics::CollectingDiagnostics;
use structured_audit_log::init::LoggerBuilder;
use structured_audit_log::{
    audit, domain_debug, domain_error, domain_info, domain_warning, CorrelationContext, DomainEvent,
    ExtraFields, JsonSink, LoggerConfig, Severity, StructuredLogger,
};

/// `Write` handle whose bytes stay readable after the sink takes it.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn setup(extra_fields: ExtraFields) -> (StructuredLogger, SharedBuffer, CollectingDiagnostics) {
    let out = SharedBuffer::default();
    let diagnostics = CollectingDiagnostics::new();
    let config = LoggerConfig {
        logger_name: "products-api".into(),
        extra_fields,
        ..LoggerConfig::default()
    };
    let logger = LoggerBuilder::new(config)
        .sink(JsonSink::new(out.clone()))
        .diagnostics(diagnostics.clone())
        .build();
    (logger, out, diagnostics)
}

#[test]
fn audit_call_writes_one_complete_line() {
    let (logger, out, diagnostics) = setup(ExtraFields::Ignore);

    audit!(
        logger,
        "http_request",
        base_url = "http://x",
        client = "curl",
        client_ip_address = "127.0.0.1",
        http_method = "GET",
        path = "/health",
        status_code = 200,
        request_id = "abc-123",
    );

    let lines = out.lines();
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line["log_type"], "AUDIT");
    assert_eq!(line["status_code"], 200);
    assert_eq!(line["request_id"], "abc-123");
    assert_eq!(line["level"], "AUDIT");
    assert_eq!(line["function_name"], "audit_call_writes_one_complete_line");
    assert_eq!(line["filename"], "end_to_end.rs");
    assert!(uuid::Uuid::parse_str(line["event_id"].as_str().unwrap()).is_ok());
    for field in [
        "datetime", "event", "event_id", "filename", "function_name", "level",
        "line_number", "log_type", "module", "request_id", "base_url", "client",
        "client_ip_address", "http_method", "path", "status_code",
    ] {
        assert!(line.get(field).is_some(), "missing {field}");
    }
    assert!(diagnostics.reports().is_empty());
}

#[test]
fn domain_info_omits_null_document_id_and_keeps_extras_when_allowed() {
    let (logger, out, _) = setup(ExtraFields::Allow);

    domain_info!(
        logger,
        "product_created",
        request_id = "r1",
        document_id = None::<String>,
        product_id = "p1",
    );

    let line = &out.lines()[0];
    assert_eq!(line["log_type"], "DOMAIN");
    assert_eq!(line["level"], "INFO");
    assert_eq!(line["request_id"], "r1");
    assert_eq!(line["product_id"], "p1");
    assert!(line.get("document_id").is_none());
}

#[test]
fn extra_fields_are_dropped_when_flag_is_off() {
    let (logger, out, _) = setup(ExtraFields::Ignore);
    domain_info!(logger, "product_created", request_id = "r1", product_id = "p1");
    let line = &out.lines()[0];
    assert!(line.get("product_id").is_none());
    assert_eq!(line["event"], "product_created");
}

#[test]
fn invalid_status_code_reaches_only_the_fallback_channel() {
    let (logger, out, diagnostics) = setup(ExtraFields::Ignore);

    audit!(
        logger,
        "http_request",
        base_url = "http://x",
        client = "curl",
        client_ip_address = "127.0.0.1",
        http_method = "GET",
        path = "/health",
        status_code = 999,
        request_id = "abc-123",
    );
    let still_running = true;

    assert!(still_running);
    assert!(out.lines().is_empty());
    let reports = diagnostics.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("status_code"));
}

#[test]
fn sequential_calls_share_request_id_but_not_event_id() {
    let (logger, out, _) = setup(ExtraFields::Ignore);

    CorrelationContext::sync_scope(None, || {
        domain_info!(logger, "first");
        domain_info!(logger, "second");
    });

    let lines = out.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["request_id"], lines[1]["request_id"]);
    assert_ne!(lines[0]["event_id"], lines[1]["event_id"]);
    assert!(!lines[0]["request_id"].as_str().unwrap().is_empty());
}

#[test]
fn warning_and_error_lines_carry_their_level_names() {
    let (logger, out, diagnostics) = setup(ExtraFields::Ignore);

    domain_warning!(logger, "product_deletion_failed", request_id = "r2", reason = "not_found");
    domain_error!(logger, "error_endpoint_called", request_id = "r3");
    logger.error(DomainEvent::new("inventory_sync_failed").request_id("r4"));

    let lines = out.lines();
    assert_eq!(lines.len(), 3);
    let levels: Vec<&str> = lines.iter().map(|l| l["level"].as_str().unwrap()).collect();
    assert_eq!(levels, ["WARNING", "ERROR", "ERROR"]);
    for line in &lines {
        assert_eq!(line["log_type"], "DOMAIN");
    }
    assert_eq!(lines[0]["function_name"], "warning_and_error_lines_carry_their_level_names");
    assert_eq!(lines[2]["request_id"], "r4");
    assert!(diagnostics.reports().is_empty());

    let errors_only = logger.with_level(Severity::Error);
    domain_warning!(errors_only, "dropped");
    domain_error!(errors_only, "kept");
    assert_eq!(out.lines().len(), 4);
    assert_eq!(out.lines()[3]["event"], "kept");
}

#[test]
fn debug_is_gated_at_the_default_threshold() {
    let (logger, out, _) = setup(ExtraFields::Ignore);
    let mut built = false;

    domain_debug!(logger, "cache_miss", key = {
        built = true;
        "products"
    });
    assert!(!built, "fields were built for a suppressed call");
    assert!(out.lines().is_empty());

    let verbose = logger.with_level(Severity::Debug);
    domain_debug!(verbose, "cache_miss", key = "products");
    assert_eq!(out.lines()[0]["level"], "DEBUG");
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_ids() {
    let (logger, out, _) = setup(ExtraFields::Ignore);

    let mut handles = Vec::new();
    for n in 0..8 {
        let logger = logger.clone();
        handles.push(tokio::spawn(CorrelationContext::scope(
            Some(format!("req-{n}")),
            async move {
                domain_info!(logger, "step_one", step = 1);
                tokio::task::yield_now().await;
                domain_info!(logger, "step_two", step = 2);
                CorrelationContext::current()
            },
        )));
    }
    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Some(format!("req-{n}")));
    }

    let lines = out.lines();
    assert_eq!(lines.len(), 16);
    for n in 0..8 {
        let id = format!("req-{n}");
        let events: Vec<&Value> = lines.iter().filter(|l| l["request_id"] == json!(id)).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "step_one");
        assert_eq!(events[1]["event"], "step_two");
    }
}
