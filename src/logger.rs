use std::collections::BTreeMap;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::config::LoggerConfig;
use crate::context::CorrelationContext;
use crate::diagnostics::DiagnosticChannel;
use crate::error::LoggingError;
use crate::processor::ProcessorChain;
use crate::record::{AuditEvent, CallSite, DomainEvent, EventDict, EventFields};
use crate::schema::{LogRecordSchema, PROCESSOR_OWNED_FIELDS};
use crate::severity::Severity;
use crate::sink::LogSink;

/// Outcome of an emission that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// The record reached the sink.
    Written,
    /// The severity gate was closed; nothing was built or written.
    Suppressed,
}

/// Counters shared by every logger of one core.
#[derive(Debug, Default)]
pub struct EmissionStats {
    /// Records written to the sink.
    pub emitted: AtomicU64,
    /// Calls dropped by a processor or the schema.
    pub rejected: AtomicU64,
    /// Calls whose write failed.
    pub sink_failures: AtomicU64,
}

/// Point-in-time copy of [`EmissionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub emitted: u64,
    pub rejected: u64,
    pub sink_failures: u64,
}

pub(crate) struct Core {
    pub(crate) config: Arc<LoggerConfig>,
    pub(crate) schema: LogRecordSchema,
    pub(crate) chain: ProcessorChain,
    pub(crate) sink: Arc<dyn LogSink>,
    pub(crate) diagnostics: Arc<dyn DiagnosticChannel>,
    pub(crate) stats: EmissionStats,
    /// Set after a failed write so one outage is reported once.
    pub(crate) sink_down: AtomicBool,
}

/// Facade exposing the domain and audit emission methods.
///
/// Cheap to clone. Loggers derived with [`named`](Self::named) or
/// [`with_level`](Self::with_level) share the processor chain, schema, sink
/// and counters of the logger they came from.
///
/// Every method is best-effort: schema, processor and sink failures go to
/// the fallback [`DiagnosticChannel`] and never reach the caller. Use the
/// `try_*` variants to observe the outcome.
#[derive(Clone)]
pub struct StructuredLogger {
    core: Arc<Core>,
    name: Arc<str>,
    level: Severity,
}

impl StructuredLogger {
    pub(crate) fn from_core(core: Core) -> Self {
        let name: Arc<str> = Arc::from(core.config.logger_name.as_str());
        let level = core.config.level;
        StructuredLogger { core: Arc::new(core), name, level }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Severity {
        self.level
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.core.config
    }

    /// Same core, different logger name.
    pub fn named(&self, name: &str) -> Self {
        StructuredLogger {
            core: Arc::clone(&self.core),
            name: Arc::from(name),
            level: self.level,
        }
    }

    /// Same core, different threshold.
    pub fn with_level(&self, level: Severity) -> Self {
        StructuredLogger {
            core: Arc::clone(&self.core),
            name: Arc::clone(&self.name),
            level,
        }
    }

    pub fn is_enabled_for(&self, severity: Severity) -> bool {
        severity.passes(self.level)
    }

    /// Direct calls record the caller's file and line only: `function_name`
    /// is `"<unknown>"` and `module` is the file stem. The `domain_*!` and
    /// `audit!` macros capture the full call site, and skip building fields
    /// when the level is disabled.
    #[track_caller]
    pub fn debug(&self, event: DomainEvent) {
        self.log_domain(Severity::Debug, event);
    }

    #[track_caller]
    pub fn info(&self, event: DomainEvent) {
        self.log_domain(Severity::Info, event);
    }

    #[track_caller]
    pub fn warning(&self, event: DomainEvent) {
        self.log_domain(Severity::Warning, event);
    }

    #[track_caller]
    pub fn error(&self, event: DomainEvent) {
        self.log_domain(Severity::Error, event);
    }

    #[track_caller]
    pub fn log_domain(&self, severity: Severity, event: DomainEvent) {
        let _ = self.try_log_domain(severity, event);
    }

    /// Call-site capture is the same as for [`debug`](Self::debug); prefer
    /// the `audit!` macro for the enclosing function and module path.
    #[track_caller]
    pub fn audit(&self, event: AuditEvent) {
        let _ = self.try_audit(event);
    }

    /// Like [`log_domain`](Self::log_domain) but returns the outcome. Errors
    /// are reported to the fallback channel either way.
    #[track_caller]
    pub fn try_log_domain(&self, severity: Severity, event: DomainEvent) -> Result<Emission, LoggingError> {
        let location = Location::caller();
        if !self.is_enabled_for(severity) {
            return Ok(Emission::Suppressed);
        }
        let callsite = event.callsite.unwrap_or_else(|| CallSite::from_location(location));
        self.emit(
            severity,
            event.event,
            EventFields::Domain(event.fields),
            event.extra,
            callsite,
        )
    }

    #[track_caller]
    pub fn try_audit(&self, event: AuditEvent) -> Result<Emission, LoggingError> {
        let location = Location::caller();
        if !self.is_enabled_for(Severity::Audit) {
            return Ok(Emission::Suppressed);
        }
        let callsite = event.callsite.unwrap_or_else(|| CallSite::from_location(location));
        self.emit(
            Severity::Audit,
            event.event,
            EventFields::Audit { fields: event.fields, request_id: event.request_id },
            event.extra,
            callsite,
        )
    }

    pub fn stats(&self) -> StatsSnapshot {
        let stats = &self.core.stats;
        StatsSnapshot {
            emitted: stats.emitted.load(Ordering::Relaxed),
            rejected: stats.rejected.load(Ordering::Relaxed),
            sink_failures: stats.sink_failures.load(Ordering::Relaxed),
        }
    }

    /// Flush the sink, reporting a failure on the fallback channel.
    pub fn flush(&self) {
        if let Err(e) = self.core.sink.flush() {
            self.core.diagnostics.report(&self.name, &LoggingError::Sink(e));
        }
    }

    fn emit(
        &self,
        severity: Severity,
        event: String,
        typed: EventFields,
        extra: BTreeMap<String, Value>,
        callsite: CallSite,
    ) -> Result<Emission, LoggingError> {
        let log_type = typed.log_type();
        let dict = EventDict {
            log_type,
            severity,
            callsite,
            fields: raw_fields(event, typed, extra),
        };

        let record = self
            .core
            .chain
            .run(&self.name, severity.method_name(), dict)
            .map_err(LoggingError::from)
            .and_then(|dict| {
                self.core
                    .schema
                    .validate(log_type, severity, dict.fields)
                    .map_err(LoggingError::from)
            });
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                self.core.stats.rejected.fetch_add(1, Ordering::Relaxed);
                self.core.diagnostics.report(&self.name, &e);
                return Err(e);
            }
        };

        match self.core.sink.send(&record) {
            Ok(()) => {
                self.core.sink_down.store(false, Ordering::Relaxed);
                self.core.stats.emitted.fetch_add(1, Ordering::Relaxed);
                Ok(Emission::Written)
            }
            Err(e) => {
                self.core.stats.sink_failures.fetch_add(1, Ordering::Relaxed);
                let e = LoggingError::from(e);
                if !self.core.sink_down.swap(true, Ordering::Relaxed) {
                    self.core.diagnostics.report(&self.name, &e);
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("extra_fields", &self.core.schema.extra_fields())
            .field("chain", &self.core.chain)
            .finish()
    }
}

/// Raw mapping handed to the processor chain. Extras go in first so the
/// named parameters win; schema-owned keys are never taken from extras.
fn raw_fields(event: String, typed: EventFields, extra: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    let mut fields: BTreeMap<String, Value> = extra
        .into_iter()
        .filter(|(key, _)| !PROCESSOR_OWNED_FIELDS.contains(&key.as_str()))
        .collect();
    fields.insert("event".to_string(), Value::from(event));

    let request_id = match typed {
        EventFields::Domain(domain) => {
            if let Some(document_id) = domain.document_id {
                fields.insert("document_id".to_string(), Value::from(document_id));
            }
            domain.request_id
        }
        EventFields::Audit { fields: audit, request_id } => {
            fields.insert("base_url".to_string(), Value::from(audit.base_url));
            fields.insert("client".to_string(), Value::from(audit.client));
            fields.insert("client_ip_address".to_string(), Value::from(audit.client_ip_address));
            fields.insert("http_method".to_string(), Value::from(audit.http_method));
            fields.insert("path".to_string(), Value::from(audit.path));
            fields.insert("status_code".to_string(), Value::from(audit.status_code));
            request_id
        }
    };

    // A malformed explicit id is dropped so the chain falls back to the scope.
    match request_id.as_deref().and_then(CorrelationContext::normalize) {
        Some(id) => {
            fields.insert("request_id".to_string(), Value::from(id));
        }
        None => {
            fields.remove("request_id");
        }
    }
    fields
}
