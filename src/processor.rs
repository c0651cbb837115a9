use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::context::CorrelationContext;
use crate::error::ProcessorError;
use crate::record::EventDict;

/// One enrichment step applied to every emission.
///
/// Processors are pure: no I/O, and an `Err` aborts the emission, so it is
/// reserved for truly exceptional conditions.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// **Parameters**
    /// - `logger`: name of the emitting logger.
    /// - `method`: emission method (`"info"`, `"audit"`, ...).
    /// - `event`: mapping produced by the previous step.
    fn process(&self, logger: &str, method: &str, event: EventDict) -> Result<EventDict, ProcessorError>;
}

impl<F> Processor for F
where
    F: Fn(&str, &str, EventDict) -> Result<EventDict, ProcessorError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "custom"
    }

    fn process(&self, logger: &str, method: &str, event: EventDict) -> Result<EventDict, ProcessorError> {
        self(logger, method, event)
    }
}

/// Fills `request_id` from the active correlation scope, generating one if
/// there is none.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeCorrelationContext;

impl Processor for MergeCorrelationContext {
    fn name(&self) -> &'static str {
        "merge_correlation_context"
    }

    fn process(&self, _logger: &str, _method: &str, mut event: EventDict) -> Result<EventDict, ProcessorError> {
        let present = matches!(event.fields.get("request_id"), Some(v) if !v.is_null());
        if !present {
            event
                .fields
                .insert("request_id".to_string(), Value::from(CorrelationContext::ensure(None)));
        }
        Ok(event)
    }
}

/// Writes the level name for the event's numeric severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddLogLevel;

impl Processor for AddLogLevel {
    fn name(&self) -> &'static str {
        "add_log_level"
    }

    fn process(&self, _logger: &str, _method: &str, mut event: EventDict) -> Result<EventDict, ProcessorError> {
        event
            .fields
            .insert("level".to_string(), Value::from(event.severity.name()));
        Ok(event)
    }
}

/// Adds an ISO-8601 UTC `datetime` unless one is already present.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeStamper;

impl Processor for TimeStamper {
    fn name(&self) -> &'static str {
        "time_stamper"
    }

    fn process(&self, _logger: &str, _method: &str, mut event: EventDict) -> Result<EventDict, ProcessorError> {
        event.fields.entry("datetime".to_string()).or_insert_with(|| {
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        });
        Ok(event)
    }
}

/// Copies the call site captured at the logging call into the mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallsiteParameterAdder;

impl Processor for CallsiteParameterAdder {
    fn name(&self) -> &'static str {
        "callsite_parameter_adder"
    }

    fn process(&self, _logger: &str, _method: &str, mut event: EventDict) -> Result<EventDict, ProcessorError> {
        let site = event.callsite;
        let fields = &mut event.fields;
        fields.insert("filename".to_string(), Value::from(site.filename));
        fields.insert("function_name".to_string(), Value::from(site.function_name));
        fields.insert("line_number".to_string(), Value::from(site.line_number));
        fields.insert("module".to_string(), Value::from(site.module));
        Ok(event)
    }
}

/// Gives each emission a fresh UUID `event_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateEventId;

impl Processor for GenerateEventId {
    fn name(&self) -> &'static str {
        "generate_event_id"
    }

    fn process(&self, _logger: &str, _method: &str, mut event: EventDict) -> Result<EventDict, ProcessorError> {
        event
            .fields
            .entry("event_id".to_string())
            .or_insert_with(|| Value::from(Uuid::new_v4().to_string()));
        Ok(event)
    }
}

/// Ordered processors, built once at startup and shared by every emission.
pub struct ProcessorChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    /// Empty chain; records built with it will usually fail validation.
    pub fn empty() -> Self {
        ProcessorChain { processors: Vec::new() }
    }

    /// Correlation id, level, timestamp, call site, event id, in that order.
    pub fn standard() -> Self {
        ProcessorChain::empty()
            .with(MergeCorrelationContext)
            .with(AddLogLevel)
            .with(TimeStamper)
            .with(CallsiteParameterAdder)
            .with(GenerateEventId)
    }

    /// Append a processor after the existing ones.
    pub fn with(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    pub fn run(&self, logger: &str, method: &str, mut event: EventDict) -> Result<EventDict, ProcessorError> {
        for processor in &self.processors {
            event = processor.process(logger, method, event)?;
        }
        Ok(event)
    }
}

impl Default for ProcessorChain {
    fn default() -> Self {
        ProcessorChain::standard()
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CallSite, LogType};
    use crate::severity::Severity;
    use std::collections::BTreeMap;

    fn dict() -> EventDict {
        EventDict {
            log_type: LogType::Domain,
            severity: Severity::Warning,
            callsite: CallSite::new("src/orders.rs", "shop::orders::place_order::__callsite", 7, "shop::orders"),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn standard_chain_order() {
        assert_eq!(
            ProcessorChain::standard().names(),
            vec![
                "merge_correlation_context",
                "add_log_level",
                "time_stamper",
                "callsite_parameter_adder",
                "generate_event_id",
            ]
        );
    }

    #[test]
    fn standard_chain_enriches_all_base_fields() {
        let out = CorrelationContext::sync_scope(Some("req-9".into()), || {
            ProcessorChain::standard().run("app", "warning", dict()).unwrap()
        });
        let f = &out.fields;
        assert_eq!(f["request_id"], "req-9");
        assert_eq!(f["level"], "WARNING");
        assert_eq!(f["filename"], "orders.rs");
        assert_eq!(f["function_name"], "place_order");
        assert_eq!(f["line_number"], 7);
        assert_eq!(f["module"], "shop::orders");
        assert!(Uuid::parse_str(f["event_id"].as_str().unwrap()).is_ok());
        assert!(f["datetime"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn explicit_request_id_is_kept() {
        let mut event = dict();
        event.fields.insert("request_id".into(), Value::from("explicit"));
        let out = CorrelationContext::sync_scope(Some("scoped".into()), || {
            MergeCorrelationContext.process("app", "info", event).unwrap()
        });
        assert_eq!(out.fields["request_id"], "explicit");
    }

    #[test]
    fn custom_processors_run_after_builtins() {
        let chain = ProcessorChain::standard().with(|_: &str, method: &str, mut event: EventDict| -> Result<EventDict, ProcessorError> {
            assert!(event.fields.contains_key("event_id"));
            event.fields.insert("method".into(), Value::from(method));
            Ok(event)
        });
        let out = chain.run("app", "warning", dict()).unwrap();
        assert_eq!(out.fields["method"], "warning");
    }

    #[test]
    fn failing_processor_stops_the_chain() {
        let chain = ProcessorChain::empty()
            .with(|_: &str, _: &str, _: EventDict| -> Result<EventDict, ProcessorError> {
                Err(ProcessorError { processor: "reject", reason: "nope".into() })
            })
            .with(GenerateEventId);
        let err = chain.run("app", "info", dict()).unwrap_err();
        assert_eq!(err.processor, "reject");
    }
}
