use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;
use std::path::Path;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::severity::Severity;

/// Record category. Derived from the emission method, never from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogType {
    Domain,
    Audit,
}

impl LogType {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogType::Domain => "DOMAIN",
            LogType::Audit => "AUDIT",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source location of a log call, captured where the call is written.
///
/// Built by the [`callsite!`](crate::callsite) macro, or from
/// [`Location::caller`] when a logger method is called directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub filename: &'static str,
    pub function_name: &'static str,
    pub line_number: u32,
    pub module: &'static str,
}

impl CallSite {
    /// Used when the enclosing function cannot be named.
    pub const UNKNOWN_FUNCTION: &'static str = "<unknown>";

    /// `file` may be a full path; only its final component is kept.
    /// `function` may be a fully-qualified type name as produced by
    /// `std::any::type_name`; closure and helper segments are stripped.
    pub fn new(file: &'static str, function: &'static str, line: u32, module: &'static str) -> Self {
        CallSite {
            filename: base_name(file),
            function_name: function_name(function),
            line_number: line,
            module,
        }
    }

    /// Call site from a `#[track_caller]` location. The function name is not
    /// recoverable here and the module is approximated by the file stem.
    pub fn from_location(location: &'static Location<'static>) -> Self {
        let filename = base_name(location.file());
        let module = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        CallSite {
            filename,
            function_name: Self::UNKNOWN_FUNCTION,
            line_number: location.line(),
            module,
        }
    }
}

fn base_name(file: &'static str) -> &'static str {
    Path::new(file)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}

fn function_name(type_name: &'static str) -> &'static str {
    let mut name = type_name.strip_suffix("::__callsite").unwrap_or(type_name);
    while let Some(stripped) = name.strip_suffix("::{{closure}}") {
        name = stripped;
    }
    match name.rsplit("::").next() {
        Some(last) if !last.is_empty() => last,
        _ => CallSite::UNKNOWN_FUNCTION,
    }
}

/// Fields owned by the domain variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainFields {
    pub request_id: Option<String>,
    pub document_id: Option<String>,
}

/// Fields every audit record must carry. A struct literal is needed to build
/// one, so none of them can be forgotten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFields {
    pub base_url: String,
    pub client: String,
    pub client_ip_address: String,
    pub http_method: String,
    pub path: String,
    pub status_code: u16,
}

/// Tagged union of the two record variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFields {
    Domain(DomainFields),
    Audit {
        fields: AuditFields,
        request_id: Option<String>,
    },
}

impl EventFields {
    pub fn log_type(&self) -> LogType {
        match self {
            EventFields::Domain(_) => LogType::Domain,
            EventFields::Audit { .. } => LogType::Audit,
        }
    }
}

/// Builder for a domain event.
///
/// ```
/// use structured_audit_log::DomainEvent;
///
/// let event = DomainEvent::new("product_created")
///     .request_id("r1")
///     .field("product_id", "p1");
/// ```
#[derive(Debug, Clone)]
pub struct DomainEvent {
    pub(crate) event: String,
    pub(crate) fields: DomainFields,
    pub(crate) extra: BTreeMap<String, Value>,
    pub(crate) callsite: Option<CallSite>,
}

impl DomainEvent {
    pub fn new(event: impl Into<String>) -> Self {
        DomainEvent {
            event: event.into(),
            fields: DomainFields::default(),
            extra: BTreeMap::new(),
            callsite: None,
        }
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.fields.request_id = Some(request_id.into());
        self
    }

    pub fn document_id(mut self, document_id: impl Into<String>) -> Self {
        self.fields.document_id = Some(document_id.into());
        self
    }

    /// Attach an arbitrary field. `request_id` and `document_id` land in
    /// their typed slots; a null value clears the slot.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key = key.into();
        let value = to_json(value);
        match key.as_str() {
            "request_id" => self.fields.request_id = value_to_opt_string(value),
            "document_id" => self.fields.document_id = value_to_opt_string(value),
            _ => {
                self.extra.insert(key, value);
            }
        }
        self
    }

    /// Attach a value by its `Display` form (ids, enum members, ...).
    pub fn field_display(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.field(key, value.to_string())
    }

    /// Pin the call site instead of relying on `#[track_caller]`.
    pub fn at(mut self, callsite: CallSite) -> Self {
        self.callsite = Some(callsite);
        self
    }
}

/// Builder for an audit event.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub(crate) event: String,
    pub(crate) fields: AuditFields,
    pub(crate) request_id: Option<String>,
    pub(crate) extra: BTreeMap<String, Value>,
    pub(crate) callsite: Option<CallSite>,
}

impl AuditEvent {
    pub fn new(event: impl Into<String>, fields: AuditFields) -> Self {
        AuditEvent {
            event: event.into(),
            fields,
            request_id: None,
            extra: BTreeMap::new(),
            callsite: None,
        }
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach an arbitrary field; `request_id` lands in its typed slot.
    pub fn field(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let key = key.into();
        let value = to_json(value);
        if key == "request_id" {
            self.request_id = value_to_opt_string(value);
        } else {
            self.extra.insert(key, value);
        }
        self
    }

    pub fn field_display(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.field(key, value.to_string())
    }

    pub fn at(mut self, callsite: CallSite) -> Self {
        self.callsite = Some(callsite);
        self
    }
}

fn to_json(value: impl Serialize) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| Value::String(format!("<unserializable: {e}>")))
}

fn value_to_opt_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Mutable field mapping threaded through the processor chain.
#[derive(Debug, Clone)]
pub struct EventDict {
    pub log_type: LogType,
    pub severity: Severity,
    pub callsite: CallSite,
    pub fields: BTreeMap<String, Value>,
}

/// A validated record, ready for a sink. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    log_type: LogType,
    severity: Severity,
    fields: BTreeMap<String, Value>,
}

impl LogRecord {
    pub(crate) fn new(log_type: LogType, severity: Severity, fields: BTreeMap<String, Value>) -> Self {
        LogRecord { log_type, severity, fields }
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    /// Severity the gate was checked against.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn event_id(&self) -> Option<&str> {
        self.get("event_id").and_then(Value::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get("request_id").and_then(Value::as_str)
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
