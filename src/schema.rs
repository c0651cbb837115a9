use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::config::ExtraFields;
use crate::error::SchemaValidationError;
use crate::record::{LogRecord, LogType};
use crate::severity::Severity;

/// Fields every record carries.
pub const BASE_FIELDS: [&str; 10] = [
    "datetime",
    "event",
    "event_id",
    "filename",
    "function_name",
    "level",
    "line_number",
    "log_type",
    "module",
    "request_id",
];

pub const DOMAIN_OPTIONAL_FIELDS: [&str; 1] = ["document_id"];

pub const AUDIT_REQUIRED_FIELDS: [&str; 6] = [
    "base_url",
    "client",
    "client_ip_address",
    "http_method",
    "path",
    "status_code",
];

/// Base fields filled by the processor chain. Callers cannot supply them.
pub const PROCESSOR_OWNED_FIELDS: [&str; 8] = [
    "datetime",
    "event_id",
    "filename",
    "function_name",
    "level",
    "line_number",
    "log_type",
    "module",
];

/// Validates an enriched field mapping against its variant and freezes it
/// into a [`LogRecord`].
#[derive(Debug, Clone, Copy)]
pub struct LogRecordSchema {
    extra_fields: ExtraFields,
}

impl LogRecordSchema {
    pub fn new(extra_fields: ExtraFields) -> Self {
        LogRecordSchema { extra_fields }
    }

    pub fn extra_fields(&self) -> ExtraFields {
        self.extra_fields
    }

    /// Whether `field` belongs to the declared shape of `log_type`.
    pub fn is_declared(log_type: LogType, field: &str) -> bool {
        BASE_FIELDS.contains(&field)
            || match log_type {
                LogType::Domain => DOMAIN_OPTIONAL_FIELDS.contains(&field),
                LogType::Audit => AUDIT_REQUIRED_FIELDS.contains(&field),
            }
    }

    /// Normalize and validate `fields` as a `log_type` record.
    ///
    /// `log_type` always comes from the argument; null values are dropped;
    /// undeclared fields are dropped unless extras are allowed.
    pub fn validate(
        &self,
        log_type: LogType,
        severity: Severity,
        mut fields: BTreeMap<String, Value>,
    ) -> Result<LogRecord, SchemaValidationError> {
        fields.insert("log_type".to_string(), Value::from(log_type.as_str()));
        fields.retain(|_, value| !value.is_null());
        if self.extra_fields == ExtraFields::Ignore {
            fields.retain(|key, _| Self::is_declared(log_type, key));
        }

        let mut v = Validator { log_type, fields: &mut fields };
        v.datetime("datetime")?;
        v.non_empty_str("event")?;
        v.event_id("event_id")?;
        v.string("filename")?;
        v.string("function_name")?;
        v.level("level")?;
        v.line_number("line_number")?;
        v.string("module")?;
        v.non_empty_str("request_id")?;

        match log_type {
            LogType::Domain => v.optional_string("document_id")?,
            LogType::Audit => {
                v.string("base_url")?;
                v.string("client")?;
                v.string("client_ip_address")?;
                v.http_method("http_method")?;
                v.string("path")?;
                v.status_code("status_code")?;
            }
        }

        Ok(LogRecord::new(log_type, severity, fields))
    }
}

struct Validator<'a> {
    log_type: LogType,
    fields: &'a mut BTreeMap<String, Value>,
}

impl Validator<'_> {
    fn missing(&self, field: &'static str) -> SchemaValidationError {
        SchemaValidationError::MissingField { log_type: self.log_type, field }
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> SchemaValidationError {
        SchemaValidationError::InvalidField {
            log_type: self.log_type,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn required(&self, field: &'static str) -> Result<&Value, SchemaValidationError> {
        self.fields.get(field).ok_or_else(|| self.missing(field))
    }

    fn string(&mut self, field: &'static str) -> Result<String, SchemaValidationError> {
        match self.required(field)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.invalid(field, format!("expected a string, got {other}"))),
        }
    }

    fn non_empty_str(&mut self, field: &'static str) -> Result<String, SchemaValidationError> {
        let s = self.string(field)?;
        if s.trim().is_empty() {
            return Err(self.invalid(field, "must not be empty"));
        }
        Ok(s)
    }

    fn optional_string(&mut self, field: &'static str) -> Result<(), SchemaValidationError> {
        match self.fields.get(field) {
            None | Some(Value::String(_)) => Ok(()),
            Some(other) => Err(self.invalid(field, format!("expected a string, got {other}"))),
        }
    }

    fn replace(&mut self, field: &'static str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    fn datetime(&mut self, field: &'static str) -> Result<(), SchemaValidationError> {
        let raw = self.string(field)?;
        let parsed = DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| self.invalid(field, format!("not an ISO-8601 timestamp: {e}")))?;
        let utc = parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        self.replace(field, Value::from(utc));
        Ok(())
    }

    fn event_id(&mut self, field: &'static str) -> Result<(), SchemaValidationError> {
        let raw = self.string(field)?;
        let id = Uuid::parse_str(&raw).map_err(|e| self.invalid(field, e.to_string()))?;
        self.replace(field, Value::from(id.to_string()));
        Ok(())
    }

    fn level(&mut self, field: &'static str) -> Result<(), SchemaValidationError> {
        let raw = self.string(field)?;
        let level: Severity = raw
            .parse()
            .map_err(|_| self.invalid(field, format!("unknown level {raw:?}")))?;
        self.replace(field, Value::from(level.name()));
        Ok(())
    }

    fn line_number(&mut self, field: &'static str) -> Result<(), SchemaValidationError> {
        let value = self.required(field)?;
        let line = match (value.as_u64(), value.as_i64()) {
            (Some(line), _) => line,
            (None, Some(_negative)) => 0,
            _ => return Err(self.invalid(field, format!("expected an integer, got {value}"))),
        };
        self.replace(field, Value::from(line));
        Ok(())
    }

    fn http_method(&mut self, field: &'static str) -> Result<(), SchemaValidationError> {
        let method = self.non_empty_str(field)?;
        self.replace(field, Value::from(method.trim().to_ascii_uppercase()));
        Ok(())
    }

    fn status_code(&mut self, field: &'static str) -> Result<(), SchemaValidationError> {
        let value = self.required(field)?;
        let code = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        let status = code
            .and_then(|c| u16::try_from(c).ok())
            .and_then(|c| StatusCode::from_u16(c).ok())
            .filter(|s| s.canonical_reason().is_some())
            .ok_or_else(|| self.invalid(field, format!("{value} is not a known HTTP status code")))?;
        self.replace(field, Value::from(status.as_u16()));
        Ok(())
    }
}
