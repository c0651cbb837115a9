use crate::record::LogType;

/// A record failed its variant's required-field or type/range checks.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaValidationError {
    #[error("{log_type} record is missing required field `{field}`")]
    MissingField { log_type: LogType, field: &'static str },

    #[error("{log_type} record has invalid field `{field}`: {reason}")]
    InvalidField {
        log_type: LogType,
        field: String,
        reason: String,
    },
}

impl SchemaValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            SchemaValidationError::MissingField { field, .. } => field,
            SchemaValidationError::InvalidField { field, .. } => field,
        }
    }
}

/// The output stream refused a write.
#[derive(thiserror::Error, Debug)]
pub enum SinkWriteError {
    #[error("log stream write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("log record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("log stream lock poisoned by a panicking writer")]
    Poisoned,
}

/// A processor aborted the emission.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("processor `{processor}` failed: {reason}")]
pub struct ProcessorError {
    pub processor: &'static str,
    pub reason: String,
}

/// Anything that can stop a single emission. Never surfaces to business code
/// through the plain emission methods.
#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error(transparent)]
    Schema(#[from] SchemaValidationError),

    #[error(transparent)]
    Sink(#[from] SinkWriteError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// Error returned when reading [`LoggerConfig`](crate::config::LoggerConfig)
/// from the environment.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("invalid extra-fields flag {0:?}, expected \"1\" or \"0\"")]
    InvalidExtraFields(String),

    #[error("invalid request id header name: {0}")]
    InvalidHeaderName(String),
}
