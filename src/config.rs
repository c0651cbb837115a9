use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::env::{env_or, LOGGER_NAME_ENV, LOGS_EXTRA_FIELDS_ENV, LOG_LEVEL_ENV, LOG_REQUEST_ID_HEADER_ENV};
use crate::error::ConfigError;
use crate::severity::Severity;

pub const DEFAULT_LOGGER_NAME: &str = "app";
pub const DEFAULT_REQUEST_ID_HEADER: &str = "x-request-id";

/// What happens to fields outside a record's declared shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtraFields {
    /// Pass them through to the output.
    Allow,
    /// Drop them before validation.
    #[default]
    Ignore,
}

impl FromStr for ExtraFields {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(ExtraFields::Allow),
            "0" => Ok(ExtraFields::Ignore),
            other => Err(ConfigError::InvalidExtraFields(other.to_string())),
        }
    }
}

/// Process-wide logging configuration.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards.
///
/// **Fields**
/// - `logger_name`: name handed to processors for the root logger.
/// - `level`: severity threshold of the root logger.
/// - `extra_fields`: extensibility policy for undeclared fields.
/// - `request_id_header`: header the HTTP layer reads the correlation id
///   from and writes it back to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub logger_name: String,
    pub level: Severity,
    pub extra_fields: ExtraFields,
    pub request_id_header: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            logger_name: DEFAULT_LOGGER_NAME.to_string(),
            level: Severity::Info,
            extra_fields: ExtraFields::Ignore,
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
        }
    }
}

impl LoggerConfig {
    /// Build a config from the variables in [`crate::env`], defaulting
    /// anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = LoggerConfig::default();
        let level = env_or(LOG_LEVEL_ENV, defaults.level.name()).parse()?;
        let extra_fields = env_or(LOGS_EXTRA_FIELDS_ENV, "0").parse()?;
        let request_id_header = env_or(LOG_REQUEST_ID_HEADER_ENV, &defaults.request_id_header);
        http::HeaderName::from_bytes(request_id_header.as_bytes())
            .map_err(|_| ConfigError::InvalidHeaderName(request_id_header.clone()))?;

        Ok(LoggerConfig {
            logger_name: env_or(LOGGER_NAME_ENV, &defaults.logger_name),
            level,
            extra_fields,
            request_id_header: request_id_header.to_ascii_lowercase(),
        })
    }
}
