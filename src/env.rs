/// Environment variable names read by
/// [`LoggerConfig::from_env`](crate::config::LoggerConfig::from_env).
///
/// These are purely helpers; the logger itself never touches the
/// environment after startup.

/// Logger name reported to processors, e.g. `products-api`.
pub const LOGGER_NAME_ENV: &str = "LOGGER_NAME";

/// Severity threshold: a level name (`DEBUG`, `INFO`, `WARNING`, `ERROR`,
/// `CRITICAL`, `AUDIT`) or its number.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// `"1"` passes undeclared fields through, `"0"` drops them.
pub const LOGS_EXTRA_FIELDS_ENV: &str = "LOGS_EXTRA_FIELDS";

/// Header carrying the correlation id in and out of HTTP requests.
pub const LOG_REQUEST_ID_HEADER_ENV: &str = "LOG_REQUEST_ID_HEADER";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
