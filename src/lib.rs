#[macro_use]
mod macros;

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod init;
pub mod logger;
pub mod memory_sink;
pub mod processor;
pub mod record;
pub mod schema;
pub mod severity;
pub mod sink;

#[cfg(feature = "middleware")]
pub mod middleware;

pub use config::{ExtraFields, LoggerConfig};
pub use context::CorrelationContext;
pub use error::{LoggingError, SchemaValidationError, SinkWriteError};
pub use logger::{Emission, StructuredLogger};
pub use record::{AuditEvent, AuditFields, CallSite, DomainEvent, LogRecord, LogType};
pub use severity::Severity;
pub use sink::{JsonSink, LogSink};
