//! Fallback channel for failures of the logging core itself.
//!
//! Kept apart from the structured sink so a broken sink or an invalid
//! record can still be noticed by an operator.

use std::sync::{Arc, Mutex};

use crate::error::LoggingError;

/// Receives errors that stopped an emission.
pub trait DiagnosticChannel: Send + Sync {
    /// `logger` is the name of the logger whose emission failed.
    fn report(&self, logger: &str, error: &LoggingError);
}

/// One plain line on stderr per report.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrDiagnostics;

impl DiagnosticChannel for StderrDiagnostics {
    fn report(&self, logger: &str, error: &LoggingError) {
        eprintln!("structured logging failure in logger `{logger}`: {error}");
    }
}

/// Reports as `tracing` events on target `structured_audit_log::fallback`.
///
/// Pair with [`init_diagnostics_subscriber`](crate::init::init_diagnostics_subscriber)
/// or any subscriber the application already installs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticChannel for TracingDiagnostics {
    fn report(&self, logger: &str, error: &LoggingError) {
        match error {
            LoggingError::Schema(e) => tracing::error!(
                target: "structured_audit_log::fallback",
                logger,
                field = e.field(),
                error = %e,
                "log record rejected by schema"
            ),
            LoggingError::Sink(e) => tracing::error!(
                target: "structured_audit_log::fallback",
                logger,
                error = %e,
                "log sink write failed"
            ),
            LoggingError::Processor(e) => tracing::error!(
                target: "structured_audit_log::fallback",
                logger,
                processor = e.processor,
                error = %e,
                "log processor aborted emission"
            ),
        }
    }
}

/// Keeps reports in memory as display strings, for tests.
#[derive(Debug, Clone, Default)]
pub struct CollectingDiagnostics {
    reports: Arc<Mutex<Vec<String>>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl DiagnosticChannel for CollectingDiagnostics {
    fn report(&self, logger: &str, error: &LoggingError) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(format!("{logger}: {error}"));
        }
    }
}
