use crate::config::LoggerConfig;
use crate::diagnostics::{DiagnosticChannel, StderrDiagnostics};
use crate::error::ConfigError;
use crate::logger::{Core, EmissionStats, StructuredLogger};
use crate::processor::{Processor, ProcessorChain};
use crate::schema::LogRecordSchema;
use crate::sink::{JsonSink, LogSink};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Assembles a [`StructuredLogger`] from a [`LoggerConfig`].
///
/// **Defaults**
/// - sink: [`JsonSink`] on stdout.
/// - diagnostics: [`StderrDiagnostics`].
/// - processors: [`ProcessorChain::standard`].
///
/// The chain, schema and sink are fixed once `build` returns.
pub struct LoggerBuilder {
    config: LoggerConfig,
    chain: ProcessorChain,
    sink: Option<Arc<dyn LogSink>>,
    diagnostics: Option<Arc<dyn DiagnosticChannel>>,
}

impl LoggerBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        LoggerBuilder {
            config,
            chain: ProcessorChain::standard(),
            sink: None,
            diagnostics: None,
        }
    }

    pub fn sink(self, sink: impl LogSink + 'static) -> Self {
        self.shared_sink(Arc::new(sink))
    }

    pub fn shared_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn diagnostics(mut self, diagnostics: impl DiagnosticChannel + 'static) -> Self {
        self.diagnostics = Some(Arc::new(diagnostics));
        self
    }

    /// Append a processor after the built-in ones.
    pub fn processor(mut self, processor: impl Processor + 'static) -> Self {
        self.chain = self.chain.with(processor);
        self
    }

    /// Replace the whole chain, built-ins included.
    pub fn chain(mut self, chain: ProcessorChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn build(self) -> StructuredLogger {
        let schema = LogRecordSchema::new(self.config.extra_fields);
        StructuredLogger::from_core(Core {
            config: Arc::new(self.config),
            schema,
            chain: self.chain,
            sink: self.sink.unwrap_or_else(|| Arc::new(JsonSink::stdout())),
            diagnostics: self.diagnostics.unwrap_or_else(|| Arc::new(StderrDiagnostics)),
            stats: EmissionStats::default(),
            sink_down: AtomicBool::new(false),
        })
    }
}

/// Build the process logger with default wiring: JSON lines on stdout,
/// fallback diagnostics on stderr, standard processors.
///
/// Call once at startup and hand clones (or [`StructuredLogger::named`]
/// children) to the components that log.
pub fn init_logging(config: LoggerConfig) -> StructuredLogger {
    LoggerBuilder::new(config).build()
}

/// Equivalent to [`init_logging`] with [`LoggerConfig::from_env`].
pub fn init_logging_from_env() -> Result<StructuredLogger, ConfigError> {
    Ok(init_logging(LoggerConfig::from_env()?))
}

/// Install a global `tracing` subscriber printing to stderr, so reports from
/// [`TracingDiagnostics`](crate::diagnostics::TracingDiagnostics) are visible.
///
/// Returns `false` if another global subscriber was already installed.
pub fn init_diagnostics_subscriber() -> bool {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let subscriber = Registry::default().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
