use crate::error::SinkWriteError;
use crate::record::LogRecord;
use std::io::{self, Write};
use std::sync::Mutex;

/// Destination for validated [`LogRecord`]s.
///
/// Implementations write synchronously; the logger calls `send` on the
/// caller's thread, so a call must not wait on anything slower than a
/// local stream write.
pub trait LogSink: Send + Sync {
    /// Write a single record.
    ///
    /// **Parameters**
    /// - `record`: fully-validated [`LogRecord`] produced by the logger.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was written.
    /// - `Err(..)` if the stream refused it. The logger reports the error
    ///   on its fallback channel and drops the record.
    fn send(&self, record: &LogRecord) -> Result<(), SinkWriteError>;

    /// Flush any buffered output. Default implementation is a no-op.
    fn flush(&self) -> Result<(), SinkWriteError> {
        Ok(())
    }
}

/// Writes each record as one JSON object per line.
///
/// Field order is deterministic (sorted by key). The whole line, including
/// its terminator, is written under one lock so concurrent emissions never
/// interleave partial lines.
pub struct JsonSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonSink<io::Stdout> {
    pub fn stdout() -> Self {
        JsonSink::new(io::stdout())
    }
}

impl JsonSink<io::Stderr> {
    pub fn stderr() -> Self {
        JsonSink::new(io::stderr())
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        JsonSink { writer: Mutex::new(writer) }
    }

    /// Serialize `record` into a newline-terminated buffer.
    pub fn encode(record: &LogRecord) -> Result<Vec<u8>, SinkWriteError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        Ok(line)
    }

    pub fn into_inner(self) -> Result<W, SinkWriteError> {
        self.writer.into_inner().map_err(|_| SinkWriteError::Poisoned)
    }
}

impl<W: Write + Send> LogSink for JsonSink<W> {
    fn send(&self, record: &LogRecord) -> Result<(), SinkWriteError> {
        let line = Self::encode(record)?;
        let mut writer = self.writer.lock().map_err(|_| SinkWriteError::Poisoned)?;
        writer.write_all(&line)?;
        writer.flush()?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkWriteError> {
        let mut writer = self.writer.lock().map_err(|_| SinkWriteError::Poisoned)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogType;
    use crate::severity::Severity;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    fn record() -> LogRecord {
        let fields: BTreeMap<String, Value> = serde_json::from_value(json!({
            "log_type": "DOMAIN",
            "event": "product_created",
            "request_id": "r1",
        }))
        .unwrap();
        LogRecord::new(LogType::Domain, Severity::Info, fields)
    }

    #[test]
    fn writes_one_sorted_json_line_per_record() {
        let sink = JsonSink::new(Vec::new());
        sink.send(&record()).unwrap();
        sink.send(&record()).unwrap();
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"event":"product_created","log_type":"DOMAIN","request_id":"r1"}"#
        );
        assert!(out.ends_with('\n'));
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_stream_surfaces_io_error() {
        let sink = JsonSink::new(BrokenPipe);
        match sink.send(&record()) {
            Err(SinkWriteError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
