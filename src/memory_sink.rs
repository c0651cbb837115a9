use crate::error::SinkWriteError;
use crate::record::LogRecord;
use crate::sink::{JsonSink, LogSink};
use std::sync::{Arc, Mutex};

/// A sink that keeps every record in memory.
///
/// Useful for unit tests and demos that want to inspect exactly what would
/// have been written. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records rendered the way [`JsonSink`] would write them, without the
    /// line terminator.
    pub fn lines(&self) -> Vec<String> {
        self.records()
            .iter()
            .filter_map(|r| JsonSink::<Vec<u8>>::encode(r).ok())
            .filter_map(|bytes| String::from_utf8(bytes).ok())
            .map(|line| line.trim_end().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn send(&self, record: &LogRecord) -> Result<(), SinkWriteError> {
        let mut records = self.records.lock().map_err(|_| SinkWriteError::Poisoned)?;
        records.push(record.clone());
        Ok(())
    }
}
