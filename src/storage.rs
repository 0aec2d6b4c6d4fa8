//! Storage module - persistence collaborators for finished sample records

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use std::sync::Arc;

use crate::engine::SampleRecord;
use crate::error::StorageError;

/// Append-only destination for sample records. Runs on the storage thread, never
/// on the tick thread.
pub trait SampleSink: Send {
    fn record(&mut self, sample: SampleRecord) -> Result<(), StorageError>;

    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ============================================================================
// MEMORY SINK
// ============================================================================

/// Keeps every record in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SampleRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SampleRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl SampleSink for MemorySink {
    fn record(&mut self, sample: SampleRecord) -> Result<(), StorageError> {
        self.records.lock().push(sample);
        Ok(())
    }
}

// ============================================================================
// JSON LINES SINK
// ============================================================================

/// Writes one JSON object per record, appending to the file.
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl SampleSink for JsonLinesSink {
    fn record(&mut self, sample: SampleRecord) -> Result<(), StorageError> {
        serde_json::to_writer(&mut self.writer, &sample)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads back the last record of a JSON-lines file written by [`JsonLinesSink`].
/// A missing or empty file yields `None`.
pub fn read_last_record(path: impl AsRef<Path>) -> Result<Option<SampleRecord>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut last = None;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            last = Some(line);
        }
    }
    match last {
        Some(line) => Ok(Some(serde_json::from_str(&line)?)),
        None => Ok(None),
    }
}
