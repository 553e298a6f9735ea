//! Recorded rows and the [`Recorder`] sink trait.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use engine_component::{Entity, SnapshotRow};
use engine_event::SimTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::codec;
use crate::error::RecordError;

/// One attribute value of one component at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Virtual time of the cycle that produced the row.
    pub time: SimTime,
    /// The owning entity.
    pub entity: Entity,
    /// Component type name.
    pub component: String,
    /// Attribute (field) name.
    pub attribute: String,
    /// The value. Nested structures stay structured.
    pub value: Value,
}

impl Record {
    /// Stamp a snapshot row with `time`.
    #[must_use]
    pub fn from_row(time: SimTime, row: &SnapshotRow) -> Self {
        Self {
            time,
            entity: row.entity,
            component: row.component.to_owned(),
            attribute: row.attribute.clone(),
            value: row.value.clone(),
        }
    }
}

/// A sink for per-cycle snapshots.
pub trait Recorder {
    /// Persist the rows of one cycle.
    ///
    /// # Errors
    ///
    /// Implementation-specific; the coordinator treats any error as fatal.
    fn record(&mut self, time: SimTime, rows: &[SnapshotRow]) -> Result<(), RecordError>;

    /// Push buffered rows to durable storage.
    ///
    /// # Errors
    ///
    /// Implementation-specific.
    fn flush(&mut self) -> Result<(), RecordError> {
        Ok(())
    }
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn record(&mut self, time: SimTime, rows: &[SnapshotRow]) -> Result<(), RecordError> {
        (**self).record(time, rows)
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        (**self).flush()
    }
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    records: Vec<Record>,
    cycles: usize,
}

impl MemoryRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record so far, in arrival order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of cycles recorded.
    #[must_use]
    pub const fn cycles(&self) -> usize {
        self.cycles
    }

    /// Take the records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl Recorder for MemoryRecorder {
    fn record(&mut self, time: SimTime, rows: &[SnapshotRow]) -> Result<(), RecordError> {
        self.records
            .extend(rows.iter().map(|row| Record::from_row(time, row)));
        self.cycles += 1;
        Ok(())
    }
}

/// Appends MessagePack-encoded records to a writer.
///
/// Read the log back with [`read_records`](crate::read_records).
#[derive(Debug)]
pub struct MsgpackRecorder<W: Write> {
    writer: W,
    written: u64,
}

impl MsgpackRecorder<BufWriter<File>> {
    /// Create (or truncate) a log file at `path`.
    ///
    /// # Errors
    ///
    /// [`RecordError::Io`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let file = File::create(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened record log");
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> MsgpackRecorder<W> {
    /// Write records to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of records written.
    #[must_use]
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Recorder for MsgpackRecorder<W> {
    fn record(&mut self, time: SimTime, rows: &[SnapshotRow]) -> Result<(), RecordError> {
        for row in rows {
            let bytes = codec::encode(&Record::from_row(time, row))?;
            self.writer.write_all(&bytes)?;
            self.written += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecordError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::codec::read_records;

    fn rows() -> Vec<SnapshotRow> {
        let e = Entity::from_parts(0, 0);
        vec![
            SnapshotRow {
                entity: e,
                component: "Commandable",
                attribute: "value".into(),
                value: json!("Idling"),
            },
            SnapshotRow {
                entity: e,
                component: "Position",
                attribute: "x".into(),
                value: json!(2.5),
            },
        ]
    }

    fn t(v: f64) -> SimTime {
        SimTime::new(v).unwrap()
    }

    #[test]
    fn test_memory_recorder_stamps_time() {
        let mut recorder = MemoryRecorder::new();
        recorder.record(t(0.0), &rows()).unwrap();
        recorder.record(t(1.5), &rows()[1..]).unwrap();

        assert_eq!(recorder.cycles(), 2);
        let times: Vec<f64> = recorder.records().iter().map(|r| r.time.as_f64()).collect();
        assert_eq!(times, vec![0.0, 0.0, 1.5]);
        assert_eq!(recorder.records()[2].attribute, "x");
    }

    #[test]
    fn test_msgpack_log_reads_back() {
        let mut recorder = MsgpackRecorder::new(Vec::new());
        recorder.record(t(0.0), &rows()).unwrap();
        recorder.record(t(4.0), &rows()).unwrap();
        recorder.flush().unwrap();
        assert_eq!(recorder.written(), 4);

        let records = read_records(recorder.into_inner().as_slice()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0], Record::from_row(t(0.0), &rows()[0]));
        assert_eq!(records[3].time, t(4.0));
        assert_eq!(records[3].value, json!(2.5));
    }

    #[test]
    fn test_boxed_recorder_delegates() {
        let mut recorder: Box<dyn Recorder> = Box::new(MemoryRecorder::new());
        recorder.record(t(0.0), &rows()).unwrap();
        recorder.flush().unwrap();
    }
}
