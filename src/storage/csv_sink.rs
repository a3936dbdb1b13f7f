//! Tabular sink

use crate::storage::traits::{Sink, SinkResult};
use crate::storage::{JobRecord, FIELDS};
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Appends records to a CSV file
///
/// The header row is written only when the file is new or empty, so the file
/// keeps growing across runs.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Sink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn append_batch(&mut self, records: &[JobRecord]) -> SinkResult<()> {
        let is_empty = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            writer.write_record(FIELDS)?;
        }

        for record in records {
            writer.write_record(record.to_row())?;
        }

        writer.flush()?;
        tracing::info!("Saved {} jobs to CSV: {}", records.len(), self.path.display());
        Ok(())
    }
}
