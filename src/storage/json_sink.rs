//! Document sink

use crate::storage::traits::{Sink, SinkResult};
use crate::storage::JobRecord;
use serde_json::Value;
use std::path::PathBuf;

/// Keeps all records in one JSON array file
///
/// Every batch reads the existing array, extends it and rewrites the file.
/// A file that does not parse as an array is replaced.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_existing(&self) -> SinkResult<Vec<Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(existing) => Ok(existing),
            Err(e) => {
                tracing::warn!(
                    "Corrupt JSON file {} ({}), resetting it",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }
}

impl Sink for JsonSink {
    fn name(&self) -> &str {
        "json"
    }

    fn append_batch(&mut self, records: &[JobRecord]) -> SinkResult<()> {
        let mut data = self.load_existing()?;
        for record in records {
            data.push(serde_json::to_value(record)?);
        }

        let body = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.path, body)?;

        tracing::info!("Saved {} jobs to JSON: {}", records.len(), self.path.display());
        Ok(())
    }
}
