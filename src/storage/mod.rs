//! Storage module for persisting harvested records
//!
//! This module handles:
//! - The `JobRecord` shape shared by every sink
//! - CSV, JSON and SQLite sinks
//! - The batch persister that fans records out to all sinks
//! - Run tracking in the SQLite store

mod csv_sink;
mod json_sink;
mod persister;
mod schema;
mod sqlite;
mod traits;

pub use csv_sink::CsvSink;
pub use json_sink::JsonSink;
pub use persister::{BatchPersister, PersistReport, PersisterHandle, SaveQueue, SinkTally};
pub use sqlite::{SqliteSink, SqliteStore};
pub use traits::{Sink, SinkError, SinkResult};

use crate::config::OutputConfig;
use crate::url::ListingAddress;
use serde::Serialize;

/// Value stored for any field the extractor could not find
pub const SENTINEL: &str = "N/A";

/// Column order shared by the tabular and relational sinks
pub const FIELDS: [&str; 9] = [
    "id",
    "url",
    "title",
    "publication_date",
    "workload",
    "contract_type",
    "salary",
    "languages",
    "place_of_work",
];

/// One harvested listing
///
/// `id` is assigned at scrape time and restarts at 1 with every process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub id: u64,
    #[serde(rename = "url")]
    pub address: ListingAddress,
    pub title: String,
    pub publication_date: String,
    pub workload: String,
    pub contract_type: String,
    pub salary: String,
    pub languages: String,
    pub place_of_work: String,
}

impl JobRecord {
    /// Values in [`FIELDS`] order
    pub fn to_row(&self) -> [String; 9] {
        [
            self.id.to_string(),
            self.address.to_string(),
            self.title.clone(),
            self.publication_date.clone(),
            self.workload.clone(),
            self.contract_type.clone(),
            self.salary.clone(),
            self.languages.clone(),
            self.place_of_work.clone(),
        ]
    }
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub fetched: u64,
    pub scraped: u64,
    pub downloaded: u64,
}

/// Opens the three configured sinks under the data directory
///
/// The SQLite sink writes its rows under `run_id` when one is given.
pub fn open_sinks(output: &OutputConfig, run_id: Option<i64>) -> SinkResult<Vec<Box<dyn Sink>>> {
    std::fs::create_dir_all(&output.data_dir)?;

    let store = SqliteStore::open(&output.database_path())?;

    Ok(vec![
        Box::new(CsvSink::new(output.csv_path())),
        Box::new(JsonSink::new(output.json_path())),
        Box::new(SqliteSink::new(store, run_id)),
    ])
}
