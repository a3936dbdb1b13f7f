//! SQLite storage implementation
//!
//! `SqliteStore` owns the connection and the run ledger; `SqliteSink` is the
//! relational sink the persister writes through.

use crate::state::ProgressSnapshot;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Sink, SinkError, SinkResult};
use crate::storage::{JobRecord, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    pub fn open(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    // ===== Run Management =====

    pub fn create_run(&mut self, config_hash: &str) -> SinkResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Closes a run with its final status and counters
    pub fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        progress: &ProgressSnapshot,
    ) -> SinkResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, fetched = ?3, scraped = ?4, downloaded = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                progress.fetched as i64,
                progress.scraped as i64,
                progress.downloaded as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(SinkError::RunNotFound(run_id));
        }
        Ok(())
    }

    pub fn get_latest_run(&self) -> SinkResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, fetched, scraped, downloaded
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Failed),
                        fetched: row.get::<_, i64>(5)? as u64,
                        scraped: row.get::<_, i64>(6)? as u64,
                        downloaded: row.get::<_, i64>(7)? as u64,
                    })
                },
            )
            .optional()?;

        Ok(run)
    }

    pub fn count_runs(&self) -> SinkResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Listings =====

    /// Inserts a batch inside one transaction
    pub fn insert_listings(&mut self, records: &[JobRecord], run_id: Option<i64>) -> SinkResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO job_descriptions
                 (record_id, run_id, url, title, publication_date, workload, contract_type,
                  salary, languages, place_of_work, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for record in records {
                stmt.execute(params![
                    record.id as i64,
                    run_id,
                    record.address.as_str(),
                    record.title,
                    record.publication_date,
                    record.workload,
                    record.contract_type,
                    record.salary,
                    record.languages,
                    record.place_of_work,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count_listings(&self) -> SinkResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM job_descriptions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn count_distinct_urls(&self) -> SinkResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT url) FROM job_descriptions",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn stored_urls(&self) -> SinkResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT url FROM job_descriptions")?;
        let urls = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }
}

/// Relational sink over a [`SqliteStore`]
pub struct SqliteSink {
    store: SqliteStore,
    run_id: Option<i64>,
}

impl SqliteSink {
    pub fn new(store: SqliteStore, run_id: Option<i64>) -> Self {
        Self { store, run_id }
    }
}

impl Sink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn append_batch(&mut self, records: &[JobRecord]) -> SinkResult<()> {
        self.store.insert_listings(records, self.run_id)?;
        tracing::info!("Saved {} jobs to SQLite database", records.len());
        Ok(())
    }

    fn known_keys(&self) -> SinkResult<Vec<String>> {
        self.store.stored_urls()
    }
}
