//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Listing-Trawl database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    fetched INTEGER NOT NULL DEFAULT 0,
    scraped INTEGER NOT NULL DEFAULT 0,
    downloaded INTEGER NOT NULL DEFAULT 0
);

-- Harvested listings, append-only across runs
CREATE TABLE IF NOT EXISTS job_descriptions (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL,
    run_id INTEGER REFERENCES runs(id),
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    publication_date TEXT,
    workload TEXT,
    contract_type TEXT,
    salary TEXT,
    languages TEXT,
    place_of_work TEXT,
    saved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_job_descriptions_url ON job_descriptions(url);
CREATE INDEX IF NOT EXISTS idx_job_descriptions_run ON job_descriptions(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
