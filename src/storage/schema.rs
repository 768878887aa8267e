//! Database schema definitions and migrations
//!
//! This module contains all SQL schema definitions for the Site-Audit database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per audit
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_url TEXT NOT NULL,
    section_filter TEXT,
    tier TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_found INTEGER NOT NULL DEFAULT 0,
    sitemap_url_count INTEGER NOT NULL DEFAULT 0,
    retry_count INTEGER NOT NULL DEFAULT 0,
    delay_notice_sent INTEGER NOT NULL DEFAULT 0,
    support_alert_sent INTEGER NOT NULL DEFAULT 0,
    next_retry_at TEXT,
    config_hash TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_jobs_next_retry ON jobs(next_retry_at);

-- Per-component status of each job
CREATE TABLE IF NOT EXISTS component_progress (
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    component TEXT NOT NULL,
    status TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    last_retry_at TEXT,
    last_error TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (job_id, component)
);

-- Per-component output of each job, as JSON
CREATE TABLE IF NOT EXISTS component_results (
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    component TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (job_id, component)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["jobs", "component_progress", "component_results"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
