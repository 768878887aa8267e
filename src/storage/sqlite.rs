//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the JobStore trait.
//! Every `save_job` call runs inside one transaction.

use crate::pipeline::{ComponentKey, ComponentOutput, Job, JobId, NewJob, ResultAccumulator, Tier};
use crate::providers::{ProviderError, RetryQueue};
use crate::state::{ComponentProgress, ComponentStatus, JobStatus, Progress};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{JobPatch, JobStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

/// Raw `jobs` row, before enum and timestamp decoding
struct JobRow {
    id: i64,
    root_url: String,
    section_filter: Option<String>,
    tier: String,
    status: String,
    pages_found: i64,
    sitemap_url_count: i64,
    retry_count: u32,
    delay_notice_sent: bool,
    support_alert_sent: bool,
    next_retry_at: Option<String>,
    config_hash: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SqliteJobStore {
    /// Opens (or creates) a job database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }
}

fn encode_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {}", raw, e)))
}

fn decode_optional_time(raw: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(decode_time).transpose()
}

fn insert_job(conn: &Connection, job: &NewJob, now: DateTime<Utc>) -> StorageResult<JobId> {
    let now = encode_time(now);
    conn.execute(
        "INSERT INTO jobs (root_url, section_filter, tier, status, config_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            job.root_url,
            job.section_filter,
            job.tier.as_str(),
            JobStatus::Created.to_db_string(),
            job.config_hash,
            now
        ],
    )?;
    Ok(JobId(conn.last_insert_rowid()))
}

fn read_job(conn: &Connection, id: JobId) -> StorageResult<Option<Job>> {
    let row = conn
        .query_row(
            "SELECT id, root_url, section_filter, tier, status, pages_found, sitemap_url_count,
             retry_count, delay_notice_sent, support_alert_sent, next_retry_at, config_hash,
             created_at, updated_at
             FROM jobs WHERE id = ?1",
            params![id.0],
            |row| {
                Ok(JobRow {
                    id: row.get(0)?,
                    root_url: row.get(1)?,
                    section_filter: row.get(2)?,
                    tier: row.get(3)?,
                    status: row.get(4)?,
                    pages_found: row.get(5)?,
                    sitemap_url_count: row.get(6)?,
                    retry_count: row.get(7)?,
                    delay_notice_sent: row.get(8)?,
                    support_alert_sent: row.get(9)?,
                    next_retry_at: row.get(10)?,
                    config_hash: row.get(11)?,
                    created_at: row.get(12)?,
                    updated_at: row.get(13)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let tier: Tier = row.tier.parse().map_err(StorageError::Corrupt)?;
    let status = JobStatus::from_db_string(&row.status)
        .ok_or_else(|| StorageError::Corrupt(format!("unknown job status '{}'", row.status)))?;

    Ok(Some(Job {
        id: JobId(row.id),
        root_url: row.root_url,
        section_filter: row.section_filter,
        tier,
        status,
        progress: read_progress(conn, id)?,
        results: read_results(conn, id)?,
        pages_found: row.pages_found.max(0) as usize,
        sitemap_url_count: row.sitemap_url_count.max(0) as usize,
        retry_count: row.retry_count,
        delay_notice_sent: row.delay_notice_sent,
        support_alert_sent: row.support_alert_sent,
        next_retry_at: decode_optional_time(row.next_retry_at)?,
        config_hash: row.config_hash,
        created_at: decode_time(&row.created_at)?,
        updated_at: decode_time(&row.updated_at)?,
    }))
}

fn read_progress(conn: &Connection, id: JobId) -> StorageResult<Progress> {
    let mut stmt = conn.prepare(
        "SELECT component, status, retry_count, last_retry_at, last_error, updated_at
         FROM component_progress WHERE job_id = ?1",
    )?;

    let rows = stmt
        .query_map(params![id.0], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut progress = Progress::new();
    for (component, status, retry_count, last_retry_at, last_error, updated_at) in rows {
        let key = ComponentKey::from_db_string(&component)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown component '{}'", component)))?;
        let status = ComponentStatus::from_db_string(&status)
            .ok_or_else(|| StorageError::Corrupt(format!("unknown component status '{}'", status)))?;
        progress.insert(
            key,
            ComponentProgress {
                status,
                retry_count,
                last_retry_at: decode_optional_time(last_retry_at)?,
                last_error,
                updated_at: decode_time(&updated_at)?,
            },
        );
    }

    Ok(progress)
}

fn read_results(conn: &Connection, id: JobId) -> StorageResult<ResultAccumulator> {
    let mut stmt = conn.prepare("SELECT payload FROM component_results WHERE job_id = ?1")?;
    let payloads = stmt
        .query_map(params![id.0], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut results = ResultAccumulator::new();
    for payload in payloads {
        let output: ComponentOutput = serde_json::from_str(&payload)?;
        results.insert(output);
    }
    Ok(results)
}

fn write_job_row(conn: &Connection, job: &Job) -> StorageResult<()> {
    conn.execute(
        "UPDATE jobs SET status = ?1, pages_found = ?2, sitemap_url_count = ?3, retry_count = ?4,
         delay_notice_sent = ?5, support_alert_sent = ?6, next_retry_at = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            job.status.to_db_string(),
            job.pages_found as i64,
            job.sitemap_url_count as i64,
            job.retry_count,
            job.delay_notice_sent,
            job.support_alert_sent,
            job.next_retry_at.map(encode_time),
            encode_time(job.updated_at),
            job.id.0
        ],
    )?;
    Ok(())
}

fn write_progress(
    conn: &Connection,
    id: JobId,
    key: ComponentKey,
    progress: &ComponentProgress,
) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO component_progress
         (job_id, component, status, retry_count, last_retry_at, last_error, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(job_id, component) DO UPDATE SET
            status = excluded.status,
            retry_count = excluded.retry_count,
            last_retry_at = excluded.last_retry_at,
            last_error = excluded.last_error,
            updated_at = excluded.updated_at",
        params![
            id.0,
            key.as_str(),
            progress.status.to_db_string(),
            progress.retry_count,
            progress.last_retry_at.map(encode_time),
            progress.last_error,
            encode_time(progress.updated_at)
        ],
    )?;
    Ok(())
}

fn write_result(
    conn: &Connection,
    id: JobId,
    output: &ComponentOutput,
    at: DateTime<Utc>,
) -> StorageResult<()> {
    let payload = serde_json::to_string(output)?;
    conn.execute(
        "INSERT INTO component_results (job_id, component, payload, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(job_id, component) DO UPDATE SET
            payload = excluded.payload,
            updated_at = excluded.updated_at",
        params![id.0, output.key().as_str(), payload, encode_time(at)],
    )?;
    Ok(())
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create_job(&self, job: NewJob, now: DateTime<Utc>) -> StorageResult<Job> {
        let conn = self.lock()?;
        let id = insert_job(&conn, &job, now)?;
        Ok(job.into_job(id, now))
    }

    async fn load_job(&self, id: JobId) -> StorageResult<Option<Job>> {
        let conn = self.lock()?;
        read_job(&conn, id)
    }

    async fn save_job(&self, id: JobId, patch: &JobPatch) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut job = read_job(&tx, id)?.ok_or(StorageError::JobNotFound(id))?;
        patch.apply_to(&mut job);

        write_job_row(&tx, &job)?;
        for (key, progress) in &patch.progress {
            write_progress(&tx, id, *key, progress)?;
        }
        for output in &patch.results {
            write_result(&tx, id, output, patch.at)?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn due_jobs(&self, now: DateTime<Utc>) -> StorageResult<Vec<JobId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM jobs
             WHERE status NOT IN (?1, ?2)
               AND next_retry_at IS NOT NULL
               AND next_retry_at <= ?3
             ORDER BY next_retry_at, id",
        )?;
        let ids = stmt
            .query_map(
                params![
                    JobStatus::Completed.to_db_string(),
                    JobStatus::Failed.to_db_string(),
                    encode_time(now)
                ],
                |row| row.get::<_, i64>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids.into_iter().map(JobId).collect())
    }
}

#[async_trait]
impl RetryQueue for SqliteJobStore {
    async fn schedule_retry(&self, job: JobId, at: DateTime<Utc>) -> Result<(), ProviderError> {
        let conn = self
            .lock()
            .map_err(|e| ProviderError::Failed(e.to_string()))?;
        conn.execute(
            "UPDATE jobs SET next_retry_at = ?1 WHERE id = ?2",
            params![encode_time(at), job.0],
        )
        .map_err(|e| ProviderError::Failed(e.to_string()))?;
        Ok(())
    }
}
