//! Transient active-job queue: run-scoped, insert-if-absent / remove /
//! scan-ordered.

use rusqlite::{Connection, OptionalExtension, params};

use ralph_kernel::job::{ActiveJob, JobType};

use super::Db;
use crate::error::Result;

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS active_jobs (
            run_id TEXT NOT NULL,
            job_id TEXT NOT NULL,
            job_type TEXT NOT NULL,
            agent_id TEXT NOT NULL,
            ticket_id TEXT,
            focus_id TEXT,
            created_at_ms INTEGER NOT NULL,
            PRIMARY KEY (run_id, job_id)
        )",
        [],
    )?;
    Ok(())
}

impl Db {
    /// Inserts the job only if `(run_id, job_id)` is absent; a pre-existing
    /// job is left untouched and reported back unchanged.
    pub fn insert_job_if_absent(&self, run_id: &str, job: ActiveJob) -> Result<ActiveJob> {
        self.with(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO active_jobs
                    (run_id, job_id, job_type, agent_id, ticket_id, focus_id, created_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    run_id,
                    job.job_id,
                    job.job_type.to_string(),
                    job.agent_id,
                    job.ticket_id,
                    job.focus_id,
                    job.created_at_ms as i64,
                ],
            )?;
            row_by_id(conn, run_id, &job.job_id)?.ok_or_else(|| {
                crate::error::EngineError::Store {
                    detail: format!("job `{}` missing immediately after insert", job.job_id),
                }
            })
        })
    }

    pub fn remove_job(&self, run_id: &str, job_id: &str) -> Result<()> {
        self.with(|conn| {
            conn.execute(
                "DELETE FROM active_jobs WHERE run_id = ?1 AND job_id = ?2",
                params![run_id, job_id],
            )?;
            Ok(())
        })
    }

    /// Every active job for `run_id`, oldest-first.
    pub fn active_jobs(&self, run_id: &str) -> Result<Vec<ActiveJob>> {
        self.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT job_id, job_type, agent_id, ticket_id, focus_id, created_at_ms
                 FROM active_jobs WHERE run_id = ?1 ORDER BY created_at_ms ASC",
            )?;
            let jobs = stmt
                .query_map(params![run_id], row_to_job)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(jobs)
        })
    }
}

fn row_by_id(conn: &Connection, run_id: &str, job_id: &str) -> Result<Option<ActiveJob>> {
    Ok(conn
        .query_row(
            "SELECT job_id, job_type, agent_id, ticket_id, focus_id, created_at_ms
             FROM active_jobs WHERE run_id = ?1 AND job_id = ?2",
            params![run_id, job_id],
            row_to_job,
        )
        .optional()?)
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActiveJob> {
    let job_type_raw: String = row.get(1)?;
    let job_type: JobType = job_type_raw.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            "unrecognized job_type".into(),
        )
    })?;
    Ok(ActiveJob {
        job_id: row.get(0)?,
        job_type,
        agent_id: row.get(2)?,
        ticket_id: row.get(3)?,
        focus_id: row.get(4)?,
        created_at_ms: row.get::<_, i64>(5)? as u64,
    })
}
