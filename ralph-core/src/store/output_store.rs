//! Durable output log: one relation per `schema_key` (spec §6: "one SQL
//! table per `schema_key`"), each row keyed by `(run_id, node_id,
//! iteration)` with append-upsert semantics. Column-level flattening of a
//! payload's fields (the rest of §6's "...payload columns...") is not
//! attempted here — the schema catalog's `SchemaType` carries no SQL type
//! information to derive a `CREATE TABLE` column list from, so the payload
//! stays a single JSON column per table; see DESIGN.md.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use super::Db;
use crate::error::{EngineError, Result};

/// Every schema key the catalog declares (`ralph_kernel::schema_catalog`)
/// gets its own table, created up front at `init` time. Table names are
/// never built from caller-supplied strings outside this list.
const SCHEMA_KEYS: &[&str] = &[
    "discover",
    "research",
    "plan",
    "implement",
    "test_results",
    "build_verify",
    "spec_review",
    "code_review",
    "review_fix",
    "report",
    "land",
    "ticket_schedule",
    "merge_queue_result",
    "interpret_config",
    "progress",
    "monitor",
    "category_review",
    "integration_test",
];

fn table_name(schema_key: &str) -> Result<String> {
    if !SCHEMA_KEYS.contains(&schema_key) {
        return Err(EngineError::UnknownSchema {
            schema_key: schema_key.to_string(),
        });
    }
    Ok(format!("output_{schema_key}"))
}

pub fn init(conn: &Connection) -> Result<()> {
    for schema_key in SCHEMA_KEYS {
        let table = table_name(schema_key)?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    run_id TEXT NOT NULL,
                    node_id TEXT NOT NULL,
                    iteration INTEGER NOT NULL,
                    payload TEXT NOT NULL,
                    written_at_ms INTEGER NOT NULL,
                    PRIMARY KEY (run_id, node_id, iteration)
                )"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {table}_latest
                    ON {table} (run_id, node_id, iteration DESC)"
            ),
            [],
        )?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OutputRow {
    pub schema_key: String,
    pub run_id: String,
    pub node_id: String,
    pub iteration: u32,
    pub payload: Value,
}

impl Db {
    /// Upserts by the `(run_id, node_id, iteration)` unique key within the
    /// `schema_key`'s own table. Schema validation happens in
    /// `validator::validate` before this is called — `put` itself never
    /// inspects the payload's shape.
    pub fn put_output(
        &self,
        schema_key: &str,
        run_id: &str,
        node_id: &str,
        iteration: u32,
        payload: &Value,
        written_at_ms: u64,
    ) -> Result<()> {
        let table = table_name(schema_key)?;
        self.with(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (run_id, node_id, iteration, payload, written_at_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT (run_id, node_id, iteration)
                     DO UPDATE SET payload = excluded.payload, written_at_ms = excluded.written_at_ms"
                ),
                params![run_id, node_id, iteration, payload.to_string(), written_at_ms as i64],
            )?;
            Ok(())
        })
    }

    /// The current-iteration accessor.
    pub fn get_exact(
        &self,
        schema_key: &str,
        run_id: &str,
        node_id: &str,
        iteration: u32,
    ) -> Result<Option<OutputRow>> {
        let table = table_name(schema_key)?;
        self.with(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT payload FROM {table}
                         WHERE run_id = ?1 AND node_id = ?2 AND iteration = ?3"
                    ),
                    params![run_id, node_id, iteration],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(row.map(|payload| OutputRow {
                schema_key: schema_key.to_string(),
                run_id: run_id.to_string(),
                node_id: node_id.to_string(),
                iteration,
                payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
            }))
        })
    }

    /// The cross-iteration accessor: the row with the largest iteration for
    /// `(run_id, node_id)`.
    pub fn get_latest(&self, schema_key: &str, run_id: &str, node_id: &str) -> Result<Option<OutputRow>> {
        let table = table_name(schema_key)?;
        self.with(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT iteration, payload FROM {table}
                         WHERE run_id = ?1 AND node_id = ?2
                         ORDER BY iteration DESC LIMIT 1"
                    ),
                    params![run_id, node_id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            Ok(row.map(|(iteration, payload)| OutputRow {
                schema_key: schema_key.to_string(),
                run_id: run_id.to_string(),
                node_id: node_id.to_string(),
                iteration: iteration as u32,
                payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
            }))
        })
    }

    /// Iteration-ascending scan of every row for `(schema_key, run_id)`.
    pub fn scan(&self, schema_key: &str, run_id: &str) -> Result<Vec<OutputRow>> {
        let table = table_name(schema_key)?;
        self.with(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT node_id, iteration, payload FROM {table}
                 WHERE run_id = ?1
                 ORDER BY iteration ASC"
            ))?;
            let rows = stmt
                .query_map(params![run_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows
                .into_iter()
                .map(|(node_id, iteration, payload)| OutputRow {
                    schema_key: schema_key.to_string(),
                    run_id: run_id.to_string(),
                    node_id,
                    iteration: iteration as u32,
                    payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
                })
                .collect())
        })
    }

    /// Scan a schema across every run — used by the durability/resume scan,
    /// which must look at rows from `run_id != currentRun`.
    pub fn scan_all_runs(&self, schema_key: &str) -> Result<Vec<OutputRow>> {
        let table = table_name(schema_key)?;
        self.with(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT run_id, node_id, iteration, payload FROM {table}
                 ORDER BY run_id ASC, iteration ASC"
            ))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows
                .into_iter()
                .map(|(run_id, node_id, iteration, payload)| OutputRow {
                    schema_key: schema_key.to_string(),
                    run_id,
                    node_id,
                    iteration: iteration as u32,
                    payload: serde_json::from_str(&payload).unwrap_or(Value::Null),
                })
                .collect())
        })
    }
}
