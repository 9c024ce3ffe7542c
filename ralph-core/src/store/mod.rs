//! The two-store persistence layer: a durable,
//! append-upsert output log and a transient active-job queue, both backed
//! by a single rusqlite connection guarded by a `parking_lot::Mutex` so
//! the engine loop and the scheduler-agent bridge can share one handle
//! across async tasks without a full connection pool.

pub mod job_queue;
pub mod output_store;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::Result;

#[derive(Clone)]
pub struct Db(Arc<Mutex<Connection>>);

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        output_store::init(&conn)?;
        job_queue::init(&conn)?;
        Ok(Db(Arc::new(Mutex::new(conn))))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        output_store::init(&conn)?;
        job_queue::init(&conn)?;
        Ok(Db(Arc::new(Mutex::new(conn))))
    }

    pub(crate) fn with<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.0.lock();
        f(&conn)
    }
}
