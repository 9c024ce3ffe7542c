//! The per-frame read-only context accessor: three distinctly-named
//! lookups over the output store so caller intent is syntactically
//! visible.

use serde_json::Value;

use ralph_kernel::component::FrameContext;

use crate::error::{EngineError, Result};
use crate::store::Db;

pub struct ContextAccessor<'a> {
    db: &'a Db,
    run_id: String,
    current_iteration: u32,
}

impl<'a> ContextAccessor<'a> {
    pub fn new(db: &'a Db, run_id: impl Into<String>, current_iteration: u32) -> Self {
        ContextAccessor {
            db,
            run_id: run_id.into(),
            current_iteration,
        }
    }

    /// Exact lookup; fails with `NotFound` if absent.
    /// Iteration defaults to the current frame's iteration.
    pub fn output(&self, schema: &str, node_id: &str, iteration: Option<u32>) -> Result<Value> {
        self.output_maybe(schema, node_id, iteration)?
            .ok_or_else(|| EngineError::Store {
                detail: format!(
                    "no output row for schema `{schema}` node `{node_id}` iteration {}",
                    iteration.unwrap_or(self.current_iteration)
                ),
            })
    }

    /// Same lookup as [`Self::output`], returning `None` on absence (spec
    /// §4.6 `outputMaybe`). Iteration-scoped — correct for a repeating job
    /// type's own completion check.
    pub fn output_maybe(
        &self,
        schema: &str,
        node_id: &str,
        iteration: Option<u32>,
    ) -> Result<Option<Value>> {
        let iteration = iteration.unwrap_or(self.current_iteration);
        Ok(self
            .db
            .get_exact(schema, &self.run_id, node_id, iteration)?
            .map(|row| row.payload))
    }

    /// Cross-iteration lookup: the row with the maximum iteration for
    /// `(run, node)`. Correct for reading a
    /// dependency stage written in an earlier loop iteration; wrong for a
    /// repeating job's own completion check (it would pin to the first
    /// iteration forever).
    pub fn latest(&self, schema: &str, node_id: &str) -> Result<Option<Value>> {
        Ok(self
            .db
            .get_latest(schema, &self.run_id, node_id)?
            .map(|row| row.payload))
    }

    pub fn current_iteration(&self) -> u32 {
        self.current_iteration
    }
}

impl FrameContext for ContextAccessor<'_> {
    fn output_at(&self, schema: &str, node_id: &str, iteration: u32) -> Option<Value> {
        self.output_maybe(schema, node_id, Some(iteration)).ok().flatten()
    }

    fn latest(&self, schema: &str, node_id: &str) -> Option<Value> {
        ContextAccessor::latest(self, schema, node_id).ok().flatten()
    }

    fn current_iteration(&self) -> u32 {
        self.current_iteration
    }
}
