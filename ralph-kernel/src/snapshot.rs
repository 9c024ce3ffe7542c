//! The resolved, closure-free tree the reconciler produces from a
//! [`crate::component::Component`], plus the flat list of task descriptors the engine loop
//! dispatches.

use serde::Serialize;
use serde_json::Value;

use crate::component::AgentRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolvedTaskKind {
    Agent { chain_len: usize },
    Compute,
    Static,
}

/// A leaf task ready to be scheduled and dispatched: the resolved output of
/// rendering a `Task` component against a frame context.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    pub id: String,
    pub schema: String,
    pub kind: ResolvedTaskKind,
    pub agent: Option<AgentRef>,
    pub static_payload: Option<Value>,
    pub retries: u32,
    pub timeout_secs: Option<u64>,
    pub continue_on_fail: bool,
    pub iteration: u32,
    pub loop_id: Option<String>,
    pub workspace_id: Option<String>,
    pub skip: bool,
}

/// The rendered tree structure, stripped of closures, that the scheduler
/// walks to determine runnability.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Sequence(Vec<Snapshot>),
    Parallel {
        group: String,
        cap: Option<u32>,
        children: Vec<Snapshot>,
    },
    Loop {
        id: String,
        iteration: u32,
        terminated: bool,
        children: Vec<Snapshot>,
    },
    Task {
        id: String,
        skip: bool,
    },
}

impl Snapshot {
    /// All task node ids appearing anywhere in this snapshot, in document
    /// order. Used to detect orphaned active jobs.
    pub fn task_ids(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_task_ids(&mut out);
        out
    }

    fn collect_task_ids(&self, out: &mut Vec<String>) {
        match self {
            Snapshot::Sequence(children) | Snapshot::Parallel { children, .. } => {
                for child in children {
                    child.collect_task_ids(out);
                }
            }
            Snapshot::Loop { children, .. } => {
                for child in children {
                    child.collect_task_ids(out);
                }
            }
            Snapshot::Task { id, .. } => out.push(id.clone()),
        }
    }
}
