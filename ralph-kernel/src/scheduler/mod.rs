//! Node-state determination and concurrency-group bookkeeping.

use std::collections::{HashMap, HashSet};

pub mod spec;

pub type NodeId = String;

/// Terminal and non-terminal states a scheduled node can be in.
///
/// Rules:
/// 1. skip predicate holds → `Skipped`
/// 2. attempt in progress → `InProgress`
/// 3. valid output row exists for `(schema, node, iteration)` → `Finished`
/// 4. enclosing loop has terminated → `Skipped`
/// 5. failure count ≥ retries + 1 → `Failed`
/// 6. otherwise → `Pending`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    InProgress,
    Finished,
    Failed,
    Skipped,
    Cancelled,
}

impl NodeState {
    /// Finished, failed, skipped, cancelled — the terminal states every
    /// descendant must reach before a loop advances.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Finished | NodeState::Failed | NodeState::Skipped | NodeState::Cancelled
        )
    }
}

/// Per-node facts the engine gathers from the output store and active-job
/// queue before a frame's scheduling pass. Kept as a plain data struct
/// (rather than a trait the scheduler calls back into) so `evaluate_node`
/// stays a pure function of its inputs.
#[derive(Debug, Clone, Default)]
pub struct NodeFacts {
    pub skip: bool,
    pub in_progress: bool,
    pub output_exists: bool,
    pub enclosing_loop_terminated: bool,
    pub failure_count: u32,
    pub retries: u32,
    pub cancelled: bool,
}

/// Tracks how many children of a concurrency group are currently
/// in-flight against that group's cap. A child counts against its nearest
/// enclosing group.
#[derive(Debug, Clone, Default)]
pub struct GroupConcurrency {
    in_flight: HashMap<String, u32>,
}

impl GroupConcurrency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self, group: &str) -> u32 {
        self.in_flight.get(group).copied().unwrap_or(0)
    }

    pub fn has_capacity(&self, group: &str, cap: Option<u32>) -> bool {
        match cap {
            Some(cap) => self.in_flight(group) < cap,
            None => true,
        }
    }

    pub fn reserve(&mut self, group: &str) {
        *self.in_flight.entry(group.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopAdvance {
    pub loop_id: String,
    pub completed_iteration: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleResult {
    /// Runnable task ids, in the order the tree walk discovered them.
    pub runnable: Vec<NodeId>,
    pub loop_advances: Vec<LoopAdvance>,
    /// Ids scheduling skipped purely because their group was at capacity
    /// this frame — they remain `Pending`, not `Skipped`.
    pub capacity_blocked: HashSet<NodeId>,
}
