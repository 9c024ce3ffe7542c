//! The declarative workflow configuration shape.
//! This module only models the shape; loading, defaulting, merging, and
//! validating a concrete `WorkflowConfig` from a `config.toml` lives in
//! `ralph-core::config` where file I/O belongs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderingStrategy {
    Fifo,
    PriorityFirst,
    /// Snapshot-position order at enqueue time (spec §6:
    /// `orderingStrategy ∈ {priority, ticket-order, report-complete-fifo}`).
    TicketOrder,
}

impl Default for OrderingStrategy {
    fn default() -> Self {
        OrderingStrategy::PriorityFirst
    }
}

/// One agent entry in the configured pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub kind: String,
    pub model: String,
    #[serde(default)]
    pub is_scheduler: bool,
    #[serde(default)]
    pub is_merge_queue: bool,
}

/// The full declarative workflow configuration. Field-for-field
/// with what spec.md §6 names; no fields beyond it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub project_name: String,
    pub repo_root: String,
    pub specs_path: String,
    #[serde(default)]
    pub reference_files: Vec<String>,

    /// Ordered `name -> shell command` maps, run in insertion order.
    #[serde(default)]
    pub build_cmds: BTreeMap<String, String>,
    #[serde(default)]
    pub test_cmds: BTreeMap<String, String>,

    #[serde(default)]
    pub pre_land_checks: Vec<String>,
    #[serde(default)]
    pub post_land_checks: Vec<String>,

    #[serde(default)]
    pub code_style: Vec<String>,
    #[serde(default)]
    pub review_checklist: Vec<String>,

    pub max_concurrency: u32,
    pub main_branch: String,
    pub max_speculative_depth: u32,
    #[serde(default)]
    pub ordering_strategy: OrderingStrategy,

    pub agents: Vec<AgentProfile>,
}

impl WorkflowConfig {
    pub fn scheduler_agent(&self) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.is_scheduler)
    }

    pub fn merge_queue_agent(&self) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.is_merge_queue)
    }

    pub fn agent(&self, id: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.id == id)
    }
}
