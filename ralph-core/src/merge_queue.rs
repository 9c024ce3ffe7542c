//! The programmatic merge queue coordinator: speculative stacked rebase,
//! parallel CI, eviction, fast-forward. Of the two viable speculative
//! window strategies — agent-driven and programmatic — this
//! implements the programmatic one (see DESIGN.md's Open Question decision);
//! the semantic-review gate is the one optional step left for an agent.

use std::path::Path;

use ralph_kernel::config::OrderingStrategy;
use ralph_kernel::job::Priority;

use crate::error::Result;
use crate::eviction::{self, EvictionContext};
use crate::vcs;
use crate::workspace::WorkspaceManager;

/// One ticket waiting to land.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub ticket_id: String,
    pub branch: String,
    pub priority: Priority,
    /// Snapshot index at enqueue time — used by the `positional` ordering.
    pub position: u64,
    /// The loop iteration the ticket's terminal stage completed at — used
    /// by the `report-complete-FIFO` ordering.
    pub report_iteration: u32,
    pub enqueue_sequence: u64,
}

#[derive(Debug)]
pub enum Resolution {
    Landed { new_mainline_tip: String },
    Evicted { reason: EvictionReason, context: EvictionContext },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    RebaseConflict,
    ReviewFailed,
    CiFailed,
}

/// Per-entry CI outcome fed in by the caller, who actually runs the
/// declared `post_land_checks` inside each entry's ephemeral workspace.
pub struct CiOutcome {
    pub ticket_id: String,
    pub passed: bool,
    pub output: String,
}

/// Optional semantic review verdict for one window entry. `None` means the review gate is disabled for this run.
pub struct ReviewVerdict {
    pub ticket_id: String,
    pub approved: bool,
}

pub struct MergeQueueCoordinator<'a> {
    repo_root: &'a Path,
    main_branch: &'a str,
    window_depth: usize,
    workspaces: &'a WorkspaceManager,
}

impl<'a> MergeQueueCoordinator<'a> {
    pub fn new(
        repo_root: &'a Path,
        main_branch: &'a str,
        window_depth: usize,
        workspaces: &'a WorkspaceManager,
    ) -> Self {
        MergeQueueCoordinator {
            repo_root,
            main_branch,
            window_depth,
            workspaces,
        }
    }

    /// Orders ready tickets by the configured strategy and takes the first
    /// `D` as the speculative window.
    pub fn select_window(
        &self,
        mut ready: Vec<QueueEntry>,
        strategy: OrderingStrategy,
    ) -> Vec<QueueEntry> {
        match strategy {
            OrderingStrategy::PriorityFirst => ready.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.enqueue_sequence.cmp(&b.enqueue_sequence))
            }),
            OrderingStrategy::Fifo => {
                ready.sort_by_key(|e| (e.report_iteration, e.enqueue_sequence))
            }
            OrderingStrategy::TicketOrder => return self.select_window_positional(ready),
        }
        ready.truncate(self.window_depth);
        ready
    }

    /// Orders by snapshot position at enqueue time.
    pub fn select_window_positional(&self, mut ready: Vec<QueueEntry>) -> Vec<QueueEntry> {
        ready.sort_by_key(|e| e.position);
        ready.truncate(self.window_depth);
        ready
    }

    /// Stacked rebase: each window entry onto its
    /// predecessor, entry 0 onto mainline. Returns the index of the first
    /// conflicting entry, if any, and the destination branch each
    /// surviving entry actually landed on top of.
    pub fn stacked_rebase(&self, window: &[QueueEntry]) -> Result<RebaseResult> {
        let mut rebased_onto = Vec::with_capacity(window.len());
        let mut destination = self.main_branch.to_string();

        for (idx, entry) in window.iter().enumerate() {
            let branch_point =
                vcs::merge_base(self.repo_root, &entry.branch, &destination)?;
            match vcs::rebase_branch_onto(
                self.repo_root,
                &entry.branch,
                &destination,
                &destination,
            )? {
                vcs::RebaseOutcome::Replayed { .. } => {
                    rebased_onto.push(destination.clone());
                    destination = entry.branch.clone();
                }
                vcs::RebaseOutcome::Conflict { .. } => {
                    let context = eviction::build(
                        self.repo_root,
                        &entry.branch,
                        self.main_branch,
                        branch_point,
                        None,
                    )?;
                    return Ok(RebaseResult::Conflict { index: idx, context });
                }
            }
        }

        Ok(RebaseResult::AllReplayed { destinations: rebased_onto })
    }

    /// An entry marked not-approved evicts; entries
    /// before it still land; entries after it are invalidated for retry.
    /// Returns the index of the first non-approved entry, if any.
    pub fn apply_review_gate(
        &self,
        window: &[QueueEntry],
        verdicts: &[ReviewVerdict],
    ) -> Option<usize> {
        window.iter().position(|entry| {
            verdicts
                .iter()
                .find(|v| v.ticket_id == entry.ticket_id)
                .is_some_and(|v| !v.approved)
        })
    }

    /// Given each window entry's CI outcome (indices
    /// matching `window`), decides how far to fast-forward mainline and
    /// which entries to evict.
    pub fn resolve_ci_outcomes(
        &self,
        window: &[QueueEntry],
        outcomes: &[CiOutcome],
    ) -> Result<Vec<Resolution>> {
        let first_failure = window.iter().position(|entry| {
            outcomes
                .iter()
                .find(|o| o.ticket_id == entry.ticket_id)
                .is_some_and(|o| !o.passed)
        });

        let mut resolutions = Vec::with_capacity(window.len());

        match first_failure {
            None => {
                if let Some(tail) = window.last() {
                    let tip = vcs::fast_forward_to(self.repo_root, self.main_branch, &tail.branch)?;
                    vcs::push_branch(self.repo_root, self.main_branch)?;
                    for entry in window {
                        self.cleanup(entry)?;
                        resolutions.push(Resolution::Landed { new_mainline_tip: tip.to_string() });
                    }
                }
            }
            Some(0) => {
                let entry = &window[0];
                let failure_output = outcomes
                    .iter()
                    .find(|o| o.ticket_id == entry.ticket_id)
                    .map(|o| o.output.clone());
                let branch_point = vcs::merge_base(self.repo_root, &entry.branch, self.main_branch)?;
                let context = eviction::build(
                    self.repo_root,
                    &entry.branch,
                    self.main_branch,
                    branch_point,
                    failure_output,
                )?;
                resolutions.push(Resolution::Evicted { reason: EvictionReason::CiFailed, context });
            }
            Some(k) => {
                let landed_tail = &window[k - 1];
                let tip = vcs::fast_forward_to(self.repo_root, self.main_branch, &landed_tail.branch)?;
                vcs::push_branch(self.repo_root, self.main_branch)?;
                for entry in &window[..k] {
                    self.cleanup(entry)?;
                    resolutions.push(Resolution::Landed { new_mainline_tip: tip.to_string() });
                }
                let failed = &window[k];
                let failure_output = outcomes
                    .iter()
                    .find(|o| o.ticket_id == failed.ticket_id)
                    .map(|o| o.output.clone());
                let branch_point = vcs::merge_base(self.repo_root, &failed.branch, self.main_branch)?;
                let context = eviction::build(
                    self.repo_root,
                    &failed.branch,
                    self.main_branch,
                    branch_point,
                    failure_output,
                )?;
                resolutions.push(Resolution::Evicted { reason: EvictionReason::CiFailed, context });
                // window[k+1..] are invalidated (not landed, not evicted) — the
                // caller retries them next round without a persisted resolution.
            }
        }

        Ok(resolutions)
    }

    fn cleanup(&self, entry: &QueueEntry) -> Result<()> {
        self.workspaces.destroy(&entry.ticket_id)
    }
}

pub enum RebaseResult {
    AllReplayed { destinations: Vec<String> },
    Conflict { index: usize, context: EvictionContext },
}
