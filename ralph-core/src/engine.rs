//! The engine loop: render the component tree, schedule the
//! runnable set, dispatch it through the scheduler-agent bridge, persist
//! outputs, advance loops, and repeat until there is nothing left to do.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::Sender;

use ralph_kernel::config::WorkflowConfig;
use ralph_kernel::scheduler::spec::schedule;
use ralph_kernel::scheduler::{GroupConcurrency, NodeFacts};
use ralph_kernel::ticket::{self, ComplexityTier, Stage};

use crate::bridge::Bridge;
use crate::context::ContextAccessor;
use crate::display::ProgressEvent;
use crate::error::{EngineError, Result};
use crate::merge_queue::{CiOutcome, MergeQueueCoordinator, QueueEntry, Resolution};
use crate::reconciler;
use crate::store::Db;
use crate::workflow;
use crate::workspace::WorkspaceManager;

/// Cooperative cancellation flag, checked at frame boundaries. Grants 10
/// seconds of grace for in-flight work to wind down once cancellation is
/// requested, rather than killing agent subprocesses mid-run.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub const GRACE: Duration = Duration::from_secs(10);
}

pub struct Engine {
    db: Db,
    config: WorkflowConfig,
    bridge: Bridge,
    workspaces: WorkspaceManager,
    run_id: String,
    cancel: CancellationToken,
    failure_counts: HashMap<String, u32>,
    iteration: u32,
}

impl Engine {
    pub fn new(
        db: Db,
        config: WorkflowConfig,
        bridge: Bridge,
        workspaces: WorkspaceManager,
        run_id: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Engine {
            db,
            config,
            bridge,
            workspaces,
            run_id: run_id.into(),
            cancel,
            failure_counts: HashMap::new(),
            iteration: 0,
        }
    }

    /// Runs frames until the cancellation token fires or nothing remains
    /// runnable and every known ticket has landed or been evicted (spec
    /// §4.8 step 6 "terminate").
    pub async fn run(&mut self, progress: Option<Sender<ProgressEvent>>) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                tokio::time::sleep(CancellationToken::GRACE).await;
                return Err(EngineError::Cancelled);
            }

            if let Some(tx) = &progress {
                let _ = tx
                    .send(ProgressEvent::FrameStarted {
                        run_id: self.run_id.clone(),
                        frame: self.iteration as u64,
                    })
                    .await;
            }

            let active_jobs = self.db.active_jobs(&self.run_id)?;
            let tree = workflow::build_tree(&self.config, &active_jobs);
            let ctx = ContextAccessor::new(&self.db, self.run_id.clone(), self.iteration);
            let render = reconciler::render(&tree, &ctx);

            let facts = self.gather_facts(&render.tasks, &active_jobs)?;
            let mut groups = GroupConcurrency::new();
            let result = schedule(&render.snapshot, &facts, &mut groups);

            let runnable: Vec<&ralph_kernel::snapshot::TaskDescriptor> = render
                .tasks
                .iter()
                .filter(|t| result.runnable.contains(&t.id))
                .collect();

            let outcomes = self.bridge.dispatch_frame(&runnable, progress.clone()).await;
            for (task, outcome) in runnable.iter().zip(outcomes.iter()) {
                match outcome {
                    Ok(()) => {
                        self.failure_counts.remove(&task.id);
                    }
                    Err(_) => {
                        *self.failure_counts.entry(task.id.clone()).or_insert(0) += 1;
                    }
                }
            }

            for advance in &result.loop_advances {
                if let Some(tx) = &progress {
                    let _ = tx
                        .send(ProgressEvent::LoopAdvanced {
                            loop_id: advance.loop_id.clone(),
                            iteration: advance.completed_iteration,
                        })
                        .await;
                }
            }

            let latest_schedule = ctx.latest("ticket_schedule", "scheduler")?;
            self.bridge
                .reconcile_schedule(latest_schedule.as_ref(), self.iteration)?;

            self.run_merge_queue_pass(progress.clone()).await?;

            if result.runnable.is_empty()
                && result.loop_advances.is_empty()
                && self.db.active_jobs(&self.run_id)?.is_empty()
                && self.all_known_tickets_resolved()?
            {
                if let Some(tx) = &progress {
                    let _ = tx
                        .send(ProgressEvent::RunFinished {
                            run_id: self.run_id.clone(),
                        })
                        .await;
                }
                return Ok(());
            }

            self.iteration += 1;
        }
    }

    fn gather_facts(
        &self,
        tasks: &[ralph_kernel::snapshot::TaskDescriptor],
        active_jobs: &[ralph_kernel::job::ActiveJob],
    ) -> Result<HashMap<String, NodeFacts>> {
        let mut facts = HashMap::new();
        for task in tasks {
            let in_progress = active_jobs.iter().any(|j| j.job_id == task.id);
            // Every task here is rendered fresh once per frame inside the
            // single outer loop, so "output exists" is always scoped to the
            // iteration it was rendered at — the
            // cross-iteration `latest` lookup is for dependency reads via
            // the context accessor, not node-state evaluation.
            let output_exists = self
                .db
                .get_exact(&task.schema, &self.run_id, &task.id, task.iteration)?
                .is_some();
            let failure_count = self.failure_counts.get(&task.id).copied().unwrap_or(0);
            facts.insert(
                task.id.clone(),
                NodeFacts {
                    skip: task.skip,
                    in_progress,
                    output_exists,
                    enclosing_loop_terminated: false,
                    failure_count,
                    retries: task.retries,
                    cancelled: self.cancel.is_cancelled(),
                },
            );
        }
        Ok(facts)
    }

    fn all_known_tickets_resolved(&self) -> Result<bool> {
        Ok(self.ready_tickets()?.is_empty() && self.in_progress_tickets()?.is_empty())
    }

    /// Tickets whose declared tier's stages are all complete and which
    /// haven't landed yet.
    fn ready_tickets(&self) -> Result<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        for (seq, row) in self.db.scan_all_runs("discover")?.into_iter().enumerate() {
            if row.run_id != self.run_id {
                continue;
            }
            let Some(ticket) = parse_ticket(&row.payload) else {
                continue;
            };
            if self.is_landed(&ticket.id)? {
                continue;
            }
            let has_output = |stage: Stage| {
                self.db
                    .get_latest(stage.schema_key(), &self.run_id, &ticket::node_id(&ticket.id, stage))
                    .ok()
                    .flatten()
                    .is_some()
            };
            if !ticket::is_tier_complete(ticket.complexity_tier, has_output) {
                continue;
            }
            let report_iteration = self
                .db
                .get_latest(
                    ticket.complexity_tier.last_stage().schema_key(),
                    &self.run_id,
                    &ticket::node_id(&ticket.id, ticket.complexity_tier.last_stage()),
                )?
                .map(|r| r.iteration)
                .unwrap_or(0);
            entries.push(QueueEntry {
                ticket_id: ticket.id.clone(),
                branch: self.workspaces.branch_name(&ticket.id),
                priority: ticket.priority,
                position: seq as u64,
                report_iteration,
                enqueue_sequence: row.iteration as u64,
            });
        }
        Ok(entries)
    }

    /// Tickets that have been discovered but whose tier is not yet complete
    /// and which haven't landed — used only to decide run termination.
    fn in_progress_tickets(&self) -> Result<Vec<String>> {
        let mut in_progress = Vec::new();
        for row in self.db.scan_all_runs("discover")? {
            if row.run_id != self.run_id {
                continue;
            }
            let Some(ticket) = parse_ticket(&row.payload) else {
                continue;
            };
            if self.is_landed(&ticket.id)? {
                continue;
            }
            let has_output = |stage: Stage| {
                self.db
                    .get_latest(stage.schema_key(), &self.run_id, &ticket::node_id(&ticket.id, stage))
                    .ok()
                    .flatten()
                    .is_some()
            };
            if !ticket::is_tier_complete(ticket.complexity_tier, has_output) {
                in_progress.push(ticket.id);
            }
        }
        Ok(in_progress)
    }

    fn is_landed(&self, ticket_id: &str) -> Result<bool> {
        Ok(self
            .db
            .get_latest("land", &self.run_id, &ticket::node_id(ticket_id, Stage::Land))?
            .is_some_and(|row| row.payload.get("landed").and_then(|v| v.as_bool()).unwrap_or(false)))
    }

    /// Drives one round of the merge queue coordinator over the current
    /// ready-ticket set. A no-op when nothing is ready.
    async fn run_merge_queue_pass(&self, progress: Option<Sender<ProgressEvent>>) -> Result<()> {
        let ready = self.ready_tickets()?;
        if ready.is_empty() {
            return Ok(());
        }

        let coordinator = MergeQueueCoordinator::new(
            self.workspaces.repo_root(),
            &self.config.main_branch,
            self.config.max_speculative_depth as usize,
            &self.workspaces,
        );
        let window = coordinator.select_window(ready, self.config.ordering_strategy);
        if window.is_empty() {
            return Ok(());
        }

        let rebase = coordinator.stacked_rebase(&window)?;
        let surviving_window = match rebase {
            crate::merge_queue::RebaseResult::AllReplayed { .. } => window,
            crate::merge_queue::RebaseResult::Conflict { index, context } => {
                self.persist_eviction(&window[index].ticket_id, "rebase_conflict", &context)?;
                if let Some(tx) = &progress {
                    let _ = tx
                        .send(ProgressEvent::TicketEvicted {
                            ticket_id: window[index].ticket_id.clone(),
                            reason: "rebase_conflict".to_string(),
                        })
                        .await;
                }
                window[..index].to_vec()
            }
        };

        if surviving_window.is_empty() {
            return Ok(());
        }

        let outcomes = self.run_ci(&surviving_window).await?;
        let resolutions = coordinator.resolve_ci_outcomes(&surviving_window, &outcomes)?;

        for (entry, resolution) in surviving_window.iter().zip(resolutions.iter()) {
            match resolution {
                Resolution::Landed { .. } => {
                    self.persist_land(&entry.ticket_id, true, None)?;
                    if let Some(tx) = &progress {
                        let _ = tx
                            .send(ProgressEvent::TicketLanded {
                                ticket_id: entry.ticket_id.clone(),
                            })
                            .await;
                    }
                }
                Resolution::Evicted { reason, context } => {
                    let reason_str = match reason {
                        crate::merge_queue::EvictionReason::RebaseConflict => "rebase_conflict",
                        crate::merge_queue::EvictionReason::ReviewFailed => "review_failed",
                        crate::merge_queue::EvictionReason::CiFailed => "ci_failed",
                    };
                    self.persist_eviction(&entry.ticket_id, reason_str, context)?;
                    if let Some(tx) = &progress {
                        let _ = tx
                            .send(ProgressEvent::TicketEvicted {
                                ticket_id: entry.ticket_id.clone(),
                                reason: reason_str.to_string(),
                            })
                            .await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Runs every declared `post_land_checks` command inside each window
    /// entry's ephemeral workspace.
    async fn run_ci(&self, window: &[QueueEntry]) -> Result<Vec<CiOutcome>> {
        let mut outcomes = Vec::with_capacity(window.len());
        for entry in window {
            let workspace = self.workspaces.ensure(&entry.ticket_id)?;
            let mut passed = true;
            let mut output = String::new();
            for check in &self.config.post_land_checks {
                let mut parts = check.split_whitespace();
                let Some(program) = parts.next() else { continue };
                let status = tokio::process::Command::new(program)
                    .args(parts)
                    .current_dir(&workspace)
                    .output()
                    .await;
                match status {
                    Ok(out) => {
                        output.push_str(&String::from_utf8_lossy(&out.stdout));
                        output.push_str(&String::from_utf8_lossy(&out.stderr));
                        if !out.status.success() {
                            passed = false;
                            break;
                        }
                    }
                    Err(e) => {
                        passed = false;
                        output.push_str(&e.to_string());
                        break;
                    }
                }
            }
            outcomes.push(CiOutcome {
                ticket_id: entry.ticket_id.clone(),
                passed,
                output,
            });
        }
        Ok(outcomes)
    }

    fn persist_land(&self, ticket_id: &str, landed: bool, reason: Option<&str>) -> Result<()> {
        self.db.put_output(
            "land",
            &self.run_id,
            &ticket::node_id(ticket_id, Stage::Land),
            self.iteration,
            &serde_json::json!({
                "landed": landed,
                "evicted": false,
                "reason": reason,
            }),
            now_ms(),
        )
    }

    fn persist_eviction(
        &self,
        ticket_id: &str,
        reason: &str,
        context: &crate::eviction::EvictionContext,
    ) -> Result<()> {
        self.db.put_output(
            "land",
            &self.run_id,
            &ticket::node_id(ticket_id, Stage::Land),
            self.iteration,
            &serde_json::json!({
                "landed": false,
                "evicted": true,
                "reason": reason,
                "branchCommits": context.branch_commits,
                "diffSummary": context.diff_summary,
                "mainlineCommits": context.mainline_commits_since_branch_point,
                "ciOutput": context.ci_output,
            }),
            now_ms(),
        )
    }
}

struct ParsedTicket {
    id: String,
    priority: ralph_kernel::job::Priority,
    complexity_tier: ComplexityTier,
}

fn parse_ticket(payload: &serde_json::Value) -> Option<ParsedTicket> {
    Some(ParsedTicket {
        id: payload.get("id")?.as_str()?.to_string(),
        priority: serde_json::from_value(payload.get("priority")?.clone()).ok()?,
        complexity_tier: serde_json::from_value(payload.get("complexityTier")?.clone()).ok()?,
    })
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
