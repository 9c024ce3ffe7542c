//! Scheduler-Agent bridge: dispatches runnable task descriptors, reaps
//! finished/failed agent invocations, and keeps the active-job queue in
//! sync with the output store.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::Sender;

use ralph_kernel::job::{ActiveJob, JobType};
use ralph_kernel::schema_catalog::SchemaCatalog;
use ralph_kernel::snapshot::{ResolvedTaskKind, TaskDescriptor};
use ralph_kernel::ticket::{self, Stage};

use crate::agent::{AgentPool, AgentRequest};
use crate::display::ProgressEvent;
use crate::error::Result;
use crate::store::Db;
use crate::validator;

pub struct Bridge {
    db: Db,
    catalog: Arc<SchemaCatalog>,
    agents: Arc<AgentPool>,
    run_id: String,
    repo_root: PathBuf,
}

impl Bridge {
    pub fn new(
        db: Db,
        catalog: Arc<SchemaCatalog>,
        agents: Arc<AgentPool>,
        run_id: impl Into<String>,
        repo_root: PathBuf,
    ) -> Self {
        Bridge {
            db,
            catalog,
            agents,
            run_id: run_id.into(),
            repo_root,
        }
    }

    /// Dispatches every task in `runnable` concurrently, awaiting all of
    /// them before returning.
    pub async fn dispatch_frame(
        &self,
        runnable: &[&TaskDescriptor],
        progress: Option<Sender<ProgressEvent>>,
    ) -> Vec<Result<()>> {
        let mut handles = Vec::new();
        for task in runnable {
            let task = (*task).clone_for_dispatch();
            let bridge = self.clone_light();
            let progress = progress.clone();
            handles.push(tokio::spawn(async move { bridge.dispatch_one(&task, progress).await }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|e| {
                Err(crate::error::EngineError::Store {
                    detail: format!("dispatch task panicked: {e}"),
                })
            }));
        }
        results
    }

    fn clone_light(&self) -> Self {
        Bridge {
            db: self.db.clone(),
            catalog: self.catalog.clone(),
            agents: self.agents.clone(),
            run_id: self.run_id.clone(),
            repo_root: self.repo_root.clone(),
        }
    }

    async fn dispatch_one(
        &self,
        task: &DispatchTask,
        progress: Option<Sender<ProgressEvent>>,
    ) -> Result<()> {
        let job_id = task.id.clone();
        self.db.insert_job_if_absent(
            &self.run_id,
            ActiveJob {
                job_id: job_id.clone(),
                job_type: job_type_for(&task.id),
                agent_id: task.agent_label(),
                ticket_id: ticket_id_for(&task.id),
                focus_id: None,
                created_at_ms: now_ms(),
            },
        )?;

        if let Some(tx) = &progress {
            let _ = tx
                .send(ProgressEvent::NodeDispatched {
                    node_id: task.id.clone(),
                    agent_id: task.agent_label(),
                })
                .await;
        }

        let outcome = self.run_task(task, progress.clone()).await;
        self.db.remove_job(&self.run_id, &job_id)?;

        match &outcome {
            Ok(()) => {
                if let Some(tx) = &progress {
                    let _ = tx
                        .send(ProgressEvent::NodeFinished { node_id: task.id.clone() })
                        .await;
                }
            }
            Err(err) => {
                if let Some(tx) = &progress {
                    let _ = tx
                        .send(ProgressEvent::NodeFailed {
                            node_id: task.id.clone(),
                            detail: err.to_string(),
                        })
                        .await;
                }
            }
        }
        outcome
    }

    async fn run_task(&self, task: &DispatchTask, progress: Option<Sender<ProgressEvent>>) -> Result<()> {
        if task.skip {
            return Ok(());
        }

        let payload = match &task.kind {
            ResolvedTaskKind::Static => task
                .static_payload
                .clone()
                .unwrap_or(serde_json::Value::Null),
            ResolvedTaskKind::Compute => task
                .static_payload
                .clone()
                .unwrap_or(serde_json::Value::Null),
            ResolvedTaskKind::Agent { .. } => {
                let Some(agent_ref) = &task.agent else {
                    return Err(crate::error::EngineError::Store {
                        detail: format!("task `{}` declared Agent kind with no AgentRef", task.id),
                    });
                };
                let cwd = task
                    .workspace_id
                    .as_ref()
                    .map(|_| self.repo_root.clone())
                    .unwrap_or_else(|| self.repo_root.clone());
                let prompt = self.render_prompt(task)?;
                let request = AgentRequest {
                    prompt,
                    cwd,
                    timeout: task.timeout_secs.map(std::time::Duration::from_secs),
                };
                let response = self
                    .agents
                    .invoke(agent_ref, request, task.retries, &self.catalog, &task.schema, progress)
                    .await?;
                response.payload
            }
        };

        validator::validate(&self.catalog, &task.schema, &payload)?;
        self.db.put_output(
            &task.schema,
            &self.run_id,
            &task.id,
            task.iteration,
            &payload,
            now_ms(),
        )?;
        Ok(())
    }

    /// Renders `task`'s prompt, appending the eviction context from the
    /// ticket's latest `land` row when this is a Research/Plan/Implement
    /// task on the iteration following an eviction (spec §4.14, testable
    /// property #8): the agent sees exactly what the branch tried to land,
    /// the diff, and what mainline did instead — plus the CI failure output
    /// when the eviction was `ci_failed`.
    fn render_prompt(&self, task: &DispatchTask) -> Result<String> {
        let mut prompt = task.prompt.clone().unwrap_or_default();

        let feedback_stage = matches!(task_stage(&task.id), Some(Stage::Research | Stage::Plan | Stage::Implement));
        if feedback_stage && let Some(ticket_id) = ticket_id_for(&task.id) {
            let land_node_id = ticket::node_id(&ticket_id, Stage::Land);
            if let Some(row) = self.db.get_latest("land", &self.run_id, &land_node_id)?
                && row.payload.get("evicted").and_then(|v| v.as_bool()).unwrap_or(false)
            {
                prompt.push_str("\n\n");
                prompt.push_str(&format_eviction_feedback(&row.payload));
            }
        }

        Ok(prompt)
    }
}

/// Formats a `land` row's eviction artifacts into a prompt block.
fn format_eviction_feedback(land_payload: &serde_json::Value) -> String {
    let mut block = String::from(
        "The previous attempt to land this ticket was evicted from the merge queue. \
         Here is the diagnostic context from that attempt:\n",
    );

    if let Some(reason) = land_payload.get("reason").and_then(|v| v.as_str()) {
        block.push_str(&format!("Eviction reason: {reason}\n"));
    }
    if let Some(commits) = land_payload.get("branchCommits").and_then(|v| v.as_array()) {
        block.push_str("Branch commits:\n");
        for commit in commits {
            if let Some(s) = commit.as_str() {
                block.push_str(&format!("  - {s}\n"));
            }
        }
    }
    if let Some(diff) = land_payload.get("diffSummary").and_then(|v| v.as_array()) {
        block.push_str("Diff summary:\n");
        for line in diff {
            if let Some(s) = line.as_str() {
                block.push_str(&format!("  {s}\n"));
            }
        }
    }
    if let Some(mainline) = land_payload.get("mainlineCommits").and_then(|v| v.as_array()) {
        block.push_str("Mainline commits since the branch point:\n");
        for commit in mainline {
            if let Some(s) = commit.as_str() {
                block.push_str(&format!("  - {s}\n"));
            }
        }
    }
    if let Some(ci_output) = land_payload.get("ciOutput").and_then(|v| v.as_str()) {
        block.push_str("CI failure output:\n");
        block.push_str(ci_output);
        block.push('\n');
    }

    block
}

fn task_stage(node_id: &str) -> Option<Stage> {
    node_id.split_once(':').and_then(|(_, stage)| parse_stage(stage))
}

/// A plain-data copy of a [`TaskDescriptor`] safe to move into a spawned
/// task; also carries the rendered prompt text for agent dispatch.
#[derive(Clone)]
struct DispatchTask {
    id: String,
    schema: String,
    kind: ResolvedTaskKind,
    agent: Option<ralph_kernel::component::AgentRef>,
    static_payload: Option<serde_json::Value>,
    retries: u32,
    timeout_secs: Option<u64>,
    #[allow(dead_code)]
    continue_on_fail: bool,
    iteration: u32,
    workspace_id: Option<String>,
    skip: bool,
    prompt: Option<String>,
}

impl DispatchTask {
    fn agent_label(&self) -> String {
        self.agent
            .as_ref()
            .map(|a| a.for_attempt(0).to_string())
            .unwrap_or_else(|| "compute".to_string())
    }
}

trait CloneForDispatch {
    fn clone_for_dispatch(self) -> DispatchTask;
}

impl CloneForDispatch for TaskDescriptor {
    fn clone_for_dispatch(self) -> DispatchTask {
        DispatchTask {
            id: self.id,
            schema: self.schema,
            kind: self.kind,
            agent: self.agent,
            static_payload: self.static_payload,
            retries: self.retries,
            timeout_secs: self.timeout_secs,
            continue_on_fail: self.continue_on_fail,
            iteration: self.iteration,
            workspace_id: self.workspace_id,
            skip: self.skip,
            prompt: None,
        }
    }
}

/// One entry of the scheduler agent's `ticket_schedule` output (spec
/// §4.11: "a list of jobs (type, agent id, ticket id, focus id, reason)").
#[derive(Debug, Clone, serde::Deserialize)]
struct ScheduledJob {
    #[serde(rename = "type")]
    job_type: String,
    #[serde(rename = "agentId")]
    agent_id: String,
    #[serde(rename = "ticketId", default)]
    ticket_id: Option<String>,
    #[serde(rename = "focusId", default)]
    focus_id: Option<String>,
}

impl Bridge {
    /// Runs the scheduler-agent bridge's reap + reconcile pass (spec
    /// §4.11). `schedule` is the latest `ticket_schedule` payload, or
    /// `None` if the scheduler task hasn't produced one yet this run.
    pub fn reconcile_schedule(
        &self,
        schedule: Option<&serde_json::Value>,
        current_iteration: u32,
    ) -> Result<()> {
        self.reap_finished_jobs(current_iteration)?;
        if let Some(schedule) = schedule {
            self.insert_scheduled_jobs(schedule, current_iteration)?;
        }
        Ok(())
    }

    /// Reap: delete any active job whose corresponding output now exists.
    /// Repeating job types (discovery, progress-update) are checked with
    /// the iteration-scoped lookup so they can be rescheduled on a later
    /// loop pass; one-shot per-ticket stages use the cross-iteration
    /// lookup.
    fn reap_finished_jobs(&self, current_iteration: u32) -> Result<()> {
        for job in self.db.active_jobs(&self.run_id)? {
            let node_id = node_id_for_job(&job);
            let schema = job.job_type.schema_key();
            let output_exists = if job.job_type.is_repeating() {
                self.db
                    .get_exact(schema, &self.run_id, &node_id, current_iteration)?
                    .is_some()
            } else {
                self.db.get_latest(schema, &self.run_id, &node_id)?.is_some()
            };
            if output_exists {
                self.db.remove_job(&self.run_id, &job.job_id)?;
            }
        }
        Ok(())
    }

    /// Reconcile: insert-if-absent every job named in the latest schedule
    /// that has no output yet. Repeating job types
    /// (discovery, progress-update) check completion with the
    /// iteration-scoped lookup so they can be rescheduled on a later loop
    /// pass; one-shot per-ticket stages use the cross-iteration lookup.
    fn insert_scheduled_jobs(&self, schedule: &serde_json::Value, current_iteration: u32) -> Result<()> {
        let Some(jobs) = schedule.get("jobs").and_then(|v| v.as_array()) else {
            return Ok(());
        };
        for raw in jobs {
            let Ok(job) = serde_json::from_value::<ScheduledJob>(raw.clone()) else {
                continue;
            };
            let Ok(job_type) = job.job_type.parse::<JobType>() else {
                continue;
            };
            let node_id = node_id_for(&job_type, job.ticket_id.as_deref());
            let output_exists = if job_type.is_repeating() {
                self.db
                    .get_exact(job_type.schema_key(), &self.run_id, &node_id, current_iteration)?
                    .is_some()
            } else {
                self.db
                    .get_latest(job_type.schema_key(), &self.run_id, &node_id)?
                    .is_some()
            };
            if output_exists {
                continue;
            }
            self.db.insert_job_if_absent(
                &self.run_id,
                ActiveJob {
                    job_id: node_id,
                    job_type,
                    agent_id: job.agent_id,
                    ticket_id: job.ticket_id,
                    focus_id: job.focus_id,
                    created_at_ms: now_ms(),
                },
            )?;
        }
        Ok(())
    }
}

fn node_id_for_job(job: &ActiveJob) -> String {
    node_id_for(&job.job_type, job.ticket_id.as_deref())
}

fn node_id_for(job_type: &JobType, ticket_id: Option<&str>) -> String {
    match (job_type, ticket_id) {
        (JobType::Ticket(stage), Some(ticket)) => format!("{ticket}:{}", stage.as_str()),
        _ => job_type.to_string(),
    }
}

fn job_type_for(node_id: &str) -> JobType {
    if let Some((_, stage)) = node_id.split_once(':')
        && let Some(stage) = parse_stage(stage)
    {
        return JobType::Ticket(stage);
    }
    match node_id {
        "discovery" => JobType::Discovery,
        "progress-update" => JobType::ProgressUpdate,
        "codebase-review" => JobType::CodebaseReview,
        "integration-test" => JobType::IntegrationTest,
        _ => JobType::Discovery,
    }
}

fn parse_stage(raw: &str) -> Option<Stage> {
    Some(match raw {
        "research" => Stage::Research,
        "plan" => Stage::Plan,
        "implement" => Stage::Implement,
        "test" => Stage::Test,
        "build-verify" => Stage::BuildVerify,
        "spec-review" => Stage::SpecReview,
        "code-review" => Stage::CodeReview,
        "review-fix" => Stage::ReviewFix,
        "report" => Stage::Report,
        "land" => Stage::Land,
        _ => return None,
    })
}

fn ticket_id_for(node_id: &str) -> Option<String> {
    node_id.split_once(':').map(|(ticket, _)| ticket.to_string())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(db: Db) -> Bridge {
        Bridge::new(
            db,
            Arc::new(SchemaCatalog::builtin()),
            Arc::new(AgentPool::new(vec![])),
            "run-1",
            PathBuf::from("."),
        )
    }

    fn dispatch_task(id: &str) -> DispatchTask {
        DispatchTask {
            id: id.to_string(),
            schema: "implement".to_string(),
            kind: ResolvedTaskKind::Agent { chain_len: 1 },
            agent: None,
            static_payload: None,
            retries: 0,
            timeout_secs: None,
            continue_on_fail: false,
            iteration: 1,
            workspace_id: None,
            skip: false,
            prompt: Some("implement the ticket".to_string()),
        }
    }

    #[test]
    fn prompt_gains_eviction_feedback_after_an_eviction() {
        let db = Db::open_in_memory().unwrap();
        db.put_output(
            "land",
            "run-1",
            "T-1:land",
            0,
            &serde_json::json!({
                "landed": false,
                "evicted": true,
                "reason": "ci_failed",
                "branchCommits": ["T-1: add feature"],
                "diffSummary": ["src/lib.rs | 2 ++"],
                "mainlineCommits": ["unrelated: fix typo"],
                "ciOutput": "test failed: assertion mismatch",
            }),
            0,
        )
        .unwrap();

        let bridge = bridge(db);
        let task = dispatch_task("T-1:implement");
        let prompt = bridge.render_prompt(&task).unwrap();

        assert!(prompt.starts_with("implement the ticket"));
        assert!(prompt.contains("ci_failed"));
        assert!(prompt.contains("T-1: add feature"));
        assert!(prompt.contains("unrelated: fix typo"));
        assert!(prompt.contains("test failed: assertion mismatch"));
    }

    #[test]
    fn prompt_is_unchanged_with_no_prior_eviction() {
        let db = Db::open_in_memory().unwrap();
        let bridge = bridge(db);
        let task = dispatch_task("T-2:implement");
        let prompt = bridge.render_prompt(&task).unwrap();
        assert_eq!(prompt, "implement the ticket");
    }

    #[test]
    fn non_pipeline_stages_never_get_eviction_feedback() {
        let db = Db::open_in_memory().unwrap();
        db.put_output(
            "land",
            "run-1",
            "T-3:land",
            0,
            &serde_json::json!({"landed": false, "evicted": true, "reason": "ci_failed"}),
            0,
        )
        .unwrap();
        let bridge = bridge(db);
        let mut task = dispatch_task("T-3:test");
        task.schema = "test_results".to_string();
        let prompt = bridge.render_prompt(&task).unwrap();
        assert_eq!(prompt, "implement the ticket");
    }
}
