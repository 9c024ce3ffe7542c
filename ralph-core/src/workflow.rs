//! Builds the concrete [`Component`] tree for one frame: the fixed global
//! jobs (discovery, scheduler, progress-update, codebase-review,
//! integration-test) plus one dynamically-rendered `Task` per currently
//! active per-ticket job, all wrapped in the outer `ralph` loop.

use ralph_kernel::component::{self, AgentRef, Component, LoopMaxPolicy, TaskComponent, TaskKind};
use ralph_kernel::config::WorkflowConfig;
use ralph_kernel::job::{ActiveJob, JobType};
use ralph_kernel::ticket::node_id;

pub const GLOBAL_GROUP: &str = "global";
pub const TICKET_GROUP: &str = "tickets";

/// Builds this frame's tree. `active_jobs` is the reconciled active-job
/// list (after [`crate::bridge::Bridge::reconcile_schedule`] has already
/// run for the frame), so every ticket-stage job named here genuinely has
/// work outstanding.
pub fn build_tree(config: &WorkflowConfig, active_jobs: &[ActiveJob]) -> Component {
    let scheduler_agent = config
        .scheduler_agent()
        .map(|a| a.id.clone())
        .unwrap_or_else(|| "scheduler".to_string());

    let global = component::parallel(
        GLOBAL_GROUP,
        None,
        vec![
            agent_task("discovery", "discover", &scheduler_agent),
            agent_task("scheduler", "ticket_schedule", &scheduler_agent),
            agent_task("progress-update", "progress", &scheduler_agent),
            agent_task("codebase-review", "category_review", &scheduler_agent),
            agent_task("integration-test", "integration_test", &scheduler_agent),
        ],
    );

    let ticket_tasks = active_jobs
        .iter()
        .filter_map(|job| match &job.job_type {
            JobType::Ticket(stage) => {
                let ticket_id = job.ticket_id.clone()?;
                let id = node_id(&ticket_id, *stage);
                let task = agent_task(&id, stage.schema_key(), &job.agent_id);
                Some(component::worktree(ticket_id, vec![task]))
            }
            _ => None,
        })
        .collect();

    let tickets = component::parallel(TICKET_GROUP, Some(config.max_concurrency), ticket_tasks);

    component::loop_ralph(
        "ralph",
        vec![component::sequence(vec![global, tickets])],
        None,
        None,
        LoopMaxPolicy::ReturnLast,
    )
}

fn agent_task(id: &str, schema: &str, agent_id: &str) -> Component {
    component::task(TaskComponent::new(
        id,
        schema,
        TaskKind::Agent(AgentRef::Single(agent_id.to_string())),
    ))
}
