//! Renders a [`ralph_kernel::Component`] tree against a
//! [`ralph_kernel::component::FrameContext`] into a closure-free
//! [`ralph_kernel::Snapshot`] plus the flat list of task descriptors the
//! scheduler and engine loop consume.
//!
//! Branch/Worktree/MergeQueue/Workflow all resolve away here: `Branch`
//! picks a subtree, `Worktree` tags descendant `TaskDescriptor.workspace_id`,
//! `MergeQueue` becomes a `Parallel` capped at 1, and `Workflow` is exactly
//! a `Sequence`.

use ralph_kernel::component::{Component, FrameContext, LoopMaxPolicy, TaskKind};
use ralph_kernel::snapshot::{ResolvedTaskKind, Snapshot, TaskDescriptor};

pub struct RenderOutput {
    pub snapshot: Snapshot,
    pub tasks: Vec<TaskDescriptor>,
}

struct Renderer<'a> {
    ctx: &'a dyn FrameContext,
    tasks: Vec<TaskDescriptor>,
}

pub fn render(root: &Component, ctx: &dyn FrameContext) -> RenderOutput {
    let mut renderer = Renderer { ctx, tasks: Vec::new() };
    let snapshot = renderer.render_node(root, None, None, 0);
    RenderOutput {
        snapshot,
        tasks: renderer.tasks,
    }
}

impl Renderer<'_> {
    fn render_node(
        &mut self,
        node: &Component,
        loop_id: Option<&str>,
        workspace_id: Option<&str>,
        iteration: u32,
    ) -> Snapshot {
        match node {
            Component::Workflow(children) | Component::Sequence(children) => {
                Snapshot::Sequence(
                    children
                        .iter()
                        .map(|c| self.render_node(c, loop_id, workspace_id, iteration))
                        .collect(),
                )
            }
            Component::Parallel { group, cap, children } => Snapshot::Parallel {
                group: group.clone(),
                cap: *cap,
                children: children
                    .iter()
                    .map(|c| self.render_node(c, loop_id, workspace_id, iteration))
                    .collect(),
            },
            Component::MergeQueue { children } => Snapshot::Parallel {
                group: "merge-queue".to_string(),
                cap: Some(1),
                children: children
                    .iter()
                    .map(|c| self.render_node(c, loop_id, workspace_id, iteration))
                    .collect(),
            },
            Component::Worktree { workspace_id: new_id, children } => Snapshot::Sequence(
                children
                    .iter()
                    .map(|c| self.render_node(c, loop_id, Some(new_id.as_str()), iteration))
                    .collect(),
            ),
            Component::Branch { predicate, if_true, if_false } => {
                let chosen = if predicate(self.ctx) { if_true } else { if_false };
                self.render_node(chosen, loop_id, workspace_id, iteration)
            }
            Component::Loop { id, until, max_iterations, on_max, children } => {
                let current_iteration = self.ctx.current_iteration();
                let terminated = until.as_ref().is_some_and(|pred| pred(self.ctx))
                    || max_iterations.is_some_and(|max| {
                        current_iteration >= max && matches!(on_max, LoopMaxPolicy::Fail | LoopMaxPolicy::ReturnLast)
                    });
                Snapshot::Loop {
                    id: id.clone(),
                    iteration: current_iteration,
                    terminated,
                    children: children
                        .iter()
                        .map(|c| self.render_node(c, Some(id.as_str()), workspace_id, current_iteration))
                        .collect(),
                }
            }
            Component::Task(task) => {
                let skip = task.skip_if.as_ref().is_some_and(|pred| pred(self.ctx));
                let resolved_kind = match &task.kind {
                    TaskKind::Agent(agent_ref) => ResolvedTaskKind::Agent {
                        chain_len: agent_ref.len(),
                    },
                    TaskKind::Compute(_) => ResolvedTaskKind::Compute,
                    TaskKind::Static(_) => ResolvedTaskKind::Static,
                };
                let agent = match &task.kind {
                    TaskKind::Agent(agent_ref) => Some(agent_ref.clone()),
                    _ => None,
                };
                let static_payload = match &task.kind {
                    TaskKind::Static(value) => Some(value.clone()),
                    TaskKind::Compute(compute) if !skip => compute(self.ctx).ok(),
                    _ => None,
                };

                self.tasks.push(TaskDescriptor {
                    id: task.id.clone(),
                    schema: task.schema.clone(),
                    kind: resolved_kind,
                    agent,
                    static_payload,
                    retries: task.retries,
                    timeout_secs: task.timeout_secs,
                    continue_on_fail: task.continue_on_fail,
                    iteration,
                    loop_id: loop_id.map(str::to_string),
                    workspace_id: workspace_id.map(str::to_string),
                    skip,
                });

                Snapshot::Task {
                    id: task.id.clone(),
                    skip,
                }
            }
        }
    }
}
