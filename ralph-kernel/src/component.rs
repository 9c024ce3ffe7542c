//! The declarative component tree.
//!
//! This is a tagged-variant AST, host-reconciler style: a `Component` tree
//! is built fresh every frame by calling the DSL functions below;
//! `ralph_core::reconciler::render` walks it against a `FrameContext` to
//! produce a [`crate::snapshot::Snapshot`] (resolved, closure-free) plus
//! the ordered task descriptors the scheduler and engine loop consume.
//!
//! `Component` itself is never persisted or sent across a thread boundary
//! as data — it is throwaway per-frame scaffolding, rebuilt on every render
//! rather than mutated in place.

use std::fmt;

use serde_json::Value;

/// Minimal read-only view a `Component`'s predicates and compute callbacks
/// are evaluated against. `ralph_core::context::ContextAccessor` implements
/// this; keeping it as a trait here lets the kernel stay free of any I/O
/// dependency while components still close over "what has this run
/// produced so far".
pub trait FrameContext {
    /// Exact lookup: `output` semantics if `required`, `outputMaybe` otherwise.
    fn output_at(&self, schema: &str, node_id: &str, iteration: u32) -> Option<Value>;
    /// Cross-iteration lookup: `latest` semantics.
    fn latest(&self, schema: &str, node_id: &str) -> Option<Value>;
    /// The iteration the current frame is rendering for this node's
    /// enclosing loop (0 outside any loop).
    fn current_iteration(&self) -> u32;
}

pub type SkipPredicate = Box<dyn Fn(&dyn FrameContext) -> bool + Send + Sync>;
pub type BranchPredicate = Box<dyn Fn(&dyn FrameContext) -> bool + Send + Sync>;
pub type UntilPredicate = Box<dyn Fn(&dyn FrameContext) -> bool + Send + Sync>;
pub type ComputeFn = Box<dyn Fn(&dyn FrameContext) -> Result<Value, String> + Send + Sync>;

/// An agent reference: either one fixed agent, or a fallback chain.
/// Attempt `i` (0-based) uses `agents[min(i, agents.len() - 1)]` —
/// saturating-index arithmetic, so a retry budget longer than the
/// fallback chain simply keeps retrying the last agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentRef {
    Single(String),
    Fallback(Vec<String>),
}

impl AgentRef {
    pub fn for_attempt(&self, attempt_index: usize) -> &str {
        match self {
            AgentRef::Single(id) => id.as_str(),
            AgentRef::Fallback(chain) => {
                let idx = attempt_index.min(chain.len().saturating_sub(1));
                chain[idx].as_str()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AgentRef::Single(_) => 1,
            AgentRef::Fallback(chain) => chain.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub enum TaskKind {
    Agent(AgentRef),
    Compute(ComputeFn),
    Static(Value),
}

impl fmt::Debug for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Agent(agent) => f.debug_tuple("Agent").field(agent).finish(),
            TaskKind::Compute(_) => f.write_str("Compute(..)"),
            TaskKind::Static(value) => f.debug_tuple("Static").field(value).finish(),
        }
    }
}

pub struct TaskComponent {
    pub id: String,
    pub schema: String,
    pub kind: TaskKind,
    pub retries: u32,
    pub timeout_secs: Option<u64>,
    pub continue_on_fail: bool,
    pub skip_if: Option<SkipPredicate>,
}

impl TaskComponent {
    pub fn new(id: impl Into<String>, schema: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            schema: schema.into(),
            kind,
            retries: 0,
            timeout_secs: Some(60 * 60),
            continue_on_fail: false,
            skip_if: None,
        }
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn timeout_secs(mut self, timeout: Option<u64>) -> Self {
        self.timeout_secs = timeout;
        self
    }

    pub fn continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }

    pub fn skip_if(mut self, predicate: SkipPredicate) -> Self {
        self.skip_if = Some(predicate);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMaxPolicy {
    Fail,
    ReturnLast,
}

pub enum Component {
    /// Root container; semantically equivalent to `Sequence`.
    Workflow(Vec<Component>),
    /// Children must reach terminal state in declaration order.
    Sequence(Vec<Component>),
    /// All non-terminal children are schedulable, up to the group's cap.
    Parallel {
        group: String,
        cap: Option<u32>,
        children: Vec<Component>,
    },
    /// Re-rendered for iteration i+1 once all children terminate at
    /// iteration i.
    Loop {
        id: String,
        until: Option<UntilPredicate>,
        max_iterations: Option<u32>,
        on_max: LoopMaxPolicy,
        children: Vec<Component>,
    },
    /// Exactly one of two subtrees is active based on a predicate.
    Branch {
        predicate: BranchPredicate,
        if_true: Box<Component>,
        if_false: Box<Component>,
    },
    Task(TaskComponent),
    /// Wraps children to execute with `cwd` bound to a VCS workspace path.
    Worktree {
        workspace_id: String,
        children: Vec<Component>,
    },
    /// A `Parallel` variant with effective concurrency of 1.
    MergeQueue { children: Vec<Component> },
}

pub fn workflow(children: Vec<Component>) -> Component {
    Component::Workflow(children)
}

pub fn sequence(children: Vec<Component>) -> Component {
    Component::Sequence(children)
}

pub fn parallel(group: impl Into<String>, cap: Option<u32>, children: Vec<Component>) -> Component {
    Component::Parallel {
        group: group.into(),
        cap,
        children,
    }
}

pub fn loop_ralph(
    id: impl Into<String>,
    children: Vec<Component>,
    until: Option<UntilPredicate>,
    max_iterations: Option<u32>,
    on_max: LoopMaxPolicy,
) -> Component {
    Component::Loop {
        id: id.into(),
        until,
        max_iterations,
        on_max,
        children,
    }
}

pub fn branch(predicate: BranchPredicate, if_true: Component, if_false: Component) -> Component {
    Component::Branch {
        predicate,
        if_true: Box::new(if_true),
        if_false: Box::new(if_false),
    }
}

pub fn task(spec: TaskComponent) -> Component {
    Component::Task(spec)
}

pub fn worktree(workspace_id: impl Into<String>, children: Vec<Component>) -> Component {
    Component::Worktree {
        workspace_id: workspace_id.into(),
        children,
    }
}

pub fn merge_queue(children: Vec<Component>) -> Component {
    Component::MergeQueue { children }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_ref_saturates_on_overflow() {
        let chain = AgentRef::Fallback(vec!["primary".into(), "fallback".into()]);
        assert_eq!(chain.for_attempt(0), "primary");
        assert_eq!(chain.for_attempt(1), "fallback");
        assert_eq!(chain.for_attempt(2), "fallback");
        assert_eq!(chain.for_attempt(50), "fallback");
    }

    #[test]
    fn single_agent_always_returns_itself() {
        let single = AgentRef::Single("solo".into());
        assert_eq!(single.for_attempt(0), "solo");
        assert_eq!(single.for_attempt(9), "solo");
    }
}
