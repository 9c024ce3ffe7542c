//! Pure scheduling decisions: node-state evaluation
//! and the tree walk that turns a [`crate::snapshot::Snapshot`] plus a set
//! of per-node facts into a runnable set and loop-advance signals.

use std::collections::HashMap;

use super::{GroupConcurrency, LoopAdvance, NodeFacts, NodeId, NodeState, ScheduleResult};
use crate::snapshot::Snapshot;

/// Rule order: cancellation pre-empts everything; then the six
/// state rules below, evaluated top-down.
pub fn evaluate_node(facts: &NodeFacts) -> NodeState {
    if facts.cancelled {
        return NodeState::Cancelled;
    }
    if facts.skip {
        return NodeState::Skipped;
    }
    if facts.in_progress {
        return NodeState::InProgress;
    }
    if facts.output_exists {
        return NodeState::Finished;
    }
    if facts.enclosing_loop_terminated {
        return NodeState::Skipped;
    }
    if facts.failure_count >= facts.retries + 1 {
        return NodeState::Failed;
    }
    NodeState::Pending
}

fn state_of(facts: &HashMap<NodeId, NodeFacts>, id: &str) -> NodeState {
    match facts.get(id) {
        Some(f) => evaluate_node(f),
        None => NodeState::Pending,
    }
}

/// Whether an entire subtree has nothing left to dispatch right now: every
/// leaf task is in a terminal state, and every nested loop has itself
/// fully terminated (not merely finished its current iteration — that
/// only emits a `LoopAdvance`, it doesn't make the loop terminal to its
/// parent).
fn subtree_is_terminal(node: &Snapshot, facts: &HashMap<NodeId, NodeFacts>) -> bool {
    match node {
        Snapshot::Task { id, .. } => state_of(facts, id).is_terminal(),
        Snapshot::Sequence(children) | Snapshot::Parallel { children, .. } => {
            children.iter().all(|c| subtree_is_terminal(c, facts))
        }
        Snapshot::Loop { terminated, .. } => *terminated,
    }
}

/// Walks the rendered tree and emits the runnable set + loop-advance
/// signals for this frame.
pub fn schedule(
    root: &Snapshot,
    facts: &HashMap<NodeId, NodeFacts>,
    groups: &mut GroupConcurrency,
) -> ScheduleResult {
    let mut result = ScheduleResult::default();
    schedule_node(root, facts, groups, &mut result);
    result
}

fn schedule_node(
    node: &Snapshot,
    facts: &HashMap<NodeId, NodeFacts>,
    groups: &mut GroupConcurrency,
    result: &mut ScheduleResult,
) {
    match node {
        Snapshot::Task { id, .. } => {
            if matches!(state_of(facts, id), NodeState::Pending) {
                result.runnable.push(id.clone());
            }
        }
        Snapshot::Sequence(children) => {
            schedule_first_non_terminal(children, facts, groups, result);
        }
        Snapshot::Parallel {
            group,
            cap,
            children,
        } => {
            for child in children {
                if subtree_is_terminal(child, facts) {
                    continue;
                }
                let mut nested = ScheduleResult::default();
                schedule_node(child, facts, groups, &mut nested);
                for id in nested.runnable {
                    if groups.has_capacity(group, *cap) {
                        groups.reserve(group);
                        result.runnable.push(id);
                    } else {
                        result.capacity_blocked.insert(id);
                    }
                }
                result.loop_advances.extend(nested.loop_advances);
                result.capacity_blocked.extend(nested.capacity_blocked);
            }
        }
        Snapshot::Loop {
            id,
            iteration,
            terminated,
            children,
        } => {
            if *terminated {
                return;
            }
            if children.iter().all(|c| subtree_is_terminal(c, facts)) {
                result.loop_advances.push(LoopAdvance {
                    loop_id: id.clone(),
                    completed_iteration: *iteration,
                });
                return;
            }
            schedule_first_non_terminal(children, facts, groups, result);
        }
    }
}

fn schedule_first_non_terminal(
    children: &[Snapshot],
    facts: &HashMap<NodeId, NodeFacts>,
    groups: &mut GroupConcurrency,
    result: &mut ScheduleResult,
) {
    for child in children {
        if !subtree_is_terminal(child, facts) {
            schedule_node(child, facts, groups, result);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(state: NodeState, retries: u32, failure_count: u32) -> NodeFacts {
        NodeFacts {
            skip: matches!(state, NodeState::Skipped),
            in_progress: matches!(state, NodeState::InProgress),
            output_exists: matches!(state, NodeState::Finished),
            enclosing_loop_terminated: false,
            failure_count,
            retries,
            cancelled: matches!(state, NodeState::Cancelled),
        }
    }

    #[test]
    fn pending_node_is_runnable() {
        let f = NodeFacts {
            retries: 2,
            ..NodeFacts::default()
        };
        assert_eq!(evaluate_node(&f), NodeState::Pending);
    }

    #[test]
    fn failure_count_past_budget_is_failed() {
        let f = facts(NodeState::Pending, 1, 2);
        assert_eq!(evaluate_node(&f), NodeState::Failed);
    }

    #[test]
    fn output_row_wins_over_failure_count() {
        let mut f = facts(NodeState::Pending, 0, 5);
        f.output_exists = true;
        assert_eq!(evaluate_node(&f), NodeState::Finished);
    }

    #[test]
    fn cancelled_pre_empts_everything() {
        let mut f = facts(NodeState::Finished, 0, 0);
        f.cancelled = true;
        assert_eq!(evaluate_node(&f), NodeState::Cancelled);
    }

    #[test]
    fn sequence_schedules_only_first_non_terminal_child() {
        let tree = Snapshot::Sequence(vec![
            Snapshot::Task {
                id: "a".into(),
                skip: false,
            },
            Snapshot::Task {
                id: "b".into(),
                skip: false,
            },
        ]);
        let mut facts_map = HashMap::new();
        facts_map.insert("a".to_string(), facts(NodeState::Finished, 0, 0));
        facts_map.insert("b".to_string(), NodeFacts::default());
        let mut groups = GroupConcurrency::new();
        let result = schedule(&tree, &facts_map, &mut groups);
        assert_eq!(result.runnable, vec!["b".to_string()]);
    }

    #[test]
    fn parallel_respects_group_cap() {
        let tree = Snapshot::Parallel {
            group: "g".into(),
            cap: Some(1),
            children: vec![
                Snapshot::Task {
                    id: "a".into(),
                    skip: false,
                },
                Snapshot::Task {
                    id: "b".into(),
                    skip: false,
                },
            ],
        };
        let mut facts_map = HashMap::new();
        facts_map.insert("a".to_string(), NodeFacts::default());
        facts_map.insert("b".to_string(), NodeFacts::default());
        let mut groups = GroupConcurrency::new();
        let result = schedule(&tree, &facts_map, &mut groups);
        assert_eq!(result.runnable.len(), 1);
        assert_eq!(result.capacity_blocked.len(), 1);
    }

    #[test]
    fn loop_emits_advance_when_all_children_terminal() {
        let tree = Snapshot::Loop {
            id: "ralph".into(),
            iteration: 3,
            terminated: false,
            children: vec![Snapshot::Task {
                id: "x".into(),
                skip: false,
            }],
        };
        let mut facts_map = HashMap::new();
        facts_map.insert("x".to_string(), facts(NodeState::Finished, 0, 0));
        let mut groups = GroupConcurrency::new();
        let result = schedule(&tree, &facts_map, &mut groups);
        assert!(result.runnable.is_empty());
        assert_eq!(
            result.loop_advances,
            vec![LoopAdvance {
                loop_id: "ralph".into(),
                completed_iteration: 3
            }]
        );
    }

    #[test]
    fn terminated_loop_never_schedules() {
        let tree = Snapshot::Loop {
            id: "ralph".into(),
            iteration: 9,
            terminated: true,
            children: vec![Snapshot::Task {
                id: "x".into(),
                skip: false,
            }],
        };
        let facts_map = HashMap::new();
        let mut groups = GroupConcurrency::new();
        let result = schedule(&tree, &facts_map, &mut groups);
        assert!(result.runnable.is_empty());
        assert!(result.loop_advances.is_empty());
    }
}
