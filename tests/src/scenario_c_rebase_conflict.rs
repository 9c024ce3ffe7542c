//! Scenario C — rebase conflict eviction: two
//! tickets branch from the same mainline tip and edit the same file
//! differently. Landing the first is clean; replaying the second on top
//! of the new mainline conflicts and it gets evicted with diagnostic
//! context rather than blocking the queue.

use ralph_core::merge_queue::{CiOutcome, MergeQueueCoordinator, QueueEntry, RebaseResult, Resolution};
use ralph_core::vcs;
use ralph_core::workspace::WorkspaceManager;
use ralph_kernel::config::OrderingStrategy;
use ralph_kernel::job::Priority;

use crate::fixtures;

fn entry(ticket_id: &str, branch: &str, seq: u64) -> QueueEntry {
    QueueEntry {
        ticket_id: ticket_id.to_string(),
        branch: branch.to_string(),
        priority: Priority::Medium,
        position: seq,
        report_iteration: 0,
        enqueue_sequence: seq,
    }
}

#[test]
fn second_ticket_conflicts_and_evicts_after_the_first_lands() {
    let fixture = fixtures::init_repo();
    let repo_root = fixture.repo_root();

    fixtures::branch_with_commit(repo_root, "ticket/T-A", "shared.txt", "A\n", "T-A: claim shared.txt for A");
    fixtures::branch_with_commit(repo_root, "ticket/T-B", "shared.txt", "B\n", "T-B: claim shared.txt for B");

    let workspaces = WorkspaceManager::new(repo_root, "main");
    let coordinator = MergeQueueCoordinator::new(repo_root, "main", 3, &workspaces);

    // T-A lands cleanly first.
    let window_a = coordinator.select_window(
        vec![entry("T-A", "ticket/T-A", 0)],
        OrderingStrategy::PriorityFirst,
    );
    let rebase_a = coordinator.stacked_rebase(&window_a).unwrap();
    assert!(matches!(rebase_a, RebaseResult::AllReplayed { .. }));
    let outcomes_a = vec![CiOutcome {
        ticket_id: "T-A".to_string(),
        passed: true,
        output: String::new(),
    }];
    let resolutions_a = coordinator.resolve_ci_outcomes(&window_a, &outcomes_a).unwrap();
    assert!(matches!(resolutions_a[0], Resolution::Landed { .. }));
    assert_eq!(fixtures::head_summary(repo_root, "main"), "T-A: claim shared.txt for A");

    // T-B, still based on the old mainline tip, now conflicts when replayed
    // onto the new one.
    let window_b = coordinator.select_window(
        vec![entry("T-B", "ticket/T-B", 1)],
        OrderingStrategy::PriorityFirst,
    );
    let rebase_b = coordinator.stacked_rebase(&window_b).unwrap();
    match rebase_b {
        RebaseResult::Conflict { index, context } => {
            assert_eq!(index, 0);
            assert!(
                context.branch_commits.iter().any(|c| c.contains("T-B")),
                "eviction context names the branch's own attempted commit"
            );
            assert!(!context.mainline_commits_since_branch_point.is_empty());
        }
        RebaseResult::AllReplayed { .. } => panic!("conflicting edits to shared.txt must not replay cleanly"),
    }

    // Mainline is untouched by the failed attempt and T-B's bookmark survives
    // for the next pass to retry (or evict permanently) against.
    assert_eq!(fixtures::head_summary(repo_root, "main"), "T-A: claim shared.txt for A");
    assert!(vcs::branch_exists(repo_root, "ticket/T-B").unwrap());
}
