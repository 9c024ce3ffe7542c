//! Scenario D — speculative window with a mid-window CI failure (spec
//! §4.12 steps 1, 6-9): only the configured window depth enters the
//! speculative batch; when CI fails partway through, everything ahead of
//! the failure still lands (mainline fast-forwards to the last passing
//! entry) and everything behind it is left uninvalidated for the next pass
//! rather than evicted outright.

use ralph_core::merge_queue::{CiOutcome, MergeQueueCoordinator, QueueEntry, RebaseResult, Resolution};
use ralph_core::vcs;
use ralph_core::workspace::WorkspaceManager;
use ralph_kernel::config::OrderingStrategy;
use ralph_kernel::job::Priority;

use crate::fixtures;

fn entry(ticket_id: &str, branch: &str, priority: Priority, seq: u64) -> QueueEntry {
    QueueEntry {
        ticket_id: ticket_id.to_string(),
        branch: branch.to_string(),
        priority,
        position: seq,
        report_iteration: 0,
        enqueue_sequence: seq,
    }
}

#[test]
fn window_depth_caps_the_batch_by_priority() {
    let fixture = fixtures::init_repo();
    let repo_root = fixture.repo_root();
    fixtures::branch_with_commit(repo_root, "ticket/T-1", "a.txt", "1\n", "T-1");
    fixtures::branch_with_commit(repo_root, "ticket/T-2", "b.txt", "2\n", "T-2");
    fixtures::branch_with_commit(repo_root, "ticket/T-3", "c.txt", "3\n", "T-3");

    let workspaces = WorkspaceManager::new(repo_root, "main");
    let coordinator = MergeQueueCoordinator::new(repo_root, "main", 2, &workspaces);

    let ready = vec![
        entry("T-1", "ticket/T-1", Priority::Low, 0),
        entry("T-2", "ticket/T-2", Priority::Critical, 1),
        entry("T-3", "ticket/T-3", Priority::High, 2),
    ];
    let window = coordinator.select_window(ready, OrderingStrategy::PriorityFirst);
    assert_eq!(window.len(), 2, "window depth of 2 caps the batch");
    assert_eq!(window[0].ticket_id, "T-2");
    assert_eq!(window[1].ticket_id, "T-3");
}

#[test]
fn a_ci_failure_mid_window_lands_the_head_and_leaves_the_tail_uninvalidated() {
    let fixture = fixtures::init_repo();
    let repo_root = fixture.repo_root();
    fixtures::branch_with_commit(repo_root, "ticket/T-1", "a.txt", "1\n", "T-1: adds a.txt");
    fixtures::branch_with_commit(repo_root, "ticket/T-2", "b.txt", "2\n", "T-2: adds b.txt");
    fixtures::branch_with_commit(repo_root, "ticket/T-3", "c.txt", "3\n", "T-3: adds c.txt");

    let workspaces = WorkspaceManager::new(repo_root, "main");
    let coordinator = MergeQueueCoordinator::new(repo_root, "main", 3, &workspaces);

    let window = coordinator.select_window(
        vec![
            entry("T-1", "ticket/T-1", Priority::High, 0),
            entry("T-2", "ticket/T-2", Priority::High, 1),
            entry("T-3", "ticket/T-3", Priority::High, 2),
        ],
        OrderingStrategy::Fifo,
    );
    assert_eq!(window.len(), 3);

    let rebase = coordinator.stacked_rebase(&window).unwrap();
    assert!(matches!(rebase, RebaseResult::AllReplayed { .. }));

    let outcomes = vec![
        CiOutcome { ticket_id: "T-1".to_string(), passed: true, output: String::new() },
        CiOutcome { ticket_id: "T-2".to_string(), passed: false, output: "test failed".to_string() },
        CiOutcome { ticket_id: "T-3".to_string(), passed: true, output: String::new() },
    ];
    let resolutions = coordinator.resolve_ci_outcomes(&window, &outcomes).unwrap();

    // T-1 lands, T-2 evicts, T-3 is left with no resolution this pass.
    assert_eq!(resolutions.len(), 2);
    assert!(matches!(resolutions[0], Resolution::Landed { .. }));
    assert!(matches!(resolutions[1], Resolution::Evicted { .. }));

    assert_eq!(fixtures::head_summary(repo_root, "main"), "T-1: adds a.txt");
    assert!(
        vcs::branch_exists(repo_root, "ticket/T-2").unwrap(),
        "only landed entries are cleaned up — the evicted entry's bookmark survives \
         for its diagnostic context to be read off of"
    );
    assert!(
        vcs::branch_exists(repo_root, "ticket/T-3").unwrap(),
        "the uninvalidated tail entry's bookmark is left alone for a retry"
    );
}
