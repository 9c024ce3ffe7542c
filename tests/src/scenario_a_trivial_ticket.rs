//! Scenario A — trivial ticket flow: a trivial-tier ticket only
//! needs `implement` + `build-verify` before it's tier-complete, its
//! workspace follows the `<tmp>/workflow-wt-{ticketId}` convention, and a
//! clean single-entry merge-queue pass lands it and fast-forwards mainline.

use ralph_core::merge_queue::{CiOutcome, MergeQueueCoordinator, QueueEntry, Resolution};
use ralph_core::store::Db;
use ralph_core::vcs;
use ralph_core::workspace::WorkspaceManager;
use ralph_kernel::config::OrderingStrategy;
use ralph_kernel::job::Priority;
use ralph_kernel::ticket::{ComplexityTier, Stage, is_tier_complete, node_id};

use crate::fixtures;

#[test]
fn trivial_tier_is_complete_once_build_verify_lands() {
    let db = Db::open_in_memory().unwrap();
    db.put_output(
        Stage::Implement.schema_key(),
        "run-a",
        &node_id("T-X", Stage::Implement),
        0,
        &serde_json::json!({"summary": "trivial fix"}),
        0,
    )
    .unwrap();

    let has_output = |stage: Stage| {
        db.get_latest(stage.schema_key(), "run-a", &node_id("T-X", stage))
            .unwrap()
            .is_some()
    };
    assert!(
        !is_tier_complete(ComplexityTier::Trivial, has_output),
        "implement alone isn't enough — trivial's last stage is build-verify"
    );

    db.put_output(
        Stage::BuildVerify.schema_key(),
        "run-a",
        &node_id("T-X", Stage::BuildVerify),
        0,
        &serde_json::json!({"passed": true}),
        0,
    )
    .unwrap();
    let has_output = |stage: Stage| {
        db.get_latest(stage.schema_key(), "run-a", &node_id("T-X", stage))
            .unwrap()
            .is_some()
    };
    assert!(is_tier_complete(ComplexityTier::Trivial, has_output));
}

#[test]
fn workspace_follows_the_named_convention_and_tears_down_on_destroy() {
    let fixture = fixtures::init_repo();
    let workspaces = WorkspaceManager::new(fixture.repo_root(), "main");

    let path = workspaces.ensure("T-X").unwrap();
    assert_eq!(
        path,
        std::env::temp_dir().join("ralph-workspaces").join("workflow-wt-T-X")
    );
    assert!(path.exists());
    assert!(vcs::branch_exists(fixture.repo_root(), "ticket/T-X").unwrap());

    workspaces.destroy("T-X").unwrap();
    assert!(!path.exists());
    assert!(!vcs::branch_exists(fixture.repo_root(), "ticket/T-X").unwrap());
}

#[test]
fn clean_single_entry_window_lands_and_fast_forwards_mainline() {
    let fixture = fixtures::init_repo();
    let repo_root = fixture.repo_root();
    fixtures::branch_with_commit(repo_root, "ticket/T-X", "src/fix.txt", "patched\n", "T-X: trivial fix");

    let workspaces = WorkspaceManager::new(repo_root, "main");
    let coordinator = MergeQueueCoordinator::new(repo_root, "main", 3, &workspaces);

    let window = coordinator.select_window(
        vec![QueueEntry {
            ticket_id: "T-X".to_string(),
            branch: "ticket/T-X".to_string(),
            priority: Priority::Medium,
            position: 0,
            report_iteration: 0,
            enqueue_sequence: 0,
        }],
        OrderingStrategy::PriorityFirst,
    );
    assert_eq!(window.len(), 1);

    let rebase = coordinator.stacked_rebase(&window).unwrap();
    assert!(
        matches!(rebase, ralph_core::merge_queue::RebaseResult::AllReplayed { .. }),
        "a single entry rebasing onto an untouched mainline can't conflict"
    );

    let outcomes = vec![CiOutcome {
        ticket_id: "T-X".to_string(),
        passed: true,
        output: String::new(),
    }];
    let resolutions = coordinator.resolve_ci_outcomes(&window, &outcomes).unwrap();
    assert_eq!(resolutions.len(), 1);
    assert!(matches!(resolutions[0], Resolution::Landed { .. }));

    assert_eq!(fixtures::head_summary(repo_root, "main"), "T-X: trivial fix");
    assert!(
        !vcs::branch_exists(repo_root, "ticket/T-X").unwrap(),
        "landing cleans up the ticket's branch bookmark"
    );
}
