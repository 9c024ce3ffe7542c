//! Scenario E — resuming after a crash: a ticket mid-flight
//! in a prior run is surfaced for priority resumption, and a stale
//! workspace directory left behind by a run that never finished its
//! cleanup gets reaped on the next startup without touching the workspace
//! still tied to a live ticket.

use ralph_core::resume::scan_resumable_tickets;
use ralph_core::store::Db;
use ralph_core::vcs;
use ralph_core::workspace::WorkspaceManager;
use ralph_kernel::ticket::Stage;

use crate::fixtures;

#[test]
fn a_ticket_mid_flight_in_a_prior_run_is_resumable_at_its_furthest_stage() {
    let db = Db::open_in_memory().unwrap();
    db.put_output(
        Stage::Implement.schema_key(),
        "run-1",
        "T-5:implement",
        0,
        &serde_json::json!({"summary": "partial work", "filesChanged": ["a.rs"], "status": "partial"}),
        0,
    )
    .unwrap();
    db.put_output(
        Stage::Research.schema_key(),
        "run-1",
        "T-6:research",
        0,
        &serde_json::json!({"summary": "fully landed ticket", "findings": [], "openQuestions": null}),
        0,
    )
    .unwrap();
    db.put_output(
        "land",
        "run-1",
        "T-6:land",
        0,
        &serde_json::json!({"landed": true, "evicted": false, "reason": null, "branchCommits": null, "diffSummary": null, "mainlineCommits": null}),
        0,
    )
    .unwrap();

    let resumable = scan_resumable_tickets(&db, "run-2").unwrap();
    assert_eq!(resumable.len(), 1, "the landed T-6 is excluded, only T-5 resumes");
    assert_eq!(resumable[0].ticket_id, "T-5");
    assert_eq!(resumable[0].run_id, "run-1");
    assert_eq!(resumable[0].furthest_stage, Stage::Implement);
}

#[test]
fn orphaned_workspace_directories_are_reaped_but_live_ones_are_left_alone() {
    let fixture = fixtures::init_repo();
    let repo_root = fixture.repo_root();
    let workspaces = WorkspaceManager::new(repo_root, "main");

    let live_path = workspaces.ensure("T-live").unwrap();
    let stale_path = workspaces.ensure("T-stale").unwrap();
    assert!(live_path.exists());
    assert!(stale_path.exists());

    let reaped = workspaces.reap_orphans(&["T-live".to_string()]).unwrap();
    assert_eq!(reaped, vec!["T-stale".to_string()]);

    assert!(live_path.exists(), "the live ticket's workspace survives reaping");
    assert!(!stale_path.exists(), "the orphaned workspace is removed");
    assert!(vcs::branch_exists(repo_root, "ticket/T-live").unwrap());
}
