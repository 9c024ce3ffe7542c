//! Scenario B — review-fix gating: the scheduler-agent bridge
//! reconciles whatever `ticket_schedule` payload it's handed, so the
//! severity gate itself lives in the scheduler agent's decision — this
//! exercises [`ralph_kernel::job::Severity::requires_review_fix`] the way
//! that decision would consult it, then confirms the bridge reconciles the
//! resulting schedule correctly in both directions.

use std::sync::Arc;

use ralph_core::agent::AgentPool;
use ralph_core::bridge::Bridge;
use ralph_core::store::Db;
use ralph_kernel::job::{JobType, Severity};
use ralph_kernel::schema_catalog::SchemaCatalog;
use ralph_kernel::ticket::{Stage, node_id};

fn bridge(db: &Db, run_id: &str) -> Bridge {
    Bridge::new(
        db.clone(),
        Arc::new(SchemaCatalog::builtin()),
        Arc::new(AgentPool::new(vec![])),
        run_id,
        std::path::PathBuf::from("."),
    )
}

fn severity_of(payload: &serde_json::Value) -> Severity {
    serde_json::from_value(payload["severity"].clone()).unwrap()
}

#[test]
fn major_severity_schedules_review_fix_and_it_reaps_once_done() {
    let db = Db::open_in_memory().unwrap();
    let run_id = "run-b";
    let bridge = bridge(&db, run_id);

    let review = serde_json::json!({"approved": false, "severity": "major", "notes": "needs work"});
    db.put_output(
        "code_review",
        run_id,
        &node_id("T-1", Stage::CodeReview),
        0,
        &review,
        0,
    )
    .unwrap();
    assert!(severity_of(&review).requires_review_fix());

    let schedule = serde_json::json!({
        "jobs": [
            {"type": "ticket:review-fix", "agentId": "worker", "ticketId": "T-1", "focusId": null}
        ],
        "rateLimitedAgents": null,
    });
    bridge.reconcile_schedule(Some(&schedule), 0).unwrap();

    let active = db.active_jobs(run_id).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].job_type, JobType::Ticket(Stage::ReviewFix));
    assert_eq!(active[0].ticket_id.as_deref(), Some("T-1"));

    db.put_output(
        "review_fix",
        run_id,
        &node_id("T-1", Stage::ReviewFix),
        0,
        &serde_json::json!({"summary": "addressed review notes", "filesChanged": ["src/lib.rs"]}),
        0,
    )
    .unwrap();
    bridge.reconcile_schedule(Some(&schedule), 0).unwrap();
    assert!(
        db.active_jobs(run_id).unwrap().is_empty(),
        "review-fix reaps once its output row exists"
    );
}

#[test]
fn none_severity_never_requires_review_fix_and_nothing_is_scheduled() {
    let db = Db::open_in_memory().unwrap();
    let run_id = "run-b2";
    let bridge = bridge(&db, run_id);

    let review = serde_json::json!({"approved": true, "severity": "none", "notes": null});
    db.put_output(
        "code_review",
        run_id,
        &node_id("T-2", Stage::CodeReview),
        0,
        &review,
        0,
    )
    .unwrap();
    assert!(!severity_of(&review).requires_review_fix());

    // A well-behaved scheduler omits review-fix from the schedule entirely
    // when the gate doesn't require it.
    let schedule = serde_json::json!({"jobs": [], "rateLimitedAgents": null});
    bridge.reconcile_schedule(Some(&schedule), 0).unwrap();
    assert!(db.active_jobs(run_id).unwrap().is_empty());
}
