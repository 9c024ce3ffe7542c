//! Scenario F — repeating job types reschedule every iteration (spec
//! §4.11): discovery and progress-update are not one-shot per-ticket
//! stages — they're meant to run again each loop iteration. The bridge
//! must reap them against the *current* iteration's output, not any past
//! iteration's, or they'd never be rescheduled after their first run.

use std::sync::Arc;

use ralph_core::agent::AgentPool;
use ralph_core::bridge::Bridge;
use ralph_core::store::Db;
use ralph_kernel::job::JobType;
use ralph_kernel::schema_catalog::SchemaCatalog;

fn bridge(db: &Db, run_id: &str) -> Bridge {
    Bridge::new(
        db.clone(),
        Arc::new(SchemaCatalog::builtin()),
        Arc::new(AgentPool::new(vec![])),
        run_id,
        std::path::PathBuf::from("."),
    )
}

fn discovery_schedule() -> serde_json::Value {
    serde_json::json!({
        "jobs": [{"type": "discovery", "agentId": "scheduler", "ticketId": null, "focusId": null}],
        "rateLimitedAgents": null,
    })
}

#[test]
fn discovery_reschedules_every_iteration_once_its_prior_output_lands() {
    let db = Db::open_in_memory().unwrap();
    let run_id = "run-f";
    let bridge = bridge(&db, run_id);

    // Iteration 0: discovery gets scheduled.
    bridge.reconcile_schedule(Some(&discovery_schedule()), 0).unwrap();
    let active = db.active_jobs(run_id).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].job_type, JobType::Discovery);

    // Discovery's iteration-0 output lands; reconciling again at the same
    // iteration must reap it and not immediately reinsert it — the schedule
    // hasn't changed and the output for *this* iteration already exists.
    db.put_output(
        "discover",
        run_id,
        "discovery",
        0,
        &serde_json::json!({
            "id": "T-9", "title": "found it", "description": "d", "category": "bug",
            "priority": "medium", "complexityTier": "small", "acceptanceCriteria": null,
            "relevantFiles": [], "referenceFiles": [],
        }),
        0,
    )
    .unwrap();
    bridge.reconcile_schedule(Some(&discovery_schedule()), 0).unwrap();
    assert!(
        db.active_jobs(run_id).unwrap().is_empty(),
        "finished discovery reaps at the iteration it completed, and isn't \
         immediately rescheduled within that same iteration"
    );

    // Iteration 1: the scheduler's next pass schedules discovery again.
    // Before the fix this never happened — insert_scheduled_jobs checked
    // get_latest (cross-iteration) and always found iteration 0's row.
    bridge.reconcile_schedule(Some(&discovery_schedule()), 1).unwrap();
    let active = db.active_jobs(run_id).unwrap();
    assert_eq!(
        active.len(),
        1,
        "discovery is a repeating job type and must be rescheduled on the next iteration"
    );
    assert_eq!(active[0].job_type, JobType::Discovery);
}
