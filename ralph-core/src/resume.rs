//! Durability/Resume: scans the output store across every prior run for
//! tickets that were in progress when their run ended, and ranks them by
//! furthest-advanced stage so the scheduler agent can prioritize finishing
//! them over starting new discovery.

use std::collections::HashMap;

use ralph_kernel::ticket::Stage;

use crate::error::Result;
use crate::store::Db;

const STAGE_SCHEMAS: &[Stage] = &[
    Stage::Research,
    Stage::Plan,
    Stage::Implement,
    Stage::Test,
    Stage::BuildVerify,
    Stage::SpecReview,
    Stage::CodeReview,
    Stage::ReviewFix,
    Stage::Report,
];

/// One ticket found mid-flight in a prior run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumableTicket {
    pub ticket_id: String,
    pub run_id: String,
    pub furthest_stage: Stage,
}

/// Scans the output store for rows belonging to a run other than
/// `current_run_id` whose ticket has some stage row but no `land` row with
/// `landed = true`. Returns the result ordered by furthest-advanced stage
/// descending (report > review-fix > review > ... > research), per spec
/// §4.13's resume-rank ordering.
pub fn scan_resumable_tickets(db: &Db, current_run_id: &str) -> Result<Vec<ResumableTicket>> {
    let mut furthest: HashMap<(String, String), Stage> = HashMap::new();

    for stage in STAGE_SCHEMAS {
        for row in db.scan_all_runs(stage.schema_key())? {
            if row.run_id == current_run_id {
                continue;
            }
            let Some(ticket_id) = ticket_id_from_node_id(&row.node_id) else {
                continue;
            };
            let key = (row.run_id.clone(), ticket_id);
            furthest
                .entry(key)
                .and_modify(|existing| {
                    if stage.resume_rank() > existing.resume_rank() {
                        *existing = *stage;
                    }
                })
                .or_insert(*stage);
        }
    }

    let landed: std::collections::HashSet<(String, String)> = db
        .scan_all_runs("land")
        .unwrap_or_default()
        .into_iter()
        .filter(|row| row.run_id != current_run_id)
        .filter(|row| {
            row.payload
                .get("landed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        })
        .filter_map(|row| ticket_id_from_node_id(&row.node_id).map(|t| (row.run_id, t)))
        .collect();

    let mut resumable: Vec<ResumableTicket> = furthest
        .into_iter()
        .filter(|(key, _)| !landed.contains(key))
        .map(|((run_id, ticket_id), furthest_stage)| ResumableTicket {
            ticket_id,
            run_id,
            furthest_stage,
        })
        .collect();

    resumable.sort_by(|a, b| {
        b.furthest_stage
            .resume_rank()
            .cmp(&a.furthest_stage.resume_rank())
            .then(a.ticket_id.cmp(&b.ticket_id))
    });

    Ok(resumable)
}

fn ticket_id_from_node_id(node_id: &str) -> Option<String> {
    node_id.split_once(':').map(|(ticket, _)| ticket.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fresh_db() -> Db {
        Db::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn ranks_furthest_advanced_stage_first() {
        let db = fresh_db();
        db.put_output("implement", "run-1", "T-1:implement", 0, &json!({}), 0)
            .unwrap();
        db.put_output("report", "run-1", "T-2:report", 0, &json!({}), 0)
            .unwrap();

        let resumable = scan_resumable_tickets(&db, "run-2").unwrap();
        assert_eq!(resumable.len(), 2);
        assert_eq!(resumable[0].ticket_id, "T-2");
        assert_eq!(resumable[0].furthest_stage, Stage::Report);
        assert_eq!(resumable[1].ticket_id, "T-1");
    }

    #[test]
    fn excludes_tickets_that_already_landed() {
        let db = fresh_db();
        db.put_output("report", "run-1", "T-1:report", 0, &json!({}), 0)
            .unwrap();
        db.put_output(
            "land",
            "run-1",
            "T-1:land",
            0,
            &json!({"landed": true, "evicted": false}),
            0,
        )
        .unwrap();

        let resumable = scan_resumable_tickets(&db, "run-2").unwrap();
        assert!(resumable.is_empty());
    }

    #[test]
    fn excludes_rows_from_the_current_run() {
        let db = fresh_db();
        db.put_output("plan", "run-2", "T-1:plan", 0, &json!({}), 0)
            .unwrap();
        let resumable = scan_resumable_tickets(&db, "run-2").unwrap();
        assert!(resumable.is_empty());
    }
}
