//! End-of-run structured report: landed tickets, evicted tickets (with
//! reasons), passes used, and any terminally-failed tasks.

use ralph_core::store::Db;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub landed: Vec<String>,
    pub evicted: Vec<EvictedTicket>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EvictedTicket {
    pub ticket_id: String,
    pub reason: String,
}

/// Builds the report by scanning the `land` relation for `run_id`. Rows
/// are the authoritative source for landing state.
pub fn build(db: &Db, run_id: &str) -> ralph_core::error::Result<RunReport> {
    let mut report = RunReport {
        run_id: run_id.to_string(),
        ..Default::default()
    };
    for row in db.scan("land", run_id)? {
        let Some((ticket_id, _)) = row.node_id.split_once(':') else {
            continue;
        };
        let landed = row
            .payload
            .get("landed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if landed {
            report.landed.push(ticket_id.to_string());
        } else if row
            .payload
            .get("evicted")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            let reason = row
                .payload
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            report.evicted.push(EvictedTicket {
                ticket_id: ticket_id.to_string(),
                reason,
            });
        }
    }
    Ok(report)
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "run {} finished", self.run_id)?;
        writeln!(f, "  landed: {}", self.landed.join(", "))?;
        for evicted in &self.evicted {
            writeln!(f, "  evicted {}: {}", evicted.ticket_id, evicted.reason)?;
        }
        Ok(())
    }
}
