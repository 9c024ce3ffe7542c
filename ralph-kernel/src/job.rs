//! Closed enumerations and the active-job model.

use serde::{Deserialize, Serialize};

use crate::ticket::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Minor,
    Major,
    Critical,
}

impl Severity {
    /// Only schedule review-fix when a review returned severity > none.
    pub fn requires_review_fix(self) -> bool {
        self > Severity::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Partial,
    Complete,
    Blocked,
}

/// `job_type ∈ {discovery, progress-update, codebase-review,
/// integration-test, ticket:<stage>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Discovery,
    ProgressUpdate,
    CodebaseReview,
    IntegrationTest,
    #[serde(rename = "ticket")]
    Ticket(Stage),
}

impl JobType {
    /// Repeating job types must be reaped with an iteration-scoped lookup
    /// so they can be re-scheduled in later loop iterations.
    /// One-shot per-ticket stages use the cross-iteration lookup instead.
    pub fn is_repeating(&self) -> bool {
        matches!(self, JobType::Discovery | JobType::ProgressUpdate)
    }

    pub fn schema_key(&self) -> &'static str {
        match self {
            JobType::Discovery => "discover",
            JobType::ProgressUpdate => "progress",
            JobType::CodebaseReview => "category_review",
            JobType::IntegrationTest => "integration_test",
            JobType::Ticket(stage) => stage.schema_key(),
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Discovery => write!(f, "discovery"),
            JobType::ProgressUpdate => write!(f, "progress-update"),
            JobType::CodebaseReview => write!(f, "codebase-review"),
            JobType::IntegrationTest => write!(f, "integration-test"),
            JobType::Ticket(stage) => write!(f, "ticket:{}", stage.as_str()),
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "discovery" => Ok(JobType::Discovery),
            "progress-update" => Ok(JobType::ProgressUpdate),
            "codebase-review" => Ok(JobType::CodebaseReview),
            "integration-test" => Ok(JobType::IntegrationTest),
            other => other
                .strip_prefix("ticket:")
                .and_then(parse_stage)
                .map(JobType::Ticket)
                .ok_or_else(|| format!("unrecognized job type `{other}`")),
        }
    }
}

fn parse_stage(raw: &str) -> Option<Stage> {
    Some(match raw {
        "research" => Stage::Research,
        "plan" => Stage::Plan,
        "implement" => Stage::Implement,
        "test" => Stage::Test,
        "build-verify" => Stage::BuildVerify,
        "spec-review" => Stage::SpecReview,
        "code-review" => Stage::CodeReview,
        "review-fix" => Stage::ReviewFix,
        "report" => Stage::Report,
        "land" => Stage::Land,
        _ => return None,
    })
}

/// `(job_id, job_type, agent_id, ticket_id?, focus_id?, created_at_ms)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job_id: String,
    pub job_type: JobType,
    pub agent_id: String,
    pub ticket_id: Option<String>,
    pub focus_id: Option<String>,
    pub created_at_ms: u64,
}
