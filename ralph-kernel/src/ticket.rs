//! Complexity tiers, stages, and the ticket pipeline model.

use serde::{Deserialize, Serialize};

use crate::job::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Research,
    Plan,
    Implement,
    Test,
    BuildVerify,
    SpecReview,
    CodeReview,
    ReviewFix,
    Report,
    Land,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Plan => "plan",
            Stage::Implement => "implement",
            Stage::Test => "test",
            Stage::BuildVerify => "build-verify",
            Stage::SpecReview => "spec-review",
            Stage::CodeReview => "code-review",
            Stage::ReviewFix => "review-fix",
            Stage::Report => "report",
            Stage::Land => "land",
        }
    }

    /// The schema key an output row for this stage is validated against.
    pub fn schema_key(self) -> &'static str {
        match self {
            Stage::Research => "research",
            Stage::Plan => "plan",
            Stage::Implement => "implement",
            Stage::Test => "test_results",
            Stage::BuildVerify => "build_verify",
            Stage::SpecReview => "spec_review",
            Stage::CodeReview => "code_review",
            Stage::ReviewFix => "review_fix",
            Stage::Report => "report",
            Stage::Land => "land",
        }
    }

    /// Rank used for durability resume ranking: report >
    /// review-fix > code-review > test > implement > plan > research.
    /// `build-verify`/`spec-review`/`land` are not named in that ranking;
    /// they sort between their neighbors in tier order.
    pub fn resume_rank(self) -> u8 {
        match self {
            Stage::Report => 9,
            Stage::ReviewFix => 8,
            Stage::CodeReview => 7,
            Stage::SpecReview => 6,
            Stage::BuildVerify => 5,
            Stage::Test => 4,
            Stage::Implement => 3,
            Stage::Plan => 2,
            Stage::Research => 1,
            Stage::Land => 10,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityTier {
    Trivial,
    Small,
    Medium,
    Large,
}

impl ComplexityTier {
    /// The ordered stage sequence a ticket of this tier must pass through
    /// before it is eligible for landing.
    pub fn stage_sequence(self) -> &'static [Stage] {
        match self {
            ComplexityTier::Trivial => &[Stage::Implement, Stage::BuildVerify],
            ComplexityTier::Small => &[Stage::Implement, Stage::Test, Stage::BuildVerify],
            ComplexityTier::Medium => &[
                Stage::Research,
                Stage::Plan,
                Stage::Implement,
                Stage::Test,
                Stage::BuildVerify,
                Stage::CodeReview,
            ],
            ComplexityTier::Large => &[
                Stage::Research,
                Stage::Plan,
                Stage::Implement,
                Stage::Test,
                Stage::BuildVerify,
                Stage::SpecReview,
                Stage::CodeReview,
                Stage::ReviewFix,
                Stage::Report,
            ],
        }
    }

    pub fn last_stage(self) -> Stage {
        *self
            .stage_sequence()
            .last()
            .expect("every tier has at least one stage")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub complexity_tier: ComplexityTier,
    pub acceptance_criteria: Option<Vec<String>>,
    pub relevant_files: Vec<String>,
    pub reference_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTicketId(pub String);

impl std::fmt::Display for InvalidTicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ticket id `{}` must not contain the `:` stage-node-id delimiter",
            self.0
        )
    }
}

impl std::error::Error for InvalidTicketId {}

/// `"{ticketId}:{stage}"`.
pub fn node_id(ticket_id: &str, stage: Stage) -> String {
    format!("{ticket_id}:{}", stage.as_str())
}

pub fn validate_ticket_id(ticket_id: &str) -> Result<(), InvalidTicketId> {
    if ticket_id.contains(':') {
        Err(InvalidTicketId(ticket_id.to_string()))
    } else {
        Ok(())
    }
}

/// Reverse-walks the tier's stage sequence, returning the furthest-advanced
/// stage whose output exists.
pub fn current_stage(tier: ComplexityTier, has_output: impl Fn(Stage) -> bool) -> Option<Stage> {
    tier.stage_sequence()
        .iter()
        .rev()
        .find(|&&stage| has_output(stage))
        .copied()
}

/// Output exists for the tier's final stage.
pub fn is_tier_complete(tier: ComplexityTier, has_output: impl Fn(Stage) -> bool) -> bool {
    has_output(tier.last_stage())
}

/// The first tier-stage after `current`, or the tier's first stage if no
/// stage has completed yet.
pub fn next_stage(tier: ComplexityTier, current: Option<Stage>) -> Option<Stage> {
    let sequence = tier.stage_sequence();
    match current {
        None => sequence.first().copied(),
        Some(stage) => {
            let position = sequence.iter().position(|&s| s == stage)?;
            sequence.get(position + 1).copied()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_tier_sequence() {
        assert_eq!(
            ComplexityTier::Trivial.stage_sequence(),
            &[Stage::Implement, Stage::BuildVerify]
        );
        assert_eq!(ComplexityTier::Trivial.last_stage(), Stage::BuildVerify);
    }

    #[test]
    fn next_stage_walks_the_sequence() {
        let tier = ComplexityTier::Small;
        assert_eq!(next_stage(tier, None), Some(Stage::Implement));
        assert_eq!(next_stage(tier, Some(Stage::Implement)), Some(Stage::Test));
        assert_eq!(
            next_stage(tier, Some(Stage::BuildVerify)),
            None,
            "no stage follows the tier's last stage"
        );
    }

    #[test]
    fn current_stage_is_furthest_advanced_with_output() {
        let tier = ComplexityTier::Medium;
        let done = |s: Stage| matches!(s, Stage::Research | Stage::Plan | Stage::Implement);
        assert_eq!(current_stage(tier, done), Some(Stage::Implement));
    }

    #[test]
    fn tier_complete_checks_only_the_last_stage() {
        let tier = ComplexityTier::Medium;
        let mid_done = |s: Stage| matches!(s, Stage::Research | Stage::Plan);
        assert!(!is_tier_complete(tier, mid_done));
        let all_done = |_: Stage| true;
        assert!(is_tier_complete(tier, all_done));
    }

    #[test]
    fn ticket_ids_reject_the_stage_delimiter() {
        assert!(validate_ticket_id("T-100").is_ok());
        assert_eq!(
            validate_ticket_id("T:100"),
            Err(InvalidTicketId("T:100".to_string()))
        );
    }

    #[test]
    fn node_id_follows_the_convention() {
        assert_eq!(node_id("T-100", Stage::Implement), "T-100:implement");
    }
}
