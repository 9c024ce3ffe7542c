//! Structural validation for a merged [`WorkflowConfig`]. Collects every problem found rather than stopping at the first,
//! matching the reference architecture's "report everything wrong in one
//! pass" config-validation style.

use std::fmt;

use ralph_kernel::config::WorkflowConfig;

pub const MAX_CONCURRENCY_RANGE: std::ops::RangeInclusive<u32> = 1..=32;

/// Recognized `build_cmds`/`test_cmds` ecosystem keys (spec §4.15: "ordered
/// maps keyed by ecosystem name").
pub const KNOWN_ECOSYSTEMS: &[&str] = &[
    "rust", "node", "python", "go", "java", "ruby", "docker", "make", "generic",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingField { field: &'static str },
    ConcurrencyOutOfRange { value: u32 },
    ZeroSpeculativeDepth,
    NoAgentsConfigured,
    MissingSchedulerAgent,
    MissingMergeQueueAgent,
    DuplicateAgentId { id: String },
    UnknownEcosystem { field: &'static str, key: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingField { field } => write!(f, "missing required field `{field}`"),
            ConfigError::ConcurrencyOutOfRange { value } => write!(
                f,
                "max_concurrency {value} out of range {}..={}",
                MAX_CONCURRENCY_RANGE.start(),
                MAX_CONCURRENCY_RANGE.end()
            ),
            ConfigError::ZeroSpeculativeDepth => {
                write!(f, "max_speculative_depth must be at least 1")
            }
            ConfigError::NoAgentsConfigured => write!(f, "no agents configured"),
            ConfigError::MissingSchedulerAgent => write!(f, "no agent marked `is_scheduler`"),
            ConfigError::MissingMergeQueueAgent => write!(f, "no agent marked `is_merge_queue`"),
            ConfigError::DuplicateAgentId { id } => write!(f, "duplicate agent id `{id}`"),
            ConfigError::UnknownEcosystem { field, key } => write!(
                f,
                "`{field}` names unknown ecosystem `{key}` (expected one of {KNOWN_ECOSYSTEMS:?})"
            ),
        }
    }
}

/// Validates `config`, returning every structural problem found.
pub fn validate(config: &WorkflowConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if config.project_name.is_empty() {
        errors.push(ConfigError::MissingField { field: "project_name" });
    }
    if config.repo_root.is_empty() {
        errors.push(ConfigError::MissingField { field: "repo_root" });
    }
    if config.specs_path.is_empty() {
        errors.push(ConfigError::MissingField { field: "specs_path" });
    }

    if !MAX_CONCURRENCY_RANGE.contains(&config.max_concurrency) {
        errors.push(ConfigError::ConcurrencyOutOfRange {
            value: config.max_concurrency,
        });
    }

    if config.max_speculative_depth == 0 {
        errors.push(ConfigError::ZeroSpeculativeDepth);
    }

    if config.agents.is_empty() {
        errors.push(ConfigError::NoAgentsConfigured);
    } else {
        if config.scheduler_agent().is_none() {
            errors.push(ConfigError::MissingSchedulerAgent);
        }
        if config.merge_queue_agent().is_none() {
            errors.push(ConfigError::MissingMergeQueueAgent);
        }
        let mut seen = std::collections::HashSet::new();
        for agent in &config.agents {
            if !seen.insert(agent.id.as_str()) {
                errors.push(ConfigError::DuplicateAgentId { id: agent.id.clone() });
            }
        }
    }

    for key in config.build_cmds.keys() {
        if !KNOWN_ECOSYSTEMS.contains(&key.as_str()) {
            errors.push(ConfigError::UnknownEcosystem {
                field: "build_cmds",
                key: key.clone(),
            });
        }
    }
    for key in config.test_cmds.keys() {
        if !KNOWN_ECOSYSTEMS.contains(&key.as_str()) {
            errors.push(ConfigError::UnknownEcosystem {
                field: "test_cmds",
                key: key.clone(),
            });
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use ralph_kernel::config::{AgentProfile, OrderingStrategy};
    use std::collections::BTreeMap;

    fn valid() -> WorkflowConfig {
        WorkflowConfig {
            project_name: "demo".into(),
            repo_root: ".".into(),
            specs_path: "specs".into(),
            reference_files: vec![],
            build_cmds: BTreeMap::new(),
            test_cmds: BTreeMap::new(),
            pre_land_checks: vec![],
            post_land_checks: vec![],
            code_style: vec![],
            review_checklist: vec![],
            max_concurrency: 6,
            main_branch: "main".into(),
            max_speculative_depth: 3,
            ordering_strategy: OrderingStrategy::PriorityFirst,
            agents: vec![
                AgentProfile {
                    id: "scheduler".into(),
                    kind: "claude".into(),
                    model: "sonnet".into(),
                    is_scheduler: true,
                    is_merge_queue: false,
                },
                AgentProfile {
                    id: "mq".into(),
                    kind: "claude".into(),
                    model: "sonnet".into(),
                    is_scheduler: false,
                    is_merge_queue: true,
                },
            ],
        }
    }

    #[test]
    fn valid_config_has_no_errors() {
        assert!(validate(&valid()).is_empty());
    }

    #[test]
    fn rejects_concurrency_out_of_range() {
        let mut cfg = valid();
        cfg.max_concurrency = 0;
        assert!(validate(&cfg).contains(&ConfigError::ConcurrencyOutOfRange { value: 0 }));

        let mut cfg = valid();
        cfg.max_concurrency = 33;
        assert!(validate(&cfg).contains(&ConfigError::ConcurrencyOutOfRange { value: 33 }));
    }

    #[test]
    fn rejects_zero_speculative_depth() {
        let mut cfg = valid();
        cfg.max_speculative_depth = 0;
        assert!(validate(&cfg).contains(&ConfigError::ZeroSpeculativeDepth));
    }

    #[test]
    fn rejects_missing_scheduler_or_merge_queue_agent() {
        let mut cfg = valid();
        cfg.agents.retain(|a| !a.is_scheduler);
        assert!(validate(&cfg).contains(&ConfigError::MissingSchedulerAgent));
    }

    #[test]
    fn rejects_unknown_ecosystem_keys() {
        let mut cfg = valid();
        cfg.build_cmds.insert("cobol".into(), "compile.sh".into());
        assert!(validate(&cfg).contains(&ConfigError::UnknownEcosystem {
            field: "build_cmds",
            key: "cobol".into(),
        }));
    }

    #[test]
    fn accepts_known_ecosystem_keys() {
        let mut cfg = valid();
        cfg.build_cmds.insert("rust".into(), "cargo build".into());
        cfg.test_cmds.insert("node".into(), "npm test".into());
        assert!(validate(&cfg).is_empty());
    }

    #[test]
    fn collects_multiple_errors_at_once() {
        let mut cfg = valid();
        cfg.max_concurrency = 0;
        cfg.max_speculative_depth = 0;
        let errors = validate(&cfg);
        assert!(errors.len() >= 2);
    }
}
