//! Built-in defaults for every optional section of [`WorkflowConfig`].

use std::collections::BTreeMap;

use ralph_kernel::config::{OrderingStrategy, WorkflowConfig};

pub const DEFAULT_MAX_CONCURRENCY: u32 = 6;
pub const DEFAULT_MAIN_BRANCH: &str = "main";
pub const DEFAULT_MAX_SPECULATIVE_DEPTH: u32 = 3;

/// A `WorkflowConfig` with every field at its built-in default.
/// `project_name`/`repo_root`/`specs_path` have no sensible default (the
/// reference architecture always asks the operator for these), so they
/// are left empty here and `validate::validate` rejects them if the file
/// layer never fills them in.
pub fn defaults() -> WorkflowConfig {
    WorkflowConfig {
        project_name: String::new(),
        repo_root: String::new(),
        specs_path: String::new(),
        reference_files: Vec::new(),
        build_cmds: BTreeMap::new(),
        test_cmds: BTreeMap::new(),
        pre_land_checks: Vec::new(),
        post_land_checks: Vec::new(),
        code_style: Vec::new(),
        review_checklist: Vec::new(),
        max_concurrency: DEFAULT_MAX_CONCURRENCY,
        main_branch: DEFAULT_MAIN_BRANCH.to_string(),
        max_speculative_depth: DEFAULT_MAX_SPECULATIVE_DEPTH,
        ordering_strategy: OrderingStrategy::default(),
        agents: Vec::new(),
    }
}
