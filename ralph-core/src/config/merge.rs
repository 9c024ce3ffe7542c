//! Layers a [`PartialWorkflowConfig`] file override over the built-in
//! defaults, field by field.

use ralph_kernel::config::WorkflowConfig;

use super::PartialWorkflowConfig;
use super::defaults;

pub fn merge_with_defaults(partial: PartialWorkflowConfig) -> WorkflowConfig {
    let base = defaults::defaults();
    WorkflowConfig {
        project_name: partial.project_name.unwrap_or(base.project_name),
        repo_root: partial.repo_root.unwrap_or(base.repo_root),
        specs_path: partial.specs_path.unwrap_or(base.specs_path),
        reference_files: partial.reference_files.unwrap_or(base.reference_files),
        build_cmds: partial.build_cmds.unwrap_or(base.build_cmds),
        test_cmds: partial.test_cmds.unwrap_or(base.test_cmds),
        pre_land_checks: partial.pre_land_checks.unwrap_or(base.pre_land_checks),
        post_land_checks: partial.post_land_checks.unwrap_or(base.post_land_checks),
        code_style: partial.code_style.unwrap_or(base.code_style),
        review_checklist: partial.review_checklist.unwrap_or(base.review_checklist),
        max_concurrency: partial.max_concurrency.unwrap_or(base.max_concurrency),
        main_branch: partial.main_branch.unwrap_or(base.main_branch),
        max_speculative_depth: partial
            .max_speculative_depth
            .unwrap_or(base.max_speculative_depth),
        ordering_strategy: partial.ordering_strategy.unwrap_or(base.ordering_strategy),
        agents: partial.agents.unwrap_or(base.agents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_fall_back_to_defaults() {
        let partial = PartialWorkflowConfig {
            project_name: Some("demo".into()),
            ..Default::default()
        };
        let merged = merge_with_defaults(partial);
        assert_eq!(merged.project_name, "demo");
        assert_eq!(merged.main_branch, defaults::DEFAULT_MAIN_BRANCH);
        assert_eq!(merged.max_concurrency, defaults::DEFAULT_MAX_CONCURRENCY);
    }

    #[test]
    fn set_fields_override_defaults() {
        let partial = PartialWorkflowConfig {
            max_concurrency: Some(12),
            ..Default::default()
        };
        let merged = merge_with_defaults(partial);
        assert_eq!(merged.max_concurrency, 12);
    }
}
