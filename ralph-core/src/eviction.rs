//! Eviction context builder: collects VCS diagnostics for a ticket whose
//! merge-queue attempt failed, so the next pipeline pass can see exactly
//! what went wrong.

use std::path::Path;

use git2::Oid;
use serde::Serialize;

use crate::error::Result;
use crate::vcs;

/// The diagnostic artifacts an eviction carries: what the branch tried to
/// land, and what mainline did instead while the branch was in flight.
#[derive(Debug, Clone, Serialize)]
pub struct EvictionContext {
    pub branch_commits: Vec<String>,
    pub diff_summary: Vec<String>,
    pub mainline_commits_since_branch_point: Vec<String>,
    /// The failing check's stdout/stderr, for `ci_failed` evictions (spec
    /// §4.12 step 8). `None` for rebase-conflict and review-gate evictions,
    /// which have no CI run to report.
    pub ci_output: Option<String>,
}

/// Builds an [`EvictionContext`] for `branch`, which diverged from mainline
/// at `branch_point`. Threaded verbatim into the ticket's next-pass
/// Research/Plan/Implement prompts.
pub fn build(
    repo_path: &Path,
    branch: &str,
    main_branch: &str,
    branch_point: Oid,
    ci_output: Option<String>,
) -> Result<EvictionContext> {
    let branch_commits = vcs::get_log_since_oid(repo_path, branch, branch_point)?;
    let diff_summary = vcs::diff_summary_since_oid(repo_path, branch, branch_point)?;
    let mainline_commits_since_branch_point =
        vcs::get_log_since_oid(repo_path, main_branch, branch_point)?;

    Ok(EvictionContext {
        branch_commits,
        diff_summary,
        mainline_commits_since_branch_point,
        ci_output,
    })
}
