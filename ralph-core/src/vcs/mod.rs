//! The functional-VCS port the engine drives: a named mainline, branch
//! bookmarks, and disjoint worktrees.
//!
//! Every public function takes an explicit repo path — there is exactly
//! one repository in play (the project under `repo_root`), but threading
//! the path rather than discovering it from the current directory keeps
//! these functions safe to call concurrently from multiple worktrees.

pub mod branches;
pub mod commits;
pub mod merge;
pub mod push;
pub mod worktrees;

pub use branches::{
    branch_exists, checkout_branch, create_branch_from_head, delete_branch, detect_primary_branch,
};
pub use commits::{
    commit_all, commits_since, diff_summary_since, diff_summary_since_oid, get_log,
    get_log_since_oid, merge_base,
};
pub use merge::{RebaseOutcome, fast_forward_to, rebase_branch_onto};
pub use push::push_branch;
pub use worktrees::{add_worktree_for_branch, find_worktree_name_by_path, remove_worktree};
