use git2::{DiffOptions, Error, Oid, Repository, Sort};
use std::path::Path;

/// Stage the full worktree and commit, returning the new commit's oid.
pub fn commit_all<P: AsRef<Path>>(repo_path: P, message: &str) -> Result<Oid, Error> {
    let repo = Repository::open(repo_path)?;
    let mut index = repo.index()?;
    index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let sig = repo.signature()?;
    let parent = repo.head()?.peel_to_commit()?;
    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;
    Ok(oid)
}

/// The one-line subjects of every commit reachable from `branch` but not
/// from `since`, newest first.
pub fn get_log<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    since: &str,
) -> Result<Vec<String>, Error> {
    let repo = Repository::open(repo_path)?;
    let branch_oid = repo
        .find_branch(branch, git2::BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();
    let since_oid = repo
        .find_branch(since, git2::BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    walk.push(branch_oid)?;
    walk.hide(since_oid)?;

    let mut subjects = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        subjects.push(commit.summary().unwrap_or("").to_string());
    }
    Ok(subjects)
}

/// Same commits as [`get_log`], but as full oids (for cherry-pick replay).
pub fn commits_since<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    since: &str,
) -> Result<Vec<Oid>, Error> {
    let repo = Repository::open(repo_path)?;
    let branch_oid = repo
        .find_branch(branch, git2::BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();
    let since_oid = repo
        .find_branch(since, git2::BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    walk.push(branch_oid)?;
    walk.hide(since_oid)?;
    walk.collect()
}

/// File-level summary of the diff between `branch` and `since`.
pub fn diff_summary_since<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    since: &str,
) -> Result<Vec<String>, Error> {
    let repo = Repository::open(repo_path)?;
    let branch_tree = repo
        .find_branch(branch, git2::BranchType::Local)?
        .get()
        .peel_to_tree()?;
    let since_tree = repo
        .find_branch(since, git2::BranchType::Local)?
        .get()
        .peel_to_tree()?;

    let mut opts = DiffOptions::new();
    let diff = repo.diff_tree_to_tree(Some(&since_tree), Some(&branch_tree), Some(&mut opts))?;
    let stats = diff.stats()?;
    let mut lines = Vec::new();
    diff.foreach(
        &mut |delta, _| {
            if let Some(path) = delta.new_file().path() {
                lines.push(path.display().to_string());
            }
            true
        },
        None,
        None,
        None,
    )?;
    lines.push(format!(
        "{} file(s) changed, {} insertion(s), {} deletion(s)",
        stats.files_changed(),
        stats.insertions(),
        stats.deletions()
    ));
    Ok(lines)
}

/// The commit `branch` diverged from `other` at — the point the eviction
/// context builder calls the "branch point".
pub fn merge_base<P: AsRef<Path>>(repo_path: P, branch: &str, other: &str) -> Result<Oid, Error> {
    let repo = Repository::open(repo_path)?;
    let branch_oid = repo
        .find_branch(branch, git2::BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();
    let other_oid = repo
        .find_branch(other, git2::BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();
    repo.merge_base(branch_oid, other_oid)
}

/// [`get_log`], but `since` is an already-resolved commit oid rather than a
/// branch name — used when the divergence point is a merge-base rather
/// than another branch's current tip.
pub fn get_log_since_oid<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    since: Oid,
) -> Result<Vec<String>, Error> {
    let repo = Repository::open(repo_path)?;
    let branch_oid = repo
        .find_branch(branch, git2::BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();

    let mut walk = repo.revwalk()?;
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    walk.push(branch_oid)?;
    walk.hide(since)?;

    let mut subjects = Vec::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        subjects.push(commit.summary().unwrap_or("").to_string());
    }
    Ok(subjects)
}

/// [`diff_summary_since`], but `since` is an already-resolved commit oid.
pub fn diff_summary_since_oid<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    since: Oid,
) -> Result<Vec<String>, Error> {
    let repo = Repository::open(repo_path)?;
    let branch_tree = repo
        .find_branch(branch, git2::BranchType::Local)?
        .get()
        .peel_to_tree()?;
    let since_tree = repo.find_commit(since)?.tree()?;

    let mut opts = DiffOptions::new();
    let diff = repo.diff_tree_to_tree(Some(&since_tree), Some(&branch_tree), Some(&mut opts))?;
    let stats = diff.stats()?;
    let mut lines = Vec::new();
    diff.foreach(
        &mut |delta, _| {
            if let Some(path) = delta.new_file().path() {
                lines.push(path.display().to_string());
            }
            true
        },
        None,
        None,
        None,
    )?;
    lines.push(format!(
        "{} file(s) changed, {} insertion(s), {} deletion(s)",
        stats.files_changed(),
        stats.insertions(),
        stats.deletions()
    ));
    Ok(lines)
}
