//! Disposable git fixtures for the merge-queue scenario tests, built the same way the reference architecture's
//! own `tests` crate builds throwaway repos: a real `git2::Repository`
//! under a `tempfile::TempDir`, with a local bare `origin` so `push`
//! succeeds without any network access.

use std::path::{Path, PathBuf};

use git2::{Repository, Signature};
use tempfile::TempDir;

pub struct Fixture {
    pub _dir: TempDir,
    pub _origin_dir: TempDir,
    pub repo_root: PathBuf,
}

impl Fixture {
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

fn sig<'a>() -> Signature<'a> {
    Signature::now("ralph-test", "ralph-test@example.com").unwrap()
}

/// A repo with one commit on `main` and a local bare `origin` remote
/// pointed at it, so `vcs::push_branch` has somewhere to push.
pub fn init_repo() -> Fixture {
    let dir = TempDir::new().unwrap();
    let origin_dir = TempDir::new().unwrap();

    let origin = Repository::init_bare(origin_dir.path()).unwrap();
    drop(origin);

    let repo = Repository::init(dir.path()).unwrap();
    write_file(dir.path(), "README.md", "hello\n");
    let oid = {
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        repo.commit(Some("HEAD"), &sig(), &sig(), "initial commit", &tree, &[])
            .unwrap()
    };
    // `git2::Repository::init` leaves HEAD on whatever the system default
    // branch name is; pin it to `main` so the fixture matches the
    // configured default mainline name regardless of the host's git config.
    repo.reference("refs/heads/main", oid, true, "pin default branch")
        .unwrap();
    repo.set_head("refs/heads/main").unwrap();
    repo.remote("origin", origin_dir.path().to_str().unwrap()).unwrap();

    Fixture {
        _dir: dir,
        _origin_dir: origin_dir,
        repo_root: dir.path().to_path_buf(),
    }
}

fn write_file(repo_root: &Path, relative: &str, contents: &str) {
    std::fs::write(repo_root.join(relative), contents).unwrap();
}

/// Creates `branch` from `main`'s tip, writes `relative` with `contents`,
/// and commits — the shape every scenario uses to simulate a ticket's
/// Implement stage producing a change in its own workspace.
pub fn branch_with_commit(repo_root: &Path, branch: &str, relative: &str, contents: &str, message: &str) {
    ralph_core::vcs::create_branch_from_head(repo_root, "main", branch).unwrap();
    ralph_core::vcs::checkout_branch(repo_root, branch).unwrap();
    write_file(repo_root, relative, contents);
    ralph_core::vcs::commit_all(repo_root, message).unwrap();
    ralph_core::vcs::checkout_branch(repo_root, "main").unwrap();
}

pub fn head_summary(repo_root: &Path, branch: &str) -> String {
    let repo = Repository::open(repo_root).unwrap();
    repo.find_branch(branch, git2::BranchType::Local)
        .unwrap()
        .get()
        .peel_to_commit()
        .unwrap()
        .summary()
        .unwrap_or_default()
        .to_string()
}
