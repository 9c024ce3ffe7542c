//! Workspace lifecycle: one disjoint worktree per ticket, created lazily
//! and torn down by the merge queue.

use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::vcs;

pub struct WorkspaceManager {
    repo_root: PathBuf,
    workspaces_root: PathBuf,
    main_branch: String,
}

impl WorkspaceManager {
    pub fn new(repo_root: impl Into<PathBuf>, main_branch: impl Into<String>) -> Self {
        let repo_root = repo_root.into();
        let workspaces_root = std::env::temp_dir();
        WorkspaceManager {
            repo_root,
            workspaces_root,
            main_branch: main_branch.into(),
        }
    }

    fn worktree_name(&self, ticket_id: &str) -> String {
        format!("workflow-wt-{ticket_id}")
    }

    pub fn branch_name(&self, ticket_id: &str) -> String {
        format!("ticket/{ticket_id}")
    }

    pub fn path(&self, ticket_id: &str) -> PathBuf {
        self.workspaces_root.join(self.worktree_name(ticket_id))
    }

    /// Idempotent: returns the existing path if the workspace is already
    /// present, otherwise creates the branch bookmark and worktree.
    pub fn ensure(&self, ticket_id: &str) -> Result<PathBuf> {
        let path = self.path(ticket_id);
        if path.exists() {
            return Ok(path);
        }

        std::fs::create_dir_all(&self.workspaces_root)?;
        let branch = self.branch_name(ticket_id);
        if !vcs::branch_exists(&self.repo_root, &branch)? {
            vcs::create_branch_from_head(&self.repo_root, &self.main_branch, &branch)?;
        }
        vcs::add_worktree_for_branch(&self.repo_root, &self.worktree_name(ticket_id), &path, &branch)?;
        Ok(path)
    }

    /// Destroy the workspace and its branch bookmark.
    pub fn destroy(&self, ticket_id: &str) -> Result<()> {
        let name = self.worktree_name(ticket_id);
        if vcs::find_worktree_name_by_path(&self.repo_root, self.path(ticket_id))?.is_some() {
            vcs::remove_worktree(&self.repo_root, &name, true)?;
        }
        vcs::delete_branch(&self.repo_root, &self.branch_name(ticket_id))?;
        Ok(())
    }

    /// Startup reaping of worktrees whose directories were orphaned by a
    /// previous crash (an open question decision, not named by the
    /// original source material: any worktree directory under
    /// `workspaces_root` with no live ticket reference gets pruned).
    pub fn reap_orphans(&self, live_ticket_ids: &[String]) -> Result<Vec<String>> {
        let mut reaped = Vec::new();
        if !self.workspaces_root.exists() {
            return Ok(reaped);
        }
        for entry in std::fs::read_dir(&self.workspaces_root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(ticket_id) = name.strip_prefix("workflow-wt-") else {
                continue;
            };
            if live_ticket_ids.iter().any(|id| id == ticket_id) {
                continue;
            }
            if let Some(wt_name) =
                vcs::find_worktree_name_by_path(&self.repo_root, entry.path())?
            {
                vcs::remove_worktree(&self.repo_root, &wt_name, true)?;
            }
            reaped.push(ticket_id.to_string());
        }
        Ok(reaped)
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

pub fn ensure_clean(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(EngineError::Vcs {
            operation: "ensure_clean".into(),
            detail: format!("workspace path {} does not exist", path.display()),
        });
    }
    Ok(())
}
