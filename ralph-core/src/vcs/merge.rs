use git2::build::CheckoutBuilder;
use git2::{BranchType, CherrypickOptions, Error, ErrorCode, Index, Oid, Repository};
use std::path::Path;

/// Outcome of replaying a ticket branch onto a new destination.
#[derive(Debug, Clone)]
pub enum RebaseOutcome {
    Replayed { new_tip: Oid },
    Conflict { files: Vec<String> },
}

/// Cherry-pick every commit unique to `branch` (relative to its current
/// upstream `from`) onto `destination`, leaving `branch`'s bookmark pointing
/// at the replayed tip on success. On conflict the repository is left
/// mid-cherry-pick-free (`cleanup_state`) and the original branch tip is
/// untouched — the caller evicts rather than tries to resolve.
pub fn rebase_branch_onto<P: AsRef<Path>>(
    repo_path: P,
    branch: &str,
    from: &str,
    destination: &str,
) -> Result<RebaseOutcome, Error> {
    let repo = Repository::open(repo_path)?;
    let commits = super::commits::commits_since(repo_path.as_ref(), branch, from)?;

    let dest_oid = repo
        .find_branch(destination, BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();

    repo.set_head_detached(dest_oid)?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))?;

    let mut tip = dest_oid;
    for oid in &commits {
        let commit = repo.find_commit(*oid)?;
        let mut opts = CherrypickOptions::new();
        let mut checkout = CheckoutBuilder::new();
        checkout.force().allow_conflicts(true);
        opts.checkout_builder(checkout);

        if let Err(err) = repo.cherrypick(&commit, Some(&mut opts))
            && err.code() != ErrorCode::MergeConflict
        {
            return Err(err);
        }

        let mut index = repo.index()?;
        if index.has_conflicts() {
            let files = collect_conflict_paths(&mut index);
            repo.cleanup_state().ok();
            let mut checkout = CheckoutBuilder::new();
            checkout.force();
            repo.reset(
                repo.find_commit(dest_oid)?.as_object(),
                git2::ResetType::Hard,
                Some(&mut checkout),
            )?;
            return Ok(RebaseOutcome::Conflict { files });
        }

        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = repo.find_tree(tree_oid)?;
        let sig = repo.signature()?;
        let parent = repo.find_commit(tip)?;
        let message = commit.message().unwrap_or("replayed commit");
        tip = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?;

        repo.cleanup_state().ok();
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_head(Some(&mut checkout))?;
    }

    repo.find_branch(branch, BranchType::Local)?
        .into_reference()
        .set_target(tip, "replayed onto new destination")?;
    checkout_branch(repo_path.as_ref(), branch)?;

    Ok(RebaseOutcome::Replayed { new_tip: tip })
}

fn checkout_branch<P: AsRef<Path>>(repo_path: P, name: &str) -> Result<(), Error> {
    super::branches::checkout_branch(repo_path, name)
}

fn collect_conflict_paths(index: &mut Index) -> Vec<String> {
    let mut paths = std::collections::HashSet::new();
    for conflict in index.conflicts().into_iter().flatten().flatten() {
        for entry in [conflict.ancestor, conflict.our, conflict.their] {
            if let Some(entry) = entry {
                paths.insert(String::from_utf8_lossy(&entry.path).to_string());
            }
        }
    }
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();
    paths
}

/// Fast-forward `mainline` to `target`'s tip, checking it out.
pub fn fast_forward_to<P: AsRef<Path>>(
    repo_path: P,
    mainline: &str,
    target: &str,
) -> Result<Oid, Error> {
    let repo = Repository::open(repo_path)?;
    let target_oid = repo
        .find_branch(target, BranchType::Local)?
        .get()
        .peel_to_commit()?
        .id();
    repo.find_branch(mainline, BranchType::Local)?
        .into_reference()
        .set_target(target_oid, "fast-forward")?;
    Ok(target_oid)
}
