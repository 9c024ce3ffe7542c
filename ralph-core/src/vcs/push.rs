use git2::{Cred, Error, PushOptions, RemoteCallbacks, Repository};
use std::path::Path;

/// Push a branch bookmark to the `origin` git peer. Tries the ssh-agent, then a default
/// credential helper — the engine only ever pushes as the operator's own
/// configured git identity, so a broader credential-strategy matrix isn't needed.
pub fn push_branch<P: AsRef<Path>>(repo_path: P, branch: &str) -> Result<(), Error> {
    let repo = Repository::open(repo_path)?;
    let mut remote = repo.find_remote("origin")?;

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(|_url, username_from_url, allowed| {
        if allowed.is_ssh_key() {
            if let Some(username) = username_from_url {
                return Cred::ssh_key_from_agent(username);
            }
        }
        Cred::default()
    });

    let mut push_opts = PushOptions::new();
    push_opts.remote_callbacks(callbacks);

    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    remote.push(&[refspec.as_str()], Some(&mut push_opts))
}
