use std::{fs, path::Path};

use tracing::debug;

use crate::{error::Result, git::Git, types::CurrentState};

/// Whether `target` holds git metadata.
pub fn is_repository(target: &Path) -> bool {
    target.join(".git").exists()
}

/// Whether `target` is missing or an empty directory, i.e. safe to clone into.
pub fn target_is_vacant(target: &Path) -> Result<bool> {
    if !target.exists() {
        return Ok(true);
    }
    if !target.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(target)?.next().is_none())
}

/// Observe what the target currently holds.
///
/// An empty state means the target is not a repository yet. A repository
/// always reports a url, empty when it has no `origin` remote.
pub fn probe(git: &Git<'_>) -> Result<CurrentState> {
    let target = git.desired().target();
    debug!(target = %target.display(), "finding current git repository metadata");
    if !is_repository(target) {
        return Ok(CurrentState::default());
    }

    let state = CurrentState {
        exists: true,
        url: Some(git.remote_url()?),
        branch: git.current_branch()?,
    };
    debug!(url = ?state.url, branch = ?state.branch, "probed current repository");
    Ok(state)
}
