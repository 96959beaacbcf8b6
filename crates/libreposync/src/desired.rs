use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{Result, SyncError};

/// Branch checked out when none is requested.
pub const DEFAULT_BRANCH: &str = "master";

/// Prefix marking a remote-tracking reference.
pub const REMOTE_PREFIX: &str = "origin/";

/// Run-as user and group for every git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// User name; its home directory becomes `HOME` for git.
    pub user: Option<String>,
    /// Group name.
    pub group: Option<String>,
}

impl Identity {
    /// True when neither user nor group is set.
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.group.is_none()
    }
}

/// The declared state a target should converge to. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    /// Source repository location.
    url: String,
    /// Local branch to have checked out.
    branch: String,
    /// Absolute path of the working directory.
    target: PathBuf,
    /// Optional run-as identity.
    identity: Identity,
    /// Per-command execution limit.
    timeout: Option<Duration>,
    /// Value exported as `GIT_SSH`.
    ssh_wrapper: Option<PathBuf>,
    /// Extra environment for git.
    environment: BTreeMap<String, String>,
}

impl DesiredState {
    /// Start building a desired state for `url` checked out at `target`.
    pub fn builder(url: impl Into<String>, target: impl Into<PathBuf>) -> DesiredStateBuilder {
        DesiredStateBuilder {
            url: url.into(),
            target: target.into(),
            branch: None,
            identity: Identity::default(),
            timeout: None,
            ssh_wrapper: None,
            environment: BTreeMap::new(),
        }
    }

    /// Source repository location.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Desired branch name.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Target working directory.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Run-as identity, if one was configured.
    pub fn identity(&self) -> Option<&Identity> {
        (!self.identity.is_empty()).then_some(&self.identity)
    }

    /// Run-as user.
    pub fn user(&self) -> Option<&str> {
        self.identity.user.as_deref()
    }

    /// Run-as group.
    pub fn group(&self) -> Option<&str> {
        self.identity.group.as_deref()
    }

    /// Execution limit for each git command.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// SSH wrapper exported to git.
    pub fn ssh_wrapper(&self) -> Option<&Path> {
        self.ssh_wrapper.as_deref()
    }

    /// Extra environment variables for git.
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Directory that must exist before the target can be cloned.
    pub fn parent(&self) -> &Path {
        self.target.parent().unwrap_or(&self.target)
    }
}

/// Builder for [`DesiredState`]; all validation happens in [`DesiredStateBuilder::build`].
#[derive(Debug, Clone)]
pub struct DesiredStateBuilder {
    /// Source repository location.
    url: String,
    /// Target working directory.
    target: PathBuf,
    /// Requested branch, defaulted on build.
    branch: Option<String>,
    /// Run-as identity.
    identity: Identity,
    /// Per-command execution limit.
    timeout: Option<Duration>,
    /// Value exported as `GIT_SSH`.
    ssh_wrapper: Option<PathBuf>,
    /// Extra environment for git.
    environment: BTreeMap<String, String>,
}

impl DesiredStateBuilder {
    /// Branch to check out.
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Run git as `user`.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.identity.user = Some(user.into());
        self
    }

    /// Run git with group `group`.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.identity.group = Some(group.into());
        self
    }

    /// Kill any git command that runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use `wrapper` as `GIT_SSH`.
    pub fn ssh_wrapper(mut self, wrapper: impl Into<PathBuf>) -> Self {
        self.ssh_wrapper = Some(wrapper.into());
        self
    }

    /// Pass `key=value` through to every git command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Validate and freeze the desired state.
    pub fn build(self) -> Result<DesiredState> {
        if self.url.trim().is_empty() {
            return Err(SyncError::Configuration(
                "repository url must not be empty".to_string(),
            ));
        }
        if !self.target.is_absolute() {
            return Err(SyncError::Configuration(format!(
                "target {} must be an absolute path",
                self.target.display()
            )));
        }

        let branch = self.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        if branch.trim().is_empty() {
            return Err(SyncError::Configuration(
                "branch must not be empty".to_string(),
            ));
        }
        if let Some(suggestion) = local_branch_for(&branch) {
            return Err(SyncError::InvalidRemoteReference {
                suggestion: suggestion.to_string(),
                branch,
            });
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(SyncError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }

        Ok(DesiredState {
            url: self.url,
            branch,
            target: self.target,
            identity: self.identity,
            timeout: self.timeout,
            ssh_wrapper: self.ssh_wrapper,
            environment: self.environment,
        })
    }
}

/// If `branch` names a remote-tracking reference, return the local branch it shadows.
pub fn local_branch_for(branch: &str) -> Option<&str> {
    branch.strip_prefix(REMOTE_PREFIX)
}
