use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    desired::DesiredState,
    error::{Result, SyncError},
};

/// Seconds a git command may run when an entry does not say otherwise.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// A TOML document declaring repositories to keep in sync.
///
/// ```toml
/// [[repository]]
/// url = "https://example.com/app.git"
/// target = "/srv/app"
/// branch = "main"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Declared repositories, reconciled in order.
    #[serde(default, rename = "repository")]
    pub repositories: Vec<RepositoryEntry>,
}

/// One `[[repository]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryEntry {
    /// Remote repository location.
    pub url: String,
    /// Absolute working directory path.
    pub target: PathBuf,
    /// Local branch to keep checked out.
    pub branch: Option<String>,
    /// User to run git as.
    pub user: Option<String>,
    /// Group to run git as.
    pub group: Option<String>,
    /// Per-command limit in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Program git uses in place of `ssh`.
    pub ssh_wrapper: Option<PathBuf>,
    /// Extra environment for every git command.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// Serde default for [`RepositoryEntry::timeout`].
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Manifest {
    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| SyncError::Manifest {
            path: path.to_path_buf(),
            message: format!("failed to read: {e}"),
        })?;
        Self::parse(&contents, path)
    }

    /// Parse manifest text; `origin` only labels errors.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self> {
        let manifest: Self = toml::from_str(contents).map_err(|e| SyncError::Manifest {
            path: origin.to_path_buf(),
            message: e.message().to_string(),
        })?;
        if manifest.repositories.is_empty() {
            return Err(SyncError::Manifest {
                path: origin.to_path_buf(),
                message: "no [[repository]] entries".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Validate every entry, in declaration order.
    pub fn desired_states(&self) -> Result<Vec<DesiredState>> {
        self.repositories
            .iter()
            .map(RepositoryEntry::to_desired)
            .collect()
    }
}

impl RepositoryEntry {
    /// Build the validated desired state this entry declares.
    pub fn to_desired(&self) -> Result<DesiredState> {
        let mut builder = DesiredState::builder(self.url.as_str(), self.target.as_path())
            .timeout(Duration::from_secs(self.timeout));
        if let Some(branch) = &self.branch {
            builder = builder.branch(branch.as_str());
        }
        if let Some(user) = &self.user {
            builder = builder.user(user.as_str());
        }
        if let Some(group) = &self.group {
            builder = builder.group(group.as_str());
        }
        if let Some(wrapper) = &self.ssh_wrapper {
            builder = builder.ssh_wrapper(wrapper.as_path());
        }
        for (key, value) in &self.environment {
            builder = builder.env(key.as_str(), value.as_str());
        }
        builder.build()
    }
}
