use std::{io, path::PathBuf, result::Result as StdResult, time::Duration};

use thiserror::Error;

/// Custom Result type for reconciliation passes.
pub type Result<T> = StdResult<T, SyncError>;

/// Errors that abort a reconciliation pass.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The desired state is malformed (empty url, relative target, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested branch names a remote-tracking reference rather than a local branch.
    #[error(
        "Deploying remote branches is not supported. Specify the remote branch as a local \
         branch for the git repository you're deploying from (ie: '{suggestion}' rather than '{branch}')."
    )]
    InvalidRemoteReference {
        /// Branch as configured.
        branch: String,
        /// Local-branch equivalent of the configured value.
        suggestion: String,
    },

    /// The directory that should contain the target does not exist.
    #[error(
        "Cannot clone to {}, the enclosing directory {} does not exist",
        target.display(),
        parent.display()
    )]
    MissingParentDirectory {
        /// Target working directory.
        target: PathBuf,
        /// Its missing parent.
        parent: PathBuf,
    },

    /// Something other than the desired repository occupies the target.
    #[error("Repository conflict at {}: {message}", target.display())]
    RepositoryConflict {
        /// Target working directory.
        target: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// A branch switch was requested but the working tree has uncommitted changes.
    #[error("Repository at {} is dirty", target.display())]
    RepositoryDirty {
        /// Target working directory.
        target: PathBuf,
    },

    /// A branch switch was requested but the current branch has unpushed commits.
    #[error(
        "Local branch {branch} of {} is {ahead} commit(s) ahead remote. Please push your changes",
        target.display()
    )]
    DivergedAhead {
        /// Branch checked out in the target.
        branch: String,
        /// Target working directory.
        target: PathBuf,
        /// Number of local-only commits.
        ahead: u32,
    },

    /// The run-as identity could not be resolved.
    #[error("Could not resolve identity for user '{user}': {message}")]
    Identity {
        /// User or group name that failed to resolve.
        user: String,
        /// Human-readable error description.
        message: String,
    },

    /// git exited with a status outside the acceptable set.
    #[error("Git command failed: {command} (exit code {code})\nError: {stderr}")]
    ToolExecution {
        /// Rendered command line.
        command: String,
        /// Exit code, or -1 when the process was killed by a signal.
        code: i32,
        /// The tool's stderr, trimmed.
        stderr: String,
    },

    /// git did not finish within the configured timeout and was killed.
    #[error("Git command timed out after {}s: {command}", timeout.as_secs())]
    Timeout {
        /// Rendered command line.
        command: String,
        /// Configured limit.
        timeout: Duration,
    },

    /// git succeeded but printed something that could not be interpreted.
    #[error("Unexpected output from {command}: '{output}'")]
    UnexpectedOutput {
        /// Rendered command line.
        command: String,
        /// The offending output, trimmed.
        output: String,
    },

    /// git could not be started at all.
    #[error("Failed to execute git command: {command}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying spawn failure.
        #[source]
        source: io::Error,
    },

    /// A manifest file could not be read or parsed.
    #[error("Invalid manifest {}: {message}", path.display())]
    Manifest {
        /// Path of the manifest.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// An underlying I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Return the recommended process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_)
            | Self::InvalidRemoteReference { .. }
            | Self::MissingParentDirectory { .. }
            | Self::RepositoryConflict { .. }
            | Self::Identity { .. }
            | Self::Manifest { .. } => 2,
            Self::RepositoryDirty { .. } | Self::DivergedAhead { .. } => 3,
            Self::ToolExecution { .. }
            | Self::Timeout { .. }
            | Self::Spawn { .. }
            | Self::UnexpectedOutput { .. } => 4,
            Self::Io(_) => 1,
        }
    }
}
