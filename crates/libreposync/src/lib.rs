#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Core library for keeping git working directories in sync with a remote branch.
//!
//! A reconciliation pass observes the target directory, checks its
//! preconditions and then clones, fetches, checks out or pulls as needed,
//! refusing to discard uncommitted work or unpushed commits. All repository
//! work is delegated to the external `git` tool through a [`CommandRunner`].
//! The CLI binary in `crates/reposync` builds on top of this library.

/// Named preconditions and their evaluation.
mod assertions;
/// Validated description of the state to converge to.
mod desired;
/// The reconciliation decision engine.
mod engine;
/// Error type shared by every module.
mod error;
/// Git operations and queries bound to one desired state.
mod git;
/// Run-as user and group resolution.
mod identity;
/// TOML manifests declaring many repositories.
mod manifest;
/// Observation of the target's current state.
mod probe;
/// Change reporting.
mod report;
/// Execution of git commands.
mod runner;
/// Shared value types.
mod types;

/// Re-exports for precondition checking.
pub use assertions::{Action, Assertion, FailureKind, Gate, Verdict, preconditions, validate};
/// Re-exports for describing the desired state.
pub use desired::{
    DEFAULT_BRANCH, DesiredState, DesiredStateBuilder, Identity, REMOTE_PREFIX, local_branch_for,
};
/// Re-export of the engine entry points.
pub use engine::{Reconciler, reconcile};
/// Re-export of the error type.
pub use error::{Result, SyncError};
/// Re-export of the git operations.
pub use git::Git;
/// Re-exports for identity resolution.
pub use identity::{ResolvedIdentity, resolve as resolve_identity};
/// Re-exports for manifests.
pub use manifest::{DEFAULT_TIMEOUT_SECS, Manifest, RepositoryEntry};
/// Re-exports for probing.
pub use probe::{is_repository, probe, target_is_vacant};
/// Re-exports for reporting abstractions and implementations.
pub use report::{Event, Quiet, Recorder, Reporter};
/// Re-exports for running commands.
pub use runner::{CommandOutput, CommandRunner, GitCommand, ProcessRunner, RunContext};
/// Re-exports of the shared value types.
pub use types::{CurrentState, DiffCounts, Mode, Operation, Outcome};
