use crate::{
    desired::{DesiredState, local_branch_for},
    error::{Result, SyncError},
    git::Git,
    report::Reporter,
    types::{CurrentState, Mode},
};

/// Actions a pass can perform. Converging a repository is the only one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Bring the target to the desired state.
    Create,
}

/// Which actions an assertion must hold for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Checked before [`Action::Create`].
    Create,
    /// Checked before every action.
    AllActions,
}

impl Gate {
    /// Whether this gate guards `action`.
    pub fn covers(self, action: Action) -> bool {
        match self {
            Self::AllActions => true,
            Self::Create => action == Action::Create,
        }
    }
}

/// The class of error an assertion raises when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The target's parent directory is missing.
    MissingParentDirectory,
    /// The branch names a remote-tracking reference.
    InvalidRemoteReference,
    /// Something conflicts with the desired repository.
    RepositoryConflict,
}

/// Result of evaluating one assertion.
#[derive(Debug)]
pub enum Verdict {
    /// The check held.
    Pass,
    /// The check failed and the pass must stop.
    Fail(SyncError),
    /// The check failed, but simulation mode assumes it would have held.
    Simulated(String),
}

/// A named precondition checked before the target is touched.
pub struct Assertion<'a> {
    /// Short identifier.
    pub name: &'static str,
    /// Actions it guards.
    pub gate: Gate,
    /// Error raised on failure.
    pub kind: FailureKind,
    /// Failure description.
    pub message: String,
    /// What simulation mode assumes on failure; `None` means failure is never softened.
    pub narrative: Option<String>,
    /// The predicate itself, evaluated lazily.
    check: Box<dyn Fn() -> Result<bool> + 'a>,
}

impl Assertion<'_> {
    /// Evaluate the check under `mode`.
    pub fn evaluate(&self, desired: &DesiredState, mode: Mode) -> Result<Verdict> {
        if (self.check)()? {
            return Ok(Verdict::Pass);
        }
        Ok(match (&self.narrative, mode) {
            (Some(narrative), Mode::Simulate) => Verdict::Simulated(narrative.clone()),
            _ => Verdict::Fail(self.error(desired)),
        })
    }

    /// The error this assertion raises.
    fn error(&self, desired: &DesiredState) -> SyncError {
        match self.kind {
            FailureKind::MissingParentDirectory => SyncError::MissingParentDirectory {
                target: desired.target().to_path_buf(),
                parent: desired.parent().to_path_buf(),
            },
            FailureKind::InvalidRemoteReference => SyncError::InvalidRemoteReference {
                branch: desired.branch().to_string(),
                suggestion: local_branch_for(desired.branch())
                    .unwrap_or(desired.branch())
                    .to_string(),
            },
            FailureKind::RepositoryConflict => SyncError::RepositoryConflict {
                target: desired.target().to_path_buf(),
                message: self.message.clone(),
            },
        }
    }
}

/// The preconditions for converging `git`'s desired state, in evaluation order.
pub fn preconditions<'b>(git: &'b Git<'_>, current: &CurrentState) -> Vec<Assertion<'b>> {
    let desired = git.desired();
    let target = desired.target().display().to_string();
    let parent = desired.parent().to_path_buf();
    let branch = desired.branch().to_string();

    let mut assertions = vec![
        Assertion {
            name: "parent-directory-exists",
            gate: Gate::Create,
            kind: FailureKind::MissingParentDirectory,
            message: format!(
                "Cannot clone {} to {target}, the enclosing directory {} does not exist",
                desired.url(),
                parent.display()
            ),
            narrative: Some(format!(
                "Directory {} does not exist, this run will fail unless it has been previously \
                 created. Assuming it would have been created.",
                parent.display()
            )),
            check: Box::new(move || Ok(parent.is_dir())),
        },
        Assertion {
            name: "branch-is-local",
            gate: Gate::AllActions,
            kind: FailureKind::InvalidRemoteReference,
            message: format!("Deploying remote branch {branch} is not supported"),
            narrative: None,
            check: Box::new(move || Ok(local_branch_for(&branch).is_none())),
        },
    ];

    if let Some(current_url) = current.url.clone() {
        let desired_url = desired.url().to_string();
        assertions.push(Assertion {
            name: "origin-url-matches",
            gate: Gate::Create,
            kind: FailureKind::RepositoryConflict,
            message: if current_url.is_empty() {
                "another git repository (without an origin) is already located here".to_string()
            } else {
                format!("another git repository (origin {current_url}) is already located here")
            },
            narrative: Some(format!(
                "Git repository at {target} has different origin url. Assuming it would have \
                 matched the specified value."
            )),
            check: Box::new(move || Ok(current_url == desired_url)),
        });
    }

    assertions.push(Assertion {
        name: "remote-branch-exists",
        gate: Gate::Create,
        kind: FailureKind::RepositoryConflict,
        message: format!("remote reference {} does not exist", desired.branch()),
        narrative: Some(
            "Git remote reference should be present. Assuming it would have been created."
                .to_string(),
        ),
        check: Box::new(move || git.remote_branch_exists()),
    });

    assertions
}

/// Evaluate every assertion guarding `action`, in order.
///
/// The first failure aborts, unless simulation mode softens it into a reported assumption.
pub fn validate(
    assertions: &[Assertion<'_>],
    action: Action,
    desired: &DesiredState,
    mode: Mode,
    reporter: &dyn Reporter,
) -> Result<()> {
    for assertion in assertions.iter().filter(|a| a.gate.covers(action)) {
        match assertion.evaluate(desired, mode)? {
            Verdict::Pass => {}
            Verdict::Simulated(narrative) => reporter.assumed(&narrative),
            Verdict::Fail(error) => return Err(error),
        }
    }
    Ok(())
}
