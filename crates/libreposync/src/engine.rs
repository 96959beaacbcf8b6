use crate::{
    assertions::{Action, preconditions, validate},
    desired::DesiredState,
    error::{Result, SyncError},
    git::Git,
    identity,
    probe::{probe, target_is_vacant},
    report::Reporter,
    runner::CommandRunner,
    types::{CurrentState, Mode, Operation, Outcome},
};

/// Drives one reconciliation pass: probe, validate, decide, operate.
///
/// Nothing survives a pass; running it again re-derives every decision from
/// the filesystem and git.
pub struct Reconciler<'a> {
    /// State to converge to.
    desired: &'a DesiredState,
    /// Executes git.
    runner: &'a dyn CommandRunner,
    /// Receives change and assumption reports.
    reporter: &'a dyn Reporter,
    /// Whether mutating operations run.
    mode: Mode,
}

impl<'a> Reconciler<'a> {
    /// Prepare a pass in [`Mode::Normal`].
    pub fn new(
        desired: &'a DesiredState,
        runner: &'a dyn CommandRunner,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            desired,
            runner,
            reporter,
            mode: Mode::Normal,
        }
    }

    /// Select the pass mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the pass.
    pub fn run(&self) -> Result<Outcome> {
        let identity = self.desired.identity().map(identity::resolve).transpose()?;
        let git = Git::new(self.runner, self.desired, identity);

        let current = probe(&git)?;
        let assertions = preconditions(&git, &current);
        validate(
            &assertions,
            Action::Create,
            self.desired,
            self.mode,
            self.reporter,
        )?;

        let mut pass = Pass {
            git: &git,
            reporter: self.reporter,
            mode: self.mode,
            operations: Vec::new(),
        };
        pass.converge(&current)?;
        Ok(Outcome {
            mode: self.mode,
            operations: pass.operations,
        })
    }
}

/// Run a single pass for `desired`.
pub fn reconcile(
    desired: &DesiredState,
    runner: &dyn CommandRunner,
    reporter: &dyn Reporter,
    mode: Mode,
) -> Result<Outcome> {
    Reconciler::new(desired, runner, reporter).mode(mode).run()
}

/// Mutable bookkeeping for the decision phase of a pass.
struct Pass<'g, 'a> {
    /// Operations bound to the desired state.
    git: &'g Git<'a>,
    /// Receives change reports.
    reporter: &'g dyn Reporter,
    /// Whether mutating operations run.
    mode: Mode,
    /// Operations performed so far, in order.
    operations: Vec<Operation>,
}

impl Pass<'_, '_> {
    /// Select and perform the operations that move the target towards the desired state.
    fn converge(&mut self, current: &CurrentState) -> Result<()> {
        let git = self.git;
        let desired = git.desired();
        if target_is_vacant(desired.target())? {
            return self.perform(Operation::Clone);
        }
        if !current.exists {
            return Err(SyncError::RepositoryConflict {
                target: desired.target().to_path_buf(),
                message: "target exists and is not a git repository".to_string(),
            });
        }

        self.perform(Operation::Fetch)?;

        if current.branch.as_deref() != Some(desired.branch()) {
            if git.is_dirty()? {
                return Err(SyncError::RepositoryDirty {
                    target: desired.target().to_path_buf(),
                });
            }
            let counts = git.diff_counts()?;
            if counts.ahead > 0 {
                return Err(SyncError::DivergedAhead {
                    branch: current
                        .branch
                        .clone()
                        .unwrap_or_else(|| desired.branch().to_string()),
                    target: desired.target().to_path_buf(),
                    ahead: counts.ahead,
                });
            }
            return self.perform(Operation::Checkout {
                branch: desired.branch().to_string(),
            });
        }

        // A dirty tree on the right branch is left alone.
        if !git.is_dirty()? {
            let counts = git.diff_counts()?;
            if counts.ahead == 0 && counts.behind > 0 {
                self.perform(Operation::Pull)?;
            }
        }
        Ok(())
    }

    /// Run `operation`, or only describe it when it is reported and the pass is simulated.
    fn perform(&mut self, operation: Operation) -> Result<()> {
        match operation.description(self.git.desired()) {
            Some(description) if self.mode.is_simulate() => {
                self.reporter.would_change(&description);
            }
            Some(description) => {
                self.git.apply(&operation)?;
                self.reporter.changed(&description);
            }
            None => self.git.apply(&operation)?,
        }
        self.operations.push(operation);
        Ok(())
    }
}
