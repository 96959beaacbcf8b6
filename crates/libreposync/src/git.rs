use crate::{
    desired::{DEFAULT_BRANCH, DesiredState},
    error::{Result, SyncError},
    identity::ResolvedIdentity,
    runner::{CommandOutput, CommandRunner, GitCommand, RunContext},
    types::{DiffCounts, Operation},
};

/// `git config --get` exits 1 when the key is unset.
const CONFIG_UNSET: i32 = 1;

/// `git rev-parse` exits 128 on an unborn or otherwise unresolvable HEAD.
const REV_PARSE_FATAL: i32 = 128;

/// Git operations and queries for one desired state, all sharing one execution context.
pub struct Git<'a> {
    /// Executes the commands.
    runner: &'a dyn CommandRunner,
    /// What the operations converge towards.
    desired: &'a DesiredState,
    /// Identity, timeout and environment applied to every command.
    base: RunContext,
}

impl<'a> Git<'a> {
    /// Bind `runner` to `desired`, running as `identity` when given.
    pub fn new(
        runner: &'a dyn CommandRunner,
        desired: &'a DesiredState,
        identity: Option<ResolvedIdentity>,
    ) -> Self {
        let mut base = RunContext::new()
            .with_identity(identity)
            .with_timeout(desired.timeout())
            .with_env("GIT_TERMINAL_PROMPT", "0");
        for (key, value) in desired.environment() {
            base = base.with_env(key.as_str(), value.as_str());
        }
        if let Some(wrapper) = desired.ssh_wrapper() {
            base = base.with_env("GIT_SSH", wrapper.to_string_lossy());
        }
        Self {
            runner,
            desired,
            base,
        }
    }

    /// The desired state these operations act on.
    pub fn desired(&self) -> &DesiredState {
        self.desired
    }

    /// Context for commands run inside the target.
    fn in_target(&self) -> RunContext {
        self.base.clone().in_dir(self.desired.target())
    }

    /// Run `args` in `context`.
    fn run(&self, args: &[&str], context: &RunContext) -> Result<CommandOutput> {
        self.runner.run(&GitCommand::new(args.iter().copied()), context)
    }

    /// Execute one of the engine's operations.
    pub fn apply(&self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::Clone => self.clone_repo(),
            Operation::Fetch => self.fetch(),
            Operation::Checkout { branch } => self.checkout(branch),
            Operation::Pull => self.pull(),
        }
    }

    /// Clone the repository into the target, selecting the branch unless it is the default.
    pub fn clone_repo(&self) -> Result<()> {
        let target = self.desired.target().to_string_lossy();
        let mut args = vec!["clone"];
        if self.desired.branch() != DEFAULT_BRANCH {
            args.push("-b");
            args.push(self.desired.branch());
        }
        args.push("--");
        args.push(self.desired.url());
        args.push(&*target);
        self.run(&args, &self.base)?;
        Ok(())
    }

    /// Refresh every remote-tracking reference.
    pub fn fetch(&self) -> Result<()> {
        self.run(&["fetch", "--all"], &self.in_target())?;
        Ok(())
    }

    /// Switch the working tree to `branch`.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        self.run(&["checkout", branch, "--"], &self.in_target())?;
        Ok(())
    }

    /// Rebase the checked-out branch onto its upstream.
    pub fn pull(&self) -> Result<()> {
        self.run(&["pull", "--rebase"], &self.in_target())?;
        Ok(())
    }

    /// URL of the `origin` remote, empty when unset.
    pub fn remote_url(&self) -> Result<String> {
        let context = self.in_target().accepting(&[CONFIG_UNSET]);
        let output = self.run(&["config", "--get", "remote.origin.url"], &context)?;
        Ok(output.stdout_trimmed().to_string())
    }

    /// Name of the checked-out branch, `None` when git cannot name it.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let context = self.in_target().accepting(&[REV_PARSE_FATAL]);
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"], &context)?;
        Ok(non_empty(output.stdout_trimmed()))
    }

    /// Name of the checked-out branch; fails when there is none.
    pub fn local_branch(&self) -> Result<String> {
        let output = self.run(&["rev-parse", "--abbrev-ref", "HEAD"], &self.in_target())?;
        Ok(output.stdout_trimmed().to_string())
    }

    /// Upstream tracking reference of the checked-out branch.
    pub fn upstream(&self) -> Result<String> {
        let output = self.run(
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
            &self.in_target(),
        )?;
        Ok(output.stdout_trimmed().to_string())
    }

    /// Whether the working tree has untracked, modified or staged changes.
    pub fn is_dirty(&self) -> Result<bool> {
        let output = self.run(&["status", "--porcelain"], &self.in_target())?;
        Ok(!output.stdout.is_empty())
    }

    /// Commits ahead of and behind the upstream of the checked-out branch.
    pub fn diff_counts(&self) -> Result<DiffCounts> {
        let range = format!("{}...{}", self.local_branch()?, self.upstream()?);
        let args = ["rev-list", "--left-right", "--count", range.as_str()];
        let output = self.run(&args, &self.in_target())?;
        DiffCounts::parse(&output.stdout).ok_or_else(|| SyncError::UnexpectedOutput {
            command: GitCommand::new(args).to_string(),
            output: output.stdout_trimmed().to_string(),
        })
    }

    /// Whether the remote advertises at least one ref matching the desired branch.
    pub fn remote_branch_exists(&self) -> Result<bool> {
        let pattern = format!("{}*", self.desired.branch());
        let output = self.run(
            &["ls-remote", "--", self.desired.url(), pattern.as_str()],
            &self.base,
        )?;
        Ok(output.stdout.lines().any(|line| !line.trim().is_empty()))
    }
}

/// `Some(value)` unless it is empty.
fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
