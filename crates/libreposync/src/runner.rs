use std::{
    collections::BTreeMap,
    fmt,
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread::{self, JoinHandle},
    time::Duration,
};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::{
    error::{Result, SyncError},
    identity::ResolvedIdentity,
};

/// A git invocation, kept as an argument vector so nothing is shell-quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    /// Arguments following the `git` program name.
    args: Vec<String>,
}

impl GitCommand {
    /// Build a command from its arguments.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Arguments following `git`.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "git")?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Execution context shared by a group of git invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Directory to run in; the caller's directory when `None`.
    pub working_dir: Option<PathBuf>,
    /// Identity to switch to before exec.
    pub identity: Option<ResolvedIdentity>,
    /// Non-zero exit codes that still count as success.
    pub acceptable_exit_codes: Vec<i32>,
    /// Kill the child after this long.
    pub timeout: Option<Duration>,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl RunContext {
    /// An empty context: caller's directory, no identity, only exit code 0 accepted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run in `dir`.
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    /// Switch to `identity` before exec.
    pub fn with_identity(mut self, identity: Option<ResolvedIdentity>) -> Self {
        self.identity = identity;
        self
    }

    /// Treat `codes` as success in addition to 0.
    pub fn accepting(mut self, codes: &[i32]) -> Self {
        self.acceptable_exit_codes = codes.to_vec();
        self
    }

    /// Kill the child after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set an environment variable for the child.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Whether `code` counts as success in this context.
    pub fn is_acceptable(&self, code: i32) -> bool {
        code == 0 || self.acceptable_exit_codes.contains(&code)
    }

    /// Turn an unacceptable exit status into a tool execution error.
    pub fn check(&self, command: &GitCommand, output: CommandOutput) -> Result<CommandOutput> {
        if self.is_acceptable(output.exit_code) {
            return Ok(output);
        }
        Err(SyncError::ToolExecution {
            command: command.to_string(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        })
    }
}

/// Captured result of a finished git process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Exit code, or -1 when killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    /// Standard output without surrounding whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// The single capability the engine needs from the outside world: run git.
///
/// Implementations must fail with [`SyncError::ToolExecution`] when the exit
/// code is neither 0 nor listed in the context's acceptable codes.
pub trait CommandRunner: Send + Sync {
    /// Run `command` in `context`, blocking until it exits.
    fn run(&self, command: &GitCommand, context: &RunContext) -> Result<CommandOutput>;
}

/// Runs git as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Program to execute.
    program: PathBuf,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    /// Run the `git` found on `PATH`.
    pub fn new() -> Self {
        Self::with_program("git")
    }

    /// Run `program` instead of `git`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &GitCommand, context: &RunContext) -> Result<CommandOutput> {
        let rendered = command.to_string();
        let mut cmd = Command::new(&self.program);
        cmd.args(command.args())
            .envs(&context.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &context.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(identity) = &context.identity {
            apply_identity(&mut cmd, identity);
        }

        debug!(command = %rendered, dir = ?context.working_dir, "running git");
        let mut child = cmd.spawn().map_err(|source| SyncError::Spawn {
            command: rendered.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not piped"))?;
        let stdout_handle = thread::spawn(move || read_stream(stdout));
        let stderr_handle = thread::spawn(move || read_stream(stderr));

        let status = match context.timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    warn!(
                        command = %rendered,
                        timeout_secs = limit.as_secs(),
                        "git timed out, killing"
                    );
                    child.kill()?;
                    child.wait()?;
                    // Reader threads finish on their own once every holder of the pipes exits.
                    return Err(SyncError::Timeout {
                        command: rendered,
                        timeout: limit,
                    });
                }
            },
            None => child.wait()?,
        };

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(&join_stream(stdout_handle)?).into_owned(),
            stderr: String::from_utf8_lossy(&join_stream(stderr_handle)?).into_owned(),
            exit_code: status.code().unwrap_or(-1),
        };
        debug!(command = %rendered, exit_code = output.exit_code, "git finished");
        context.check(command, output)
    }
}

/// Drop privileges to `identity` in the child and point `HOME` at its home directory.
fn apply_identity(cmd: &mut Command, identity: &ResolvedIdentity) {
    #[cfg(unix)]
    {
        if let Some(gid) = identity.gid {
            cmd.gid(gid);
        }
        if let Some(uid) = identity.uid {
            cmd.uid(uid);
        }
    }
    if let Some(home) = &identity.home {
        cmd.env("HOME", home);
    }
}

/// Read a pipe to the end.
fn read_stream(mut stream: impl Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Wait for a reader thread and return what it collected.
fn join_stream(handle: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader thread panicked"))?
}
