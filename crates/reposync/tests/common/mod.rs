#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use anyhow::{Context, Result, ensure};
use tempfile::TempDir;

/// Identity for fixture commits.
const IDENT: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Test User"),
    ("GIT_AUTHOR_EMAIL", "test@example.com"),
    ("GIT_COMMITTER_NAME", "Test User"),
    ("GIT_COMMITTER_EMAIL", "test@example.com"),
];

/// Return the path to the compiled `reposync` binary.
pub fn reposync_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_reposync"))
}

/// Run a git command inside `repo_path`, ensuring it succeeds.
pub fn git(repo_path: &Path, args: &[&str]) -> Result<Output> {
    let output = Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .envs(IDENT)
        .output()
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;

    ensure!(
        output.status.success(),
        "git command failed: git {}\nstdout: {}\nstderr: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(output)
}

/// A bare origin with a single `main` commit, inside a scratch directory.
pub struct TestEnv {
    /// Keeps the scratch directory alive.
    pub temp_dir: TempDir,
    /// The bare repository.
    pub origin: PathBuf,
}

impl TestEnv {
    /// Create the origin by pushing one commit from a throwaway work repository.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let origin = temp_dir.path().join("origin.git");
        let seed = temp_dir.path().join("seed");
        fs::create_dir_all(&origin)?;
        fs::create_dir_all(&seed)?;

        git(&origin, &["init", "--bare"])?;
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        git(&seed, &["init"])?;
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        fs::write(seed.join("README.md"), "# Test Project")?;
        git(&seed, &["add", "README.md"])?;
        git(&seed, &["commit", "-m", "Initial commit"])?;
        git(&seed, &["push", &origin.to_string_lossy(), "main", "main:release"])?;

        Ok(Self { temp_dir, origin })
    }

    /// URL of the origin.
    pub fn url(&self) -> String {
        self.origin.to_string_lossy().into_owned()
    }

    /// A fresh path under the scratch directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Run `reposync` with `--no-color` and the provided arguments.
    pub fn run(&self, args: &[&str]) -> Result<Output> {
        let output = Command::new(reposync_binary())
            .current_dir(self.temp_dir.path())
            .arg("--no-color")
            .args(args)
            .output()
            .with_context(|| format!("failed to run reposync {}", args.join(" ")))?;
        Ok(output)
    }

    /// Run `reposync sync` for `branch` into `target`.
    pub fn sync(&self, target: &Path, branch: &str, extra: &[&str]) -> Result<Output> {
        let url = self.url();
        let target = target.to_string_lossy();
        let mut args = vec!["sync", "--url", &url, "--target", &target, "--branch", branch];
        args.extend_from_slice(extra);
        self.run(&args)
    }
}

/// Stdout of `output` as text.
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
