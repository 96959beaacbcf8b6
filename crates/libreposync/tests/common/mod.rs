#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use anyhow::{Context, Result, ensure};
use libreposync::{DesiredState, DesiredStateBuilder};
use tempfile::TempDir;

/// Identity for commits made by the fixtures and by `git pull --rebase`.
const IDENT: [(&str, &str); 4] = [
    ("GIT_AUTHOR_NAME", "Test User"),
    ("GIT_AUTHOR_EMAIL", "test@example.com"),
    ("GIT_COMMITTER_NAME", "Test User"),
    ("GIT_COMMITTER_EMAIL", "test@example.com"),
];

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

/// Trimmed stdout of a successful git command.
pub fn git_stdout(repo_path: &Path, args: &[&str]) -> Result<String> {
    let output = git(repo_path, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Commit `contents` to `file` in `repo_path`.
pub fn commit_file(repo_path: &Path, file: &str, contents: &str) -> Result<()> {
    fs::write(repo_path.join(file), contents)?;
    git(repo_path, &["add", file])?;
    git(repo_path, &["commit", "-m", &format!("Update {file}")])?;
    Ok(())
}

/// A bare origin with `main` and `release` branches, plus a work clone that publishes to it.
pub struct Remote {
    /// Keeps every fixture directory alive.
    pub temp_dir: TempDir,
    /// The bare repository deployments clone from.
    pub origin: PathBuf,
    /// Work repository with `origin` pointing at the bare repository.
    pub upstream: PathBuf,
}

impl Remote {
    /// Create the fixture.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let origin = temp_dir.path().join("origin.git");
        let upstream = temp_dir.path().join("upstream");
        fs::create_dir_all(&origin)?;
        fs::create_dir_all(&upstream)?;

        git(&origin, &["init", "--bare"])?;
        git(&origin, &["symbolic-ref", "HEAD", "refs/heads/main"])?;

        git(&upstream, &["init"])?;
        git(&upstream, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        commit_file(&upstream, "README.md", "# Test Project")?;
        git(&upstream, &["remote", "add", "origin", &origin.to_string_lossy()])?;
        git(&upstream, &["push", "origin", "main"])?;
        git(&upstream, &["push", "origin", "main:release"])?;

        Ok(Self {
            temp_dir,
            origin,
            upstream,
        })
    }

    /// URL deployments clone from.
    pub fn url(&self) -> String {
        self.origin.to_string_lossy().into_owned()
    }

    /// Where deployments land.
    pub fn target(&self) -> PathBuf {
        self.temp_dir.path().join("deploy")
    }

    /// Publish a new commit on `main`.
    pub fn publish(&self, file: &str, contents: &str) -> Result<()> {
        commit_file(&self.upstream, file, contents)?;
        git(&self.upstream, &["push", "origin", "main"])?;
        Ok(())
    }

    /// A builder for a deployment of `branch`, with a commit identity in its environment.
    pub fn builder(&self, branch: &str) -> DesiredStateBuilder {
        IDENT.iter().fold(
            DesiredState::builder(self.url(), self.target()).branch(branch),
            |builder, (key, value)| builder.env(*key, *value),
        )
    }

    /// A deployment of `branch`.
    pub fn desired(&self, branch: &str) -> Result<DesiredState> {
        Ok(self.builder(branch).build()?)
    }
}
