#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
//! Command-line interface for keeping git working directories in sync via the libreposync crate.

use std::{
    io::{self, IsTerminal, Write},
    path::PathBuf,
    process,
    result::Result as StdResult,
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use libreposync::{
    DEFAULT_BRANCH, DesiredState, Manifest, Mode, Outcome, ProcessRunner, SyncError, reconcile,
};

/// Logging setup.
mod logging;
/// Terminal rendering of pass reports.
mod output;

use output::{Output, Quiet, Terminal};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("color_mode")
        .args(["color", "no_color"])
))]
/// Top-level CLI options for reposync.
struct Cli {
    /// Report the changes a pass would make without making them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Enable colored output
    #[arg(long, global = true)]
    color: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Suppress all output
    #[arg(long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// git executable to run
    #[arg(long, global = true, value_name = "PATH", default_value = "git")]
    git: PathBuf,

    #[command(subcommand)]
    /// The primary command to execute.
    command: Commands,
}

#[derive(Subcommand)]
/// CLI subcommands supported by reposync.
enum Commands {
    /// Bring one working directory in line with a remote branch
    Sync {
        /// Remote repository URL
        #[arg(long)]
        url: String,

        /// Absolute path of the working directory
        #[arg(long, value_name = "DIR")]
        target: PathBuf,

        /// Local branch to keep checked out
        #[arg(long, default_value = DEFAULT_BRANCH)]
        branch: String,

        /// Run git as this user
        #[arg(long)]
        user: Option<String>,

        /// Run git as this group
        #[arg(long)]
        group: Option<String>,

        /// Kill any git command running longer than this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Program git uses in place of ssh
        #[arg(long, value_name = "PATH")]
        ssh_wrapper: Option<PathBuf>,

        /// Extra environment for git (can be specified multiple times)
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
        env: Vec<(String, String)>,
    },

    /// Bring every repository declared in a manifest in line, in order
    Apply {
        /// Path of the TOML manifest
        manifest: PathBuf,
    },
}

/// Parse a `KEY=VALUE` pair.
fn parse_env(pair: &str) -> StdResult<(String, String), String> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{pair}'")),
    }
}

/// Build the desired states the command asks for.
fn desired_states(command: Commands) -> Result<Vec<DesiredState>> {
    match command {
        Commands::Sync {
            url,
            target,
            branch,
            user,
            group,
            timeout,
            ssh_wrapper,
            env,
        } => {
            let mut builder = DesiredState::builder(url, target).branch(branch);
            if let Some(user) = user {
                builder = builder.user(user);
            }
            if let Some(group) = group {
                builder = builder.group(group);
            }
            if let Some(secs) = timeout {
                builder = builder.timeout(Duration::from_secs(secs));
            }
            if let Some(wrapper) = ssh_wrapper {
                builder = builder.ssh_wrapper(wrapper);
            }
            for (key, value) in env {
                builder = builder.env(key, value);
            }
            Ok(vec![builder.build()?])
        }
        Commands::Apply { manifest } => Ok(Manifest::load(&manifest)?.desired_states()?),
    }
}

/// Print the closing line for one repository.
fn summarize(output: &dyn Output, outcome: &Outcome) -> io::Result<()> {
    let changes = outcome.changes().count();
    match (changes, outcome.mode) {
        (0, _) => output.success("Already up to date"),
        (n, Mode::Simulate) => output.message(&format!("{n} change(s) would be made")),
        (n, Mode::Normal) => output.success(&format!("{n} change(s) made")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Determine color output preference early for error handling
    let color = if cli.color {
        true
    } else if cli.no_color {
        false
    } else {
        io::stdout().is_terminal()
    };

    let output: Arc<dyn Output> = if cli.quiet {
        Arc::new(Quiet)
    } else {
        Arc::new(Terminal::new(color))
    };

    if let Err(e) = run(cli, &output) {
        if let Err(display_err) = output.fail(&format!("{e:#}")) {
            eprintln!("Failed to report error via output handler: {display_err:#}");
        }
        if let Err(finish_err) = output.finish() {
            eprintln!("Failed to flush output handler: {finish_err:#}");
        }
        let exit_code = e
            .downcast_ref::<SyncError>()
            .map_or(1, SyncError::exit_code);
        if let Err(flush_err) = io::stderr().flush() {
            eprintln!("Failed to flush stderr: {flush_err}");
        }
        process::exit(exit_code);
    }

    Ok(())
}

/// Execute the parsed command, one reconciliation pass per repository.
fn run(cli: Cli, output: &Arc<dyn Output>) -> Result<()> {
    let mode = if cli.dry_run {
        Mode::Simulate
    } else {
        Mode::Normal
    };
    let runner = ProcessRunner::with_program(cli.git);

    for desired in desired_states(cli.command)? {
        let section = output.section(&format!(
            "{} ({}) -> {}",
            desired.url(),
            desired.branch(),
            desired.target().display()
        ))?;
        let outcome = reconcile(&desired, &runner, section.reporter(), mode)?;
        summarize(&*section, &outcome)?;
    }

    output.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn env_pairs() {
        assert_eq!(
            parse_env("GIT_TRACE=1").unwrap(),
            ("GIT_TRACE".to_string(), "1".to_string())
        );
        assert_eq!(
            parse_env("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_env("GIT_TRACE").is_err());
        assert!(parse_env("=1").is_err());
    }

    #[test]
    fn sync_flags_build_desired_state() {
        let cli = Cli::try_parse_from([
            "reposync",
            "sync",
            "--url",
            "https://example.com/app.git",
            "--target",
            "/srv/app",
            "--branch",
            "release",
            "--timeout",
            "30",
            "--env",
            "GIT_TRACE=1",
        ])
        .unwrap();
        let desired = desired_states(cli.command).unwrap();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[0].branch(), "release");
        assert_eq!(desired[0].timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            desired[0].environment().get("GIT_TRACE").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn remote_tracking_branch_is_a_precondition_failure() {
        let cli = Cli::try_parse_from([
            "reposync",
            "sync",
            "--url",
            "https://example.com/app.git",
            "--target",
            "/srv/app",
            "--branch",
            "origin/main",
        ])
        .unwrap();
        let err = desired_states(cli.command).unwrap_err();
        let sync_err = err.downcast_ref::<SyncError>().unwrap();
        assert!(matches!(sync_err, SyncError::InvalidRemoteReference { .. }));
        assert_eq!(sync_err.exit_code(), 2);
    }

    #[test]
    fn color_flags_conflict() {
        assert!(Cli::try_parse_from(["reposync", "--color", "--no-color", "apply", "x.toml"]).is_err());
    }
}
