use std::fmt;

use crate::desired::DesiredState;

/// Whether a pass executes mutating operations or only describes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Execute every selected operation.
    #[default]
    Normal,
    /// Evaluate every decision but only report intended changes.
    Simulate,
}

impl Mode {
    /// True in simulation mode.
    pub fn is_simulate(self) -> bool {
        matches!(self, Self::Simulate)
    }
}

/// What the target currently holds, as observed at the start of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentState {
    /// Whether `target/.git` is present.
    pub exists: bool,
    /// Remote origin URL of an existing repository; empty when it has no `origin`.
    pub url: Option<String>,
    /// Checked-out branch name, when one could be determined.
    pub branch: Option<String>,
}

/// Commits on each side of the local branch and its upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    /// Commits present locally but not upstream.
    pub ahead: u32,
    /// Commits present upstream but not locally.
    pub behind: u32,
}

impl DiffCounts {
    /// Parse the output of `git rev-list --left-right --count A...B`.
    pub fn parse(output: &str) -> Option<Self> {
        let mut fields = output.split_whitespace();
        let ahead = fields.next()?.parse().ok()?;
        let behind = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self { ahead, behind })
    }
}

/// A named git operation the engine may select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Clone the repository into the target.
    Clone,
    /// Refresh all remote-tracking references.
    Fetch,
    /// Switch the working tree to a branch.
    Checkout {
        /// Branch to switch to.
        branch: String,
    },
    /// Rebase the local branch onto its upstream.
    Pull,
}

impl Operation {
    /// Whether the operation changes the working tree or local branches.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Fetch)
    }

    /// Human-readable narrative used when reporting the change; `None` for
    /// operations that are never reported.
    pub fn description(&self, desired: &DesiredState) -> Option<String> {
        let target = desired.target().display();
        match self {
            Self::Clone => Some(format!("clone from {} into {target}", desired.url())),
            Self::Fetch => None,
            Self::Checkout { branch } => Some(format!(
                "checkout branch {branch} on {} into {target}",
                desired.url()
            )),
            Self::Pull => Some(format!("pull {} to {target}", desired.url())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clone => write!(f, "clone"),
            Self::Fetch => write!(f, "fetch"),
            Self::Checkout { branch } => write!(f, "checkout {branch}"),
            Self::Pull => write!(f, "pull"),
        }
    }
}

/// Record of a completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Mode the pass ran in.
    pub mode: Mode,
    /// Operations executed (or, when simulating, described) in order.
    pub operations: Vec<Operation>,
}

impl Outcome {
    /// Operations that changed, or would have changed, the target.
    pub fn changes(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(|op| op.is_mutating())
    }

    /// True when the pass found nothing to change.
    pub fn is_converged(&self) -> bool {
        self.changes().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rev_list_counts() {
        assert_eq!(
            DiffCounts::parse("2\t5\n"),
            Some(DiffCounts {
                ahead: 2,
                behind: 5
            })
        );
        assert_eq!(
            DiffCounts::parse("0 0"),
            Some(DiffCounts {
                ahead: 0,
                behind: 0
            })
        );
        assert_eq!(DiffCounts::parse(""), None);
        assert_eq!(DiffCounts::parse("3"), None);
        assert_eq!(DiffCounts::parse("-1\t2"), None);
        assert_eq!(DiffCounts::parse("1\t2\t3"), None);
    }

    #[test]
    fn describes_operations() {
        let desired = DesiredState::builder("https://example.com/app.git", "/srv/app")
            .branch("release")
            .build()
            .unwrap();
        assert_eq!(
            Operation::Clone.description(&desired).as_deref(),
            Some("clone from https://example.com/app.git into /srv/app")
        );
        assert_eq!(
            Operation::Checkout {
                branch: "release".to_string()
            }
            .description(&desired)
            .as_deref(),
            Some("checkout branch release on https://example.com/app.git into /srv/app")
        );
        assert_eq!(
            Operation::Pull.description(&desired).as_deref(),
            Some("pull https://example.com/app.git to /srv/app")
        );
        assert_eq!(Operation::Fetch.description(&desired), None);
    }

    #[test]
    fn fetch_alone_is_converged() {
        let outcome = Outcome {
            mode: Mode::Normal,
            operations: vec![Operation::Fetch],
        };
        assert!(outcome.is_converged());

        let outcome = Outcome {
            mode: Mode::Simulate,
            operations: vec![Operation::Fetch, Operation::Pull],
        };
        assert!(!outcome.is_converged());
        assert_eq!(outcome.changes().collect::<Vec<_>>(), vec![&Operation::Pull]);
    }
}
