use std::path::Path;

use tracing::warn;

use super::{CONTROL_TARGET, CommandRunner, Subcommand, SvCommand};

/// Observed supervisor state of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// `sv status` reported `run:`.
    Running,
    /// Anything else, including probe failures.
    Stopped,
}

impl RunState {
    /// Whether the state is [`RunState::Running`].
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Interprets `sv status` output.
///
/// Only the first line is consulted; it must begin with `run:` and the
/// command must have exited zero.
#[must_use]
pub fn parse_status(stdout: &str, exit_code: Option<i32>) -> RunState {
    let first = stdout.lines().next().unwrap_or_default();
    if exit_code == Some(0) && first.starts_with("run:") {
        RunState::Running
    } else {
        RunState::Stopped
    }
}

/// Queries `sv status` for a scope.
pub struct RunStateProbe<'a> {
    command: &'a SvCommand,
}

impl<'a> RunStateProbe<'a> {
    /// Probes through `command`.
    #[must_use]
    pub const fn new(command: &'a SvCommand) -> Self {
        Self { command }
    }

    /// Runs `sv status <target>`.
    ///
    /// A spawn failure is logged and reported as [`RunState::Stopped`].
    pub fn probe(&self, runner: &mut dyn CommandRunner, target: &Path) -> RunState {
        let args = self.command.arguments(Subcommand::Status, target);
        match runner.run(self.command.binary(), &args) {
            Ok(output) => parse_status(&output.stdout, output.status),
            Err(error) => {
                warn!(
                    target: CONTROL_TARGET,
                    service = %target.display(),
                    %error,
                    "status probe failed; treating service as stopped"
                );
                RunState::Stopped
            }
        }
    }
}
