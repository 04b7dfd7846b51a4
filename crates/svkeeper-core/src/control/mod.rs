//! Invocation of the `sv` control binary.
//!
//! [`CommandRunner`] is the seam between the engine and process spawning.
//! [`SystemCommandRunner`] is the production implementation; tests inject
//! scripted runners that record the argument vectors they receive.

mod probe;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use probe::{RunState, RunStateProbe, parse_status};

const CONTROL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::control");

/// `sv` subcommands issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subcommand {
    /// Report the supervisor state.
    Status,
    /// Start and keep running.
    Up,
    /// Stop and keep stopped.
    Down,
    /// LSB-style start, waiting for readiness.
    Start,
    /// LSB-style stop, waiting for shutdown.
    Stop,
    /// Stop then start.
    Restart,
    /// Send HUP, falling back to a restart.
    ForceReload,
    /// Start once without restarting on exit.
    Once,
    /// Send CONT.
    Cont,
    /// Send HUP.
    Hup,
    /// Send INT.
    Int,
    /// Send TERM.
    Term,
    /// Send KILL.
    Kill,
    /// Send QUIT.
    Quit,
    /// Send USR1.
    Usr1,
    /// Send USR2.
    Usr2,
}

impl Subcommand {
    /// The word passed to `sv` on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Up => "up",
            Self::Down => "down",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::ForceReload => "force-reload",
            Self::Once => "once",
            Self::Cont => "cont",
            Self::Hup => "hup",
            Self::Int => "int",
            Self::Term => "term",
            Self::Kill => "kill",
            Self::Quit => "quit",
            Self::Usr1 => "1",
            Self::Usr2 => "2",
        }
    }
}

impl std::fmt::Display for Subcommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `sv` is invoked for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvCommand {
    binary: PathBuf,
    timeout: Option<Duration>,
    verbose: bool,
}

impl SvCommand {
    /// Invokes `binary` with no extra flags.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
            verbose: false,
        }
    }

    /// Passes `-w <secs>` when set.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Passes `-v` when set.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The control binary.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Argument vector for `sub` applied to `target`.
    ///
    /// Flags come first in the order `-w <secs>`, `-v`, followed by the
    /// subcommand and the target path.
    #[must_use]
    pub fn arguments(&self, sub: Subcommand, target: &Path) -> Vec<OsString> {
        let mut args = Vec::with_capacity(5);
        if let Some(timeout) = self.timeout {
            args.push(OsString::from("-w"));
            args.push(OsString::from(timeout.as_secs().to_string()));
        }
        if self.verbose {
            args.push(OsString::from("-v"));
        }
        args.push(OsString::from(sub.as_str()));
        args.push(target.as_os_str().to_owned());
        args
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, absent when the process was killed by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.status, Some(0))
    }
}

/// Runs external programs to completion.
pub trait CommandRunner {
    /// Runs `program` with `args` and captures its output.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised when the process cannot be spawned.
    /// A non-zero exit is reported through [`CommandOutput::status`].
    fn run(&mut self, program: &Path, args: &[OsString]) -> std::io::Result<CommandOutput>;
}

/// Spawns real processes with stdin closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&mut self, program: &Path, args: &[OsString]) -> std::io::Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Failures while driving `sv`.
#[derive(Debug, Error)]
pub enum ControlInvocationError {
    /// The control binary could not be started.
    #[error("failed to run {} {subcommand} {}: {source}", .binary.display(), .target.display())]
    Spawn {
        /// Control binary.
        binary: PathBuf,
        /// Requested subcommand.
        subcommand: Subcommand,
        /// Supervised directory.
        target: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },
    /// The control binary reported failure.
    #[error(
        "{} {subcommand} {} exited with {}: {stderr}",
        .binary.display(),
        .target.display(),
        describe_status(.status)
    )]
    NonZeroExit {
        /// Control binary.
        binary: PathBuf,
        /// Requested subcommand.
        subcommand: Subcommand,
        /// Supervised directory.
        target: PathBuf,
        /// Exit code, absent when killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| String::from("a signal"), |code| format!("status {code}"))
}

/// Runs `sv <sub> <target>` and requires a zero exit.
///
/// # Errors
///
/// Returns [`ControlInvocationError`] when the binary cannot be spawned or
/// exits unsuccessfully.
pub fn invoke(
    runner: &mut dyn CommandRunner,
    command: &SvCommand,
    sub: Subcommand,
    target: &Path,
) -> Result<CommandOutput, ControlInvocationError> {
    let args = command.arguments(sub, target);
    debug!(
        target: CONTROL_TARGET,
        binary = %command.binary().display(),
        subcommand = %sub,
        service = %target.display(),
        "invoking control binary"
    );
    let output = runner
        .run(command.binary(), &args)
        .map_err(|source| ControlInvocationError::Spawn {
            binary: command.binary().to_path_buf(),
            subcommand: sub,
            target: target.to_path_buf(),
            source,
        })?;
    if output.success() {
        Ok(output)
    } else {
        Err(ControlInvocationError::NonZeroExit {
            binary: command.binary().to_path_buf(),
            subcommand: sub,
            target: target.to_path_buf(),
            status: output.status,
            stderr: output.stderr.trim_end().to_owned(),
        })
    }
}
