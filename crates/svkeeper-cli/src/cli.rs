//! Argument definitions for the `svkeeper` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use svkeeper_core::lifecycle::UnknownSignal;
use svkeeper_core::{Action, Scope, Signal};

/// Converges and controls one runit-supervised service.
#[derive(Parser, Debug)]
#[command(name = "svkeeper", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// JSON service specification.
    #[arg(long, value_name = "FILE")]
    pub(crate) spec: PathBuf,
    /// Lifecycle action to perform.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Actions exposed on the command line.
#[derive(Subcommand, Debug, Clone, Copy)]
pub(crate) enum CliCommand {
    /// Writes the service directory without activating it.
    Create,
    /// Converges, activates, and waits for the supervisor.
    Enable,
    /// Brings the service down and removes the activation link.
    Disable,
    /// Starts the service.
    Start(ScopeArgs),
    /// Stops the service.
    Stop(ScopeArgs),
    /// Restarts the service.
    Restart(ScopeArgs),
    /// Asks the service to reload.
    Reload(ScopeArgs),
    /// Sends a run-state gated control signal.
    Signal {
        /// Signal name such as `hup`, `term`, or `usr1`.
        #[arg(value_parser = parse_signal)]
        name: Signal,
    },
    /// Reports activation and run state.
    Status,
}

/// Selects the service or its logger.
#[derive(Args, Debug, Clone, Copy)]
pub(crate) struct ScopeArgs {
    /// Target the `log/` service instead of the main service.
    #[arg(long)]
    pub(crate) log: bool,
}

impl ScopeArgs {
    const fn scope(self) -> Scope {
        if self.log { Scope::Log } else { Scope::Service }
    }
}

fn parse_signal(name: &str) -> Result<Signal, UnknownSignal> {
    name.parse()
}

impl From<CliCommand> for Action {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Create => Self::Create,
            CliCommand::Enable => Self::Enable,
            CliCommand::Disable => Self::Disable,
            CliCommand::Start(args) => Self::Start(args.scope()),
            CliCommand::Stop(args) => Self::Stop(args.scope()),
            CliCommand::Restart(args) => Self::Restart(args.scope()),
            CliCommand::Reload(args) => Self::Reload(args.scope()),
            CliCommand::Signal { name } => Self::Signal(name),
            CliCommand::Status => Self::Status,
        }
    }
}
