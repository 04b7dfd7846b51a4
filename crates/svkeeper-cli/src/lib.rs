//! Command-line runtime for svkeeper.
//!
//! [`run`] splits leading configuration flags from the action, loads the
//! layered [`Config`](svkeeper_config::Config), installs telemetry, loads the
//! service specification, and prints the action outcome as JSON on stdout.
//! Failures are written to stderr and reported through the exit code.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use svkeeper_core::{ActionOutcome, ServiceSpec};

mod cli;
mod config;
mod engine;
mod errors;
pub mod telemetry;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, command_arguments, split_config_arguments};
pub(crate) use errors::AppError;

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    stdout: &'a mut W,
    stderr: &'a mut E,
    loader: &'a L,
}

impl<W, E, L> CliRunner<'_, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    fn run<I, F>(&mut self, args: I, execute: F) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        F: FnOnce(&svkeeper_config::Config, ServiceSpec, svkeeper_core::Action)
            -> Result<ActionOutcome, AppError>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
            Ok(cli) => cli,
            Err(error) if is_informational(&error) => {
                let _ = write!(self.stdout, "{error}");
                return ExitCode::SUCCESS;
            }
            Err(error) => return self.fail(&AppError::CliUsage(error)),
        };

        let result = self
            .loader
            .load(&split.config_arguments)
            .and_then(|config| {
                telemetry::initialise(&config)?;
                let spec = ServiceSpec::from_json_file(&cli.spec)?;
                execute(&config, spec, cli.command.into())
            })
            .and_then(|outcome| self.emit(&outcome));

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => self.fail(&error),
        }
    }

    fn emit(&mut self, outcome: &ActionOutcome) -> Result<(), AppError> {
        serde_json::to_writer_pretty(&mut *self.stdout, outcome)
            .map_err(AppError::SerialiseOutcome)?;
        self.stdout.write_all(b"\n").map_err(AppError::EmitOutcome)?;
        self.stdout.flush().map_err(AppError::EmitOutcome)
    }

    fn fail(&mut self, error: &AppError) -> ExitCode {
        let _ = writeln!(self.stderr, "svkeeper: {error}");
        ExitCode::FAILURE
    }
}

fn is_informational(error: &clap::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    )
}

/// Runs the CLI with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    CliRunner {
        stdout,
        stderr,
        loader: &OrthoConfigLoader,
    }
    .run(args, engine::execute)
}

#[cfg(test)]
mod tests;
