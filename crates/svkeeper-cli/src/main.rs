//! Entry point for the `svkeeper` binary.
//!
//! All work happens in [`svkeeper_cli::run`], which loads configuration,
//! parses the action, and prints its outcome as JSON.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    svkeeper_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
