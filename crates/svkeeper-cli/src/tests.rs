//! Runner tests with substituted configuration and execution.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::process::ExitCode;

use rstest::{fixture, rstest};
use svkeeper_config::Config;
use svkeeper_core::{Action, ActionOutcome, Scope, ServiceSpec, ServiceStatus};
use tempfile::TempDir;

use crate::config::FixedConfigLoader;
use crate::{AppError, CliRunner};

struct Harness {
    dir: TempDir,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Harness {
    fn spec_path(&self, body: &str) -> String {
        let path = self.dir.path().join("web.json");
        fs::write(&path, body).expect("write spec");
        path.display().to_string()
    }

    fn run<F>(&mut self, args: &[&str], execute: F) -> ExitCode
    where
        F: FnOnce(&Config, ServiceSpec, Action) -> Result<ActionOutcome, AppError>,
    {
        let loader = FixedConfigLoader(Config::default());
        let mut runner = CliRunner {
            stdout: &mut self.stdout,
            stderr: &mut self.stderr,
            loader: &loader,
        };
        runner.run(args.iter().map(OsString::from), execute)
    }

    fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[fixture]
fn harness() -> Harness {
    Harness {
        dir: tempfile::tempdir().expect("tempdir"),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

#[rstest]
fn outcome_is_printed_as_json(mut harness: Harness) {
    let spec = harness.spec_path(r#"{"name": "web"}"#);
    let seen = RefCell::new(None);

    let code = harness.run(&["svkeeper", "--spec", &spec, "stop", "--log"], |_, spec, action| {
        *seen.borrow_mut() = Some((spec.name, action));
        Ok(ActionOutcome::Status(ServiceStatus {
            enabled: true,
            running: false,
            log_running: true,
        }))
    });

    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(
        seen.into_inner(),
        Some((String::from("web"), Action::Stop(Scope::Log)))
    );
    let printed: serde_json::Value = serde_json::from_str(&harness.stdout()).expect("json");
    assert_eq!(printed["outcome"], "status");
    assert_eq!(printed["log_running"], true);
}

#[rstest]
fn invalid_spec_fails_before_execution(mut harness: Harness) {
    let spec = harness.spec_path(r#"{"name": "web", "control": ["z"]}"#);

    let code = harness.run(&["svkeeper", "--spec", &spec, "create"], |_, _, _| {
        panic!("must not execute")
    });

    assert_eq!(code, ExitCode::FAILURE);
    assert!(harness.stderr().contains('z'), "{}", harness.stderr());
    assert!(harness.stdout().is_empty());
}

#[rstest]
fn missing_spec_file_is_reported(mut harness: Harness) {
    let code = harness.run(
        &["svkeeper", "--spec", "/nonexistent/web.json", "status"],
        |_, _, _| panic!("must not execute"),
    );

    assert_eq!(code, ExitCode::FAILURE);
    assert!(harness.stderr().contains("/nonexistent/web.json"));
}

#[rstest]
fn usage_errors_go_to_stderr(mut harness: Harness) {
    let code = harness.run(&["svkeeper", "enable"], |_, _, _| panic!("must not execute"));

    assert_eq!(code, ExitCode::FAILURE);
    assert!(harness.stderr().contains("--spec"));
}

#[rstest]
fn help_goes_to_stdout(mut harness: Harness) {
    let code = harness.run(&["svkeeper", "--help"], |_, _, _| panic!("must not execute"));

    assert_eq!(code, ExitCode::SUCCESS);
    assert!(harness.stdout().contains("enable"));
}
