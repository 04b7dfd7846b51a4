//! Test doubles and on-disk fixtures shared by the controller tests.

use std::ffi::OsString;
use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use tempfile::TempDir;

use crate::apply::LocalApplier;
use crate::control::{CommandOutput, CommandRunner};
use crate::desired::TemplateVars;
use crate::lifecycle::{
    Action, ActionOutcome, Collaborators, LifecycleController, LifecycleError, Pause,
    ReadinessPolicy,
};
use crate::platform::PlatformKind;
use crate::spec::ServiceSpec;
use crate::template::{RenderError, TemplateRenderer};

/// Scripted `sv` that tracks run state from the commands it receives.
#[derive(Debug, Default)]
pub(crate) struct FakeSupervisor {
    pub(crate) running: bool,
    pub(crate) log_running: bool,
    pub(crate) calls: Vec<Vec<String>>,
    pub(crate) failing: Option<&'static str>,
}

impl FakeSupervisor {
    pub(crate) fn running() -> Self {
        Self {
            running: true,
            log_running: true,
            ..Self::default()
        }
    }

    /// Non-status invocations as `"<sub> <target>"`.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|args| !args.iter().any(|arg| arg == "status"))
            .map(|args| args.join(" "))
            .collect()
    }
}

impl CommandRunner for FakeSupervisor {
    fn run(&mut self, _program: &Path, args: &[OsString]) -> io::Result<CommandOutput> {
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.calls.push(args.clone());
        let (sub, target) = match args.as_slice() {
            [.., sub, target] => (sub.clone(), target.clone()),
            _ => return Err(io::Error::other("malformed sv invocation")),
        };
        if self.failing == Some(sub.as_str()) {
            return Ok(CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: format!("fail: {target}: unable to {sub}"),
            });
        }
        let log = target.ends_with("/log");
        let state = if log {
            &mut self.log_running
        } else {
            &mut self.running
        };
        let stdout = match sub.as_str() {
            "status" if *state => format!("run: {target}: (pid 42) 10s\n"),
            "status" => format!("down: {target}: 3s\n"),
            "up" | "start" | "restart" | "once" | "force-reload" => {
                *state = true;
                format!("ok: run: {target}\n")
            }
            "down" | "stop" => {
                *state = false;
                format!("ok: down: {target}\n")
            }
            _ => String::new(),
        };
        Ok(CommandOutput {
            status: Some(0),
            stdout,
            stderr: String::new(),
        })
    }
}

/// Counts pauses and optionally creates the readiness pipes on the first one,
/// standing in for `runsv` starting up.
#[derive(Debug, Default)]
pub(crate) struct RecordingPause {
    pub(crate) pauses: Vec<Duration>,
    pub(crate) appear_on_pause: Vec<PathBuf>,
}

impl Pause for RecordingPause {
    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
        for marker in self.appear_on_pause.drain(..) {
            make_fifo(&marker);
        }
    }
}

/// Renders every named template as a shell script that mentions it.
#[derive(Debug, Default, Clone)]
pub(crate) struct StubRenderer {
    pub(crate) revision: u32,
}

impl TemplateRenderer for StubRenderer {
    fn render(&self, name: &str, _vars: &TemplateVars) -> Result<Vec<u8>, RenderError> {
        Ok(format!("#!/bin/sh\n# {name} r{}\n", self.revision).into_bytes())
    }
}

/// Temporary runit layout with an executable stand-in for `sv`.
pub(crate) struct Layout {
    pub(crate) root: TempDir,
}

impl Layout {
    pub(crate) fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        for dir in ["sv", "service", "init.d", "bin"] {
            fs::create_dir(root.path().join(dir)).expect("layout dir");
        }
        let sv = root.path().join("bin/sv");
        fs::write(&sv, "#!/bin/sh\nexit 0\n").expect("sv stub");
        fs::set_permissions(&sv, Permissions::from_mode(0o755)).expect("chmod sv");
        Self { root }
    }

    pub(crate) fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub(crate) fn spec(&self, name: &str) -> ServiceSpec {
        let mut spec = ServiceSpec::new(name);
        spec.sv_dir = self.path("sv");
        spec.service_dir = self.path("service");
        spec.lsb_init_dir = self.path("init.d");
        spec.sv_bin = self.path("bin/sv");
        spec
    }
}

pub(crate) fn make_fifo(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("marker parent");
    }
    if !path.exists() {
        mkfifo(path, Mode::S_IRWXU).expect("mkfifo");
    }
}

/// Physical locations of the `supervise/ok` pipes `runsv` creates for `spec`.
pub(crate) fn supervise_markers(spec: &ServiceSpec) -> Vec<PathBuf> {
    let base = spec.sv_dir_path();
    let mut markers = vec![base.join("supervise/ok")];
    if spec.log {
        markers.push(base.join("log/supervise/ok"));
    }
    markers
}

/// Owns every collaborator so each action runs through a fresh controller,
/// the way separate CLI invocations would.
pub(crate) struct Rig {
    pub(crate) runner: FakeSupervisor,
    pub(crate) applier: LocalApplier<StubRenderer>,
    pub(crate) pause: RecordingPause,
    pub(crate) in_container: bool,
    pub(crate) readiness: ReadinessPolicy,
}

impl Rig {
    pub(crate) fn new(runner: FakeSupervisor) -> Self {
        Self {
            runner,
            applier: LocalApplier::new(StubRenderer::default()),
            pause: RecordingPause::default(),
            in_container: false,
            readiness: ReadinessPolicy::new(Duration::from_secs(1), Some(Duration::from_secs(5))),
        }
    }

    pub(crate) fn run(
        &mut self,
        spec: &ServiceSpec,
        action: Action,
    ) -> Result<ActionOutcome, LifecycleError> {
        let deps = Collaborators {
            runner: &mut self.runner,
            applier: &mut self.applier,
            detector: &self.in_container,
            pause: &mut self.pause,
        };
        let mut controller = LifecycleController::new(
            spec.clone(),
            &PlatformKind::Other,
            self.readiness.clone(),
            deps,
        )?;
        controller.handle(action)
    }
}
