//! Crate-level controller and BDD tests.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use mockall::mock;
use rstest::{fixture, rstest};

use crate::apply::LocalApplier;
use crate::control::{CommandOutput, CommandRunner};
use crate::lifecycle::{
    Action, ActionOutcome, Collaborators, LifecycleController, LifecycleError, ReadinessPolicy,
    Scope, ServiceLifecycle, ServiceStatus, Signal, SignalOutcome,
};
use crate::platform::PlatformKind;
use crate::spec::SpecError;

use self::support::{
    FakeSupervisor, Layout, RecordingPause, Rig, StubRenderer, make_fifo, supervise_markers,
};

mod support;

mock! {
    Runner {}

    impl CommandRunner for Runner {
        fn run(&mut self, program: &Path, args: &[OsString]) -> io::Result<CommandOutput>;
    }
}

#[fixture]
fn layout() -> Layout {
    Layout::new()
}

fn display(layout: &Layout, relative: &str) -> String {
    layout.path(relative).display().to_string()
}

#[rstest]
fn first_enable_links_waits_and_restarts_new_scripts(layout: Layout) {
    let spec = layout.spec("web");
    for marker in supervise_markers(&spec) {
        make_fifo(&marker);
    }
    let mut rig = Rig::new(FakeSupervisor::default());

    let outcome = rig.run(&spec, Action::Enable).expect("enable");

    assert_eq!(
        outcome,
        ActionOutcome::Enabled {
            changed: true,
            linked: true,
            restarted: vec![Scope::Service, Scope::Log],
        }
    );
    assert_eq!(
        fs::read_link(layout.path("service/web")).expect("activation link"),
        layout.path("sv/web")
    );
    assert!(rig.pause.pauses.is_empty());
    let service = display(&layout, "service/web");
    assert_eq!(
        rig.runner.commands(),
        [format!("restart {service}"), format!("restart {service}/log")]
    );
}

#[rstest]
fn repeated_enable_changes_nothing(layout: Layout) {
    let spec = layout.spec("web");
    for marker in supervise_markers(&spec) {
        make_fifo(&marker);
    }
    let mut rig = Rig::new(FakeSupervisor::default());
    rig.run(&spec, Action::Enable).expect("first enable");
    let issued = rig.runner.commands().len();

    let outcome = rig.run(&spec, Action::Enable).expect("second enable");

    assert_eq!(
        outcome,
        ActionOutcome::Enabled {
            changed: false,
            linked: false,
            restarted: Vec::new(),
        }
    );
    assert_eq!(rig.runner.commands().len(), issued);
}

#[rstest]
fn create_is_idempotent(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.check = true;
    spec.finish = true;
    spec.control = vec![String::from("t")];
    spec.env.insert(String::from("PORT"), String::from("80"));
    let mut rig = Rig::new(FakeSupervisor::default());

    let first = rig.run(&spec, Action::Create).expect("first create");
    let second = rig.run(&spec, Action::Create).expect("second create");

    assert_eq!(first, ActionOutcome::Converged { changed: true });
    assert_eq!(second, ActionOutcome::Converged { changed: false });
    assert!(rig.runner.commands().is_empty());
    assert!(!layout.path("service/web").exists());
}

#[rstest]
fn template_change_restarts_only_the_service(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.log = false;
    for marker in supervise_markers(&spec) {
        make_fifo(&marker);
    }
    let mut rig = Rig::new(FakeSupervisor::default());
    rig.run(&spec, Action::Enable).expect("first enable");
    rig.runner.calls.clear();
    rig.applier = LocalApplier::new(StubRenderer { revision: 2 });

    let outcome = rig.run(&spec, Action::Enable).expect("second enable");

    assert_eq!(
        outcome,
        ActionOutcome::Enabled {
            changed: true,
            linked: false,
            restarted: vec![Scope::Service],
        }
    );
    assert_eq!(
        rig.runner.commands(),
        [format!("restart {}", display(&layout, "service/web"))]
    );
}

#[rstest]
fn restart_on_update_can_be_disabled(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.restart_on_update = false;
    for marker in supervise_markers(&spec) {
        make_fifo(&marker);
    }
    let mut rig = Rig::new(FakeSupervisor::default());

    let outcome = rig.run(&spec, Action::Enable).expect("enable");

    assert!(matches!(outcome, ActionOutcome::Enabled { restarted, .. } if restarted.is_empty()));
    assert!(rig.runner.commands().is_empty());
}

#[rstest]
fn container_skips_readiness_wait(layout: Layout) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(FakeSupervisor::default());
    rig.in_container = true;

    rig.run(&spec, Action::Enable).expect("enable");

    assert!(rig.pause.pauses.is_empty());
    assert!(layout.path("service/web").exists());
}

#[rstest]
fn enable_polls_until_supervisor_is_ready(layout: Layout) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(FakeSupervisor::default());
    rig.pause.appear_on_pause = supervise_markers(&spec);

    rig.run(&spec, Action::Enable).expect("enable");

    assert_eq!(rig.pause.pauses, [Duration::from_secs(1)]);
}

#[rstest]
fn readiness_timeout_is_reported(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.log = false;
    let mut rig = Rig::new(FakeSupervisor::default());
    rig.readiness = ReadinessPolicy::new(Duration::from_secs(1), Some(Duration::from_secs(2)));

    let error = rig.run(&spec, Action::Enable).expect_err("never ready");

    assert!(matches!(
        error,
        LifecycleError::ReadinessTimeout { ref path, .. }
            if path == &layout.path("service/web/supervise/ok")
    ));
    assert_eq!(rig.pause.pauses.len(), 2);
}

#[rstest]
fn disable_when_not_enabled_is_a_no_op(layout: Layout) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(FakeSupervisor::default());

    let outcome = rig.run(&spec, Action::Disable).expect("disable");

    assert_eq!(outcome, ActionOutcome::Disabled { was_enabled: false });
    assert!(rig.runner.commands().is_empty());
}

#[rstest]
fn failed_down_leaves_activation_link(layout: Layout) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(FakeSupervisor::running());
    rig.in_container = true;
    rig.run(&spec, Action::Enable).expect("enable");
    rig.runner.failing = Some("down");

    let error = rig.run(&spec, Action::Disable).expect_err("down fails");

    assert!(matches!(error, LifecycleError::Control(_)));
    assert!(error.to_string().contains(&display(&layout, "service/web")));
    assert!(layout.path("service/web").exists());
}

#[rstest]
#[case(Action::Start(Scope::Service), "start", "service/web")]
#[case(Action::Stop(Scope::Log), "stop", "service/web/log")]
#[case(Action::Restart(Scope::Service), "restart", "service/web")]
#[case(Action::Reload(Scope::Log), "force-reload", "service/web/log")]
fn control_actions_target_their_scope(
    layout: Layout,
    #[case] action: Action,
    #[case] subcommand: &str,
    #[case] target: &str,
) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(FakeSupervisor::default());

    rig.run(&spec, action).expect("control action");

    assert_eq!(
        rig.runner.commands(),
        [format!("{subcommand} {}", display(&layout, target))]
    );
}

#[rstest]
fn control_failure_names_binary_and_target(layout: Layout) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(FakeSupervisor::default());
    rig.runner.failing = Some("start");

    let error = rig
        .run(&spec, Action::Start(Scope::Service))
        .expect_err("start fails");

    let message = error.to_string();
    assert!(message.contains(&display(&layout, "bin/sv")));
    assert!(message.contains(&display(&layout, "service/web")));
}

#[rstest]
fn sv_flags_precede_every_subcommand(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.sv_timeout = Some(7);
    spec.sv_verbose = true;
    let mut rig = Rig::new(FakeSupervisor::default());

    rig.run(&spec, Action::Restart(Scope::Service)).expect("restart");

    assert!(!rig.runner.calls.is_empty());
    for call in &rig.runner.calls {
        assert_eq!(call.get(..3), Some(&["-w", "7", "-v"].map(String::from)[..]));
    }
}

#[rstest]
#[case(FakeSupervisor::running(), Signal::Hup, "hup")]
#[case(FakeSupervisor::default(), Signal::Up, "up")]
#[case(FakeSupervisor::default(), Signal::Usr1, "1")]
#[case(FakeSupervisor::running(), Signal::Usr2, "2")]
fn permitted_signals_are_sent(
    layout: Layout,
    #[case] runner: FakeSupervisor,
    #[case] signal: Signal,
    #[case] subcommand: &str,
) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(runner);

    let outcome = rig.run(&spec, Action::Signal(signal)).expect("signal");

    assert_eq!(outcome, ActionOutcome::Signal(SignalOutcome::Sent { signal }));
    assert_eq!(
        rig.runner.commands(),
        [format!("{subcommand} {}", display(&layout, "service/web"))]
    );
}

#[rstest]
#[case(false, Signal::Term)]
#[case(false, Signal::Down)]
#[case(true, Signal::Up)]
#[case(true, Signal::Once)]
fn gated_signals_never_reach_sv(layout: Layout, #[case] running: bool, #[case] signal: Signal) {
    let mut spec = layout.spec("web");
    spec.log = false;
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .withf(|_, args| args.iter().any(|arg| arg == "status"))
        .times(2)
        .returning(move |_, _| {
            let stdout = if running {
                "run: web: (pid 7) 3s\n"
            } else {
                "down: web: 3s\n"
            };
            Ok(CommandOutput {
                status: Some(0),
                stdout: stdout.to_owned(),
                stderr: String::new(),
            })
        });
    let mut applier = LocalApplier::new(StubRenderer::default());
    let mut pause = RecordingPause::default();
    let deps = Collaborators {
        runner: &mut runner,
        applier: &mut applier,
        detector: &false,
        pause: &mut pause,
    };
    let mut controller =
        LifecycleController::new(spec, &PlatformKind::Other, ReadinessPolicy::default(), deps)
            .expect("controller");

    let outcome = controller.signal(signal).expect("signal");

    assert_eq!(outcome, SignalOutcome::Skipped { signal, running });
}

#[rstest]
fn env_files_are_reconciled(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.env.insert(String::from("PORT"), String::from("8080"));
    fs::create_dir_all(layout.path("sv/web/env")).expect("env dir");
    fs::write(layout.path("sv/web/env/STALE"), "1\n").expect("stale var");
    let mut rig = Rig::new(FakeSupervisor::default());

    rig.run(&spec, Action::Create).expect("create");

    assert_eq!(
        fs::read_to_string(layout.path("sv/web/env/PORT")).expect("PORT"),
        "8080"
    );
    assert!(!layout.path("sv/web/env/STALE").exists());
}

#[rstest]
fn minimal_spec_writes_only_run_and_shim(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.log = false;
    let mut rig = Rig::new(FakeSupervisor::default());

    rig.run(&spec, Action::Create).expect("create");

    let mut entries: Vec<String> = fs::read_dir(layout.path("sv/web"))
        .expect("sv dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, ["run"]);
    assert_eq!(
        fs::read_link(layout.path("init.d/web")).expect("shim"),
        layout.path("bin/sv")
    );
}

#[rstest]
#[case("../run")]
#[case("../../../../escaped")]
#[case(".HIDDEN")]
#[case("")]
fn env_keys_outside_env_dir_are_refused(layout: Layout, #[case] key: &str) {
    let mut spec = layout.spec("web");
    spec.env.insert(key.to_owned(), String::from("pwned"));
    let mut rig = Rig::new(FakeSupervisor::default());

    let error = rig.run(&spec, Action::Create).expect_err("bad env key");

    assert!(matches!(
        error,
        LifecycleError::Spec(SpecError::InvalidEnvKey { key: ref rejected, .. }) if rejected == key
    ));
    assert!(rig.runner.calls.is_empty());
    assert!(!layout.path("sv/web").exists());
}

#[rstest]
fn env_cannot_shadow_managed_scripts_across_passes(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.env.insert(String::from("PORT"), String::from("80"));
    let mut rig = Rig::new(FakeSupervisor::default());
    rig.run(&spec, Action::Create).expect("first create");
    let run_script = fs::read_to_string(layout.path("sv/web/run")).expect("run script");

    spec.env.insert(String::from("../run"), String::from("pwned"));
    rig.run(&spec, Action::Create).expect_err("bad env key");
    spec.env.remove("../run");
    let outcome = rig.run(&spec, Action::Create).expect("third create");

    assert_eq!(outcome, ActionOutcome::Converged { changed: false });
    assert_eq!(
        fs::read_to_string(layout.path("sv/web/run")).expect("run script"),
        run_script
    );
}

#[rstest]
#[case(".")]
#[case("..")]
fn dot_service_names_are_refused(layout: Layout, #[case] name: &str) {
    let spec = layout.spec(name);
    let mut rig = Rig::new(FakeSupervisor::default());

    let error = rig.run(&spec, Action::Create).expect_err("bad name");

    assert!(matches!(error, LifecycleError::Spec(SpecError::InvalidName { .. })));
    assert!(rig.runner.calls.is_empty());
    assert!(!layout.path("sv/run").exists());
    assert!(!layout.path("init.d/.").is_symlink());
}

#[rstest]
fn disable_removes_dangling_activation_link(layout: Layout) {
    let spec = layout.spec("web");
    std::os::unix::fs::symlink(layout.path("sv/web"), layout.path("service/web"))
        .expect("dangling link");
    let mut rig = Rig::new(FakeSupervisor::default());

    let outcome = rig.run(&spec, Action::Disable).expect("disable");

    assert_eq!(outcome, ActionOutcome::Disabled { was_enabled: false });
    assert!(fs::symlink_metadata(layout.path("service/web")).is_err());
    assert!(rig.runner.commands().is_empty());
}

#[rstest]
fn missing_control_binary_aborts_before_any_work(layout: Layout) {
    let mut spec = layout.spec("web");
    spec.sv_bin = layout.path("bin/missing-sv");
    let mut rig = Rig::new(FakeSupervisor::default());

    let error = rig.run(&spec, Action::Create).expect_err("missing sv");

    assert!(matches!(error, LifecycleError::Config(_)));
    assert!(rig.runner.calls.is_empty());
    assert!(!layout.path("sv/web").exists());
}

#[rstest]
fn status_reports_observed_state(layout: Layout) {
    let spec = layout.spec("web");
    let mut rig = Rig::new(FakeSupervisor::running());
    rig.in_container = true;
    rig.run(&spec, Action::Enable).expect("enable");

    let outcome = rig.run(&spec, Action::Status).expect("status");

    assert_eq!(
        outcome,
        ActionOutcome::Status(ServiceStatus {
            enabled: true,
            running: true,
            log_running: true,
        })
    );
}
