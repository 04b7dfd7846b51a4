//! Production wiring of the lifecycle controller.

use svkeeper_config::Config;
use svkeeper_core::{
    Action, ActionOutcome, CancellationToken, CgroupContainerDetector, Collaborators,
    FileTemplateRenderer, LifecycleController, LocalApplier, OsReleasePlatform, ReadinessPolicy,
    ServiceSpec, SystemCommandRunner, ThreadPause,
};
use tracing::debug;

use crate::AppError;

const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Runs `action` for `spec` against the real system.
pub(crate) fn execute(
    config: &Config,
    spec: ServiceSpec,
    action: Action,
) -> Result<ActionOutcome, AppError> {
    let readiness = ReadinessPolicy::new(config.readiness_interval(), config.readiness_timeout())
        .with_cancellation(cancellation_for(action)?);
    let platform = OsReleasePlatform::new(config.os_release_path().as_std_path());
    let detector = CgroupContainerDetector::new(config.cgroup_path().as_std_path());
    let mut runner = SystemCommandRunner;
    let mut applier = LocalApplier::new(FileTemplateRenderer::new(
        config.templates_dir().as_std_path(),
    ));
    let mut pause = ThreadPause;

    debug!(
        target: ENGINE_TARGET,
        service = %spec.name,
        %action,
        templates = %config.templates_dir(),
        "running action"
    );
    let deps = Collaborators {
        runner: &mut runner,
        applier: &mut applier,
        detector: &detector,
        pause: &mut pause,
    };
    let mut controller = LifecycleController::new(spec, &platform, readiness, deps)?;
    Ok(controller.handle(action)?)
}

/// Only `enable` blocks, so only it routes SIGINT and SIGTERM into the wait.
fn cancellation_for(action: Action) -> Result<CancellationToken, AppError> {
    let token = CancellationToken::new();
    if matches!(action, Action::Enable) {
        for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::flag::register(signal, token.flag())
                .map_err(AppError::InstallSignalHandler)?;
        }
    }
    Ok(token)
}
