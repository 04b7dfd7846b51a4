use tracing::{debug, info};

use super::LIFECYCLE_TARGET;
use super::container::ContainerDetector;
use super::error::LifecycleError;
use super::readiness::{Pause, ReadinessPolicy, wait_for_marker};
use super::signal::Signal;
use super::types::{Action, ActionOutcome, Scope, ServiceStatus, SignalOutcome};
use crate::control::{self, CommandRunner, Subcommand, SvCommand};
use crate::converge::{ConvergenceEngine, ConvergenceResult, ObjectApplier};
use crate::desired::{self, FsObject};
use crate::env::{self, EnvPlan};
use crate::platform::{PlatformKind, PlatformProvider};
use crate::spec::ServiceSpec;
use crate::state::CurrentState;
use crate::validate::validate;

/// Side-effecting dependencies of a [`LifecycleController`].
pub struct Collaborators<'a> {
    /// Runs `sv`.
    pub runner: &'a mut dyn CommandRunner,
    /// Materialises filesystem objects.
    pub applier: &'a mut dyn ObjectApplier,
    /// Decides whether readiness waits are skipped.
    pub detector: &'a dyn ContainerDetector,
    /// Sleeps between readiness checks.
    pub pause: &'a mut dyn Pause,
}

/// Capability interface over one supervised service.
pub trait ServiceLifecycle {
    /// Rebuilds the current-state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ReadEnv`] when `env/` cannot be read.
    fn probe_state(&mut self) -> Result<&CurrentState, LifecycleError>;

    /// Descriptors for the desired layout.
    fn build_desired(&self) -> Vec<FsObject>;

    /// Environment changes relative to the current snapshot.
    fn reconcile_env(&self) -> EnvPlan;

    /// Converges the service files.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Apply`] on the first failing object.
    fn converge(&mut self) -> Result<ConvergenceResult, LifecycleError>;

    /// Converges, activates and waits for the supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when convergence, activation, the
    /// readiness wait, or a follow-up restart fails.
    fn enable(&mut self) -> Result<ActionOutcome, LifecycleError>;

    /// Stops and deactivates the service.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Control`] when `sv down` fails, in which
    /// case the activation link is left in place.
    fn disable(&mut self) -> Result<ActionOutcome, LifecycleError>;

    /// `sv start` on the scope.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Control`] when `sv` fails.
    fn start(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError>;

    /// `sv stop` on the scope.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Control`] when `sv` fails.
    fn stop(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError>;

    /// `sv restart` on the scope.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Control`] when `sv` fails.
    fn restart(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError>;

    /// `sv force-reload` on the scope.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Control`] when `sv` fails.
    fn reload(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError>;

    /// Sends `signal` if the freshly probed run state permits it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Control`] when a permitted signal fails.
    fn signal(&mut self, signal: Signal) -> Result<SignalOutcome, LifecycleError>;
}

/// Drives one service through its lifecycle.
pub struct LifecycleController<'a> {
    spec: ServiceSpec,
    platform: PlatformKind,
    readiness: ReadinessPolicy,
    command: SvCommand,
    deps: Collaborators<'a>,
    state: CurrentState,
}

impl<'a> LifecycleController<'a> {
    /// Validates `spec` and takes the initial state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Spec`] or [`LifecycleError::Config`] before
    /// touching anything when the specification is malformed or the control
    /// binary is unusable, or [`LifecycleError::ReadEnv`] when the
    /// environment directory cannot be read.
    pub fn new(
        spec: ServiceSpec,
        platform: &dyn PlatformProvider,
        readiness: ReadinessPolicy,
        deps: Collaborators<'a>,
    ) -> Result<Self, LifecycleError> {
        let spec = spec.validated()?;
        validate(&spec)?;
        let command = spec.sv_command();
        let state = CurrentState::load(&spec, &command, deps.runner)?;
        Ok(Self {
            platform: platform.platform(),
            spec,
            readiness,
            command,
            deps,
            state,
        })
    }

    /// The validated specification.
    #[must_use]
    pub const fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// The latest state snapshot.
    #[must_use]
    pub const fn state(&self) -> &CurrentState {
        &self.state
    }

    /// Performs `action`.
    ///
    /// # Errors
    ///
    /// Propagates the [`LifecycleError`] of the underlying operation.
    pub fn handle(&mut self, action: Action) -> Result<ActionOutcome, LifecycleError> {
        info!(
            target: LIFECYCLE_TARGET,
            service = %self.spec.name,
            %action,
            "handling action"
        );
        match action {
            Action::Create => {
                let result = self.converge()?;
                Ok(ActionOutcome::Converged {
                    changed: result.any_changed,
                })
            }
            Action::Enable => self.enable(),
            Action::Disable => self.disable(),
            Action::Start(scope) => self.start(scope),
            Action::Stop(scope) => self.stop(scope),
            Action::Restart(scope) => self.restart(scope),
            Action::Reload(scope) => self.reload(scope),
            Action::Signal(signal) => self.signal(signal).map(ActionOutcome::Signal),
            Action::Status => {
                let state = self.probe_state()?;
                Ok(ActionOutcome::Status(ServiceStatus {
                    enabled: state.enabled,
                    running: state.running,
                    log_running: state.log_running,
                }))
            }
        }
    }

    fn control(
        &mut self,
        subcommand: Subcommand,
        scope: Scope,
    ) -> Result<ActionOutcome, LifecycleError> {
        let target = self.spec.control_target(scope);
        control::invoke(self.deps.runner, &self.command, subcommand, &target)?;
        info!(
            target: LIFECYCLE_TARGET,
            service = %self.spec.name,
            %scope,
            %subcommand,
            "control command succeeded"
        );
        Ok(ActionOutcome::Controlled { scope, subcommand })
    }

    /// Creates the activation link and waits for `runsv` unless inside a
    /// container.
    fn activate(&mut self) -> Result<(), LifecycleError> {
        let link = FsObject::Symlink {
            path: self.spec.service_dir_path(),
            target: self.spec.sv_dir_path(),
        };
        self.deps.applier.apply(&link)?;
        info!(
            target: LIFECYCLE_TARGET,
            service = %self.spec.name,
            link = %self.spec.service_dir_path().display(),
            "service activated"
        );
        if self.deps.detector.in_container() {
            debug!(
                target: LIFECYCLE_TARGET,
                service = %self.spec.name,
                "container detected; skipping supervisor readiness wait"
            );
            return Ok(());
        }
        let mut scopes = vec![Scope::Service];
        if self.spec.log {
            scopes.push(Scope::Log);
        }
        for scope in scopes {
            let marker = self.spec.supervise_ok_path(scope);
            wait_for_marker(&marker, &self.readiness, self.deps.pause)?;
        }
        Ok(())
    }

    /// Restarts scopes whose scripts changed during convergence.
    fn restart_updated(
        &mut self,
        result: &ConvergenceResult,
    ) -> Result<Vec<Scope>, LifecycleError> {
        let mut restarted = Vec::new();
        if result.changed(&self.spec.run_script_path()) {
            self.control(Subcommand::Restart, Scope::Service)?;
            restarted.push(Scope::Service);
        }
        let log_changed = result.changed(&self.spec.log_run_script_path())
            || result.changed(&self.spec.log_config_path());
        if self.spec.log && log_changed {
            self.control(Subcommand::Restart, Scope::Log)?;
            restarted.push(Scope::Log);
        }
        Ok(restarted)
    }
}

impl ServiceLifecycle for LifecycleController<'_> {
    fn probe_state(&mut self) -> Result<&CurrentState, LifecycleError> {
        self.state = CurrentState::load(&self.spec, &self.command, self.deps.runner)?;
        Ok(&self.state)
    }

    fn build_desired(&self) -> Vec<FsObject> {
        desired::build(&self.spec, self.platform)
    }

    fn reconcile_env(&self) -> EnvPlan {
        env::reconcile(&self.spec.env, &self.state.env)
    }

    fn converge(&mut self) -> Result<ConvergenceResult, LifecycleError> {
        let objects = self.build_desired();
        let operations = if self.spec.sv_templates {
            self.reconcile_env()
                .into_operations(&self.spec.env_dir_path(), &self.spec.attributes(None))
        } else {
            Vec::new()
        };
        let result = ConvergenceEngine::new(self.deps.applier).apply(&objects, &operations)?;
        Ok(result)
    }

    fn enable(&mut self) -> Result<ActionOutcome, LifecycleError> {
        let result = self.converge()?;
        let linked = !self.state.enabled;
        if linked {
            self.activate()?;
        } else {
            debug!(
                target: LIFECYCLE_TARGET,
                service = %self.spec.name,
                "already enabled"
            );
        }
        self.probe_state()?;
        let restarted = if self.spec.restart_on_update {
            self.restart_updated(&result)?
        } else {
            Vec::new()
        };
        Ok(ActionOutcome::Enabled {
            changed: result.any_changed,
            linked,
            restarted,
        })
    }

    fn disable(&mut self) -> Result<ActionOutcome, LifecycleError> {
        if !self.state.enabled && !self.state.linked {
            debug!(
                target: LIFECYCLE_TARGET,
                service = %self.spec.name,
                "not enabled; nothing to disable"
            );
            return Ok(ActionOutcome::Disabled { was_enabled: false });
        }
        let link = self.spec.service_dir_path();
        if self.state.enabled {
            control::invoke(self.deps.runner, &self.command, Subcommand::Down, &link)?;
        } else {
            debug!(
                target: LIFECYCLE_TARGET,
                service = %self.spec.name,
                link = %link.display(),
                "activation link dangles; removing without sv down"
            );
        }
        self.deps
            .applier
            .remove(&link)
            .map_err(|source| LifecycleError::RemoveLink {
                path: link.clone(),
                source,
            })?;
        info!(
            target: LIFECYCLE_TARGET,
            service = %self.spec.name,
            link = %link.display(),
            "service disabled"
        );
        let was_enabled = self.state.enabled;
        self.probe_state()?;
        Ok(ActionOutcome::Disabled { was_enabled })
    }

    fn start(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError> {
        self.control(Subcommand::Start, scope)
    }

    fn stop(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError> {
        self.control(Subcommand::Stop, scope)
    }

    fn restart(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError> {
        self.control(Subcommand::Restart, scope)
    }

    fn reload(&mut self, scope: Scope) -> Result<ActionOutcome, LifecycleError> {
        self.control(Subcommand::ForceReload, scope)
    }

    fn signal(&mut self, signal: Signal) -> Result<SignalOutcome, LifecycleError> {
        let running = self.probe_state()?.running;
        let policy = signal.policy();
        if !policy.gate.permits(running) {
            debug!(
                target: LIFECYCLE_TARGET,
                service = %self.spec.name,
                %signal,
                running,
                "run state does not permit signal; skipping"
            );
            return Ok(SignalOutcome::Skipped { signal, running });
        }
        let target = self.spec.control_target(Scope::Service);
        control::invoke(self.deps.runner, &self.command, policy.subcommand, &target)?;
        info!(
            target: LIFECYCLE_TARGET,
            service = %self.spec.name,
            %signal,
            "signal sent"
        );
        Ok(SignalOutcome::Sent { signal })
    }
}
