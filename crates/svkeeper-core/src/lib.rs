//! Convergence and lifecycle engine for runit-supervised services.
//!
//! A [`ServiceSpec`] describes one service. The engine derives the desired
//! on-disk layout from it ([`desired::build`]), converges the filesystem
//! towards that layout through an [`ObjectApplier`], and drives the running
//! process with the `sv` control binary through a [`CommandRunner`].
//! [`LifecycleController`] ties these together and exposes every
//! administrative action.
//!
//! All side effects pass through trait seams so the whole engine can be
//! exercised against temporary directories and scripted command runners:
//!
//! - [`CommandRunner`] runs `sv`; [`SystemCommandRunner`] spawns processes.
//! - [`ObjectApplier`] mutates the filesystem; [`LocalApplier`] writes locally.
//! - [`TemplateRenderer`] resolves named templates; [`FileTemplateRenderer`]
//!   reads them from a directory.
//! - [`PlatformProvider`] identifies the host distribution.
//! - [`ContainerDetector`] decides whether readiness waits are skipped.
//! - [`Pause`] sleeps between readiness checks.

pub mod apply;
pub mod control;
pub mod converge;
pub mod desired;
pub mod env;
pub mod lifecycle;
pub mod platform;
pub mod spec;
pub mod state;
pub mod template;
pub mod validate;

#[cfg(test)]
mod tests;

pub use apply::LocalApplier;
pub use control::{
    CommandOutput, CommandRunner, ControlInvocationError, Subcommand, SvCommand,
    SystemCommandRunner,
};
pub use converge::{ApplyError, ConvergenceEngine, ConvergenceResult, ObjectApplier};
pub use desired::{Attributes, FsObject, TemplateRef, TemplateVars};
pub use env::{EnvOperation, EnvPlan, EnvReadError, EnvWrite};
pub use lifecycle::{
    Action, ActionOutcome, CancellationToken, CgroupContainerDetector, Collaborators,
    ContainerDetector, LifecycleController, LifecycleError, Pause, ReadinessPolicy, Scope,
    ServiceLifecycle, ServiceStatus, Signal, SignalOutcome, ThreadPause,
};
pub use platform::{OsReleasePlatform, PlatformKind, PlatformProvider};
pub use spec::{LogConfig, ServiceSpec, SpecError};
pub use state::CurrentState;
pub use template::{FileTemplateRenderer, RenderError, TemplateRenderer};
pub use validate::ConfigError;
