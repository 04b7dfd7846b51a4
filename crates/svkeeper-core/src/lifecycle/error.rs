use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::control::ControlInvocationError;
use crate::converge::ApplyError;
use crate::env::EnvReadError;
use crate::spec::SpecError;
use crate::validate::ConfigError;

/// Failures surfaced by [`LifecycleController`](super::LifecycleController).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The specification names paths outside the service tree.
    #[error(transparent)]
    Spec(#[from] SpecError),
    /// Pre-flight validation failed; nothing was touched.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A filesystem object could not be converged.
    #[error(transparent)]
    Apply(#[from] ApplyError),
    /// A mutating `sv` call failed.
    #[error(transparent)]
    Control(#[from] ControlInvocationError),
    /// The materialised environment could not be read.
    #[error(transparent)]
    ReadEnv(#[from] EnvReadError),
    /// The activation link could not be removed.
    #[error("failed to remove activation link {}: {source}", .path.display())]
    RemoveLink {
        /// Activation link.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: ApplyError,
    },
    /// The supervisor did not become ready in time.
    #[error("{} did not appear within {}s", .path.display(), .timeout.as_secs())]
    ReadinessTimeout {
        /// Readiness pipe waited for.
        path: PathBuf,
        /// Configured bound.
        timeout: Duration,
    },
    /// The readiness wait was cancelled.
    #[error("wait for {} was cancelled", .path.display())]
    ReadinessCancelled {
        /// Readiness pipe waited for.
        path: PathBuf,
    },
}
