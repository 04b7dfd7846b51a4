use std::fmt;

use serde::Serialize;

use super::signal::Signal;
use crate::control::Subcommand;

/// Which supervised process an action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// The service itself, at `service_dir/<name>`.
    Service,
    /// Its logger, at `service_dir/<name>/log`.
    Log,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Service => "service",
            Self::Log => "log",
        })
    }
}

/// Administrative actions understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Converge files without touching the run state.
    Create,
    /// Converge, activate and wait for the supervisor.
    Enable,
    /// Stop and deactivate.
    Disable,
    /// `sv start`.
    Start(Scope),
    /// `sv stop`.
    Stop(Scope),
    /// `sv restart`.
    Restart(Scope),
    /// `sv force-reload`.
    Reload(Scope),
    /// Gated signal dispatch.
    Signal(Signal),
    /// Report the observed state.
    Status,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Enable => f.write_str("enable"),
            Self::Disable => f.write_str("disable"),
            Self::Start(scope) => write!(f, "start {scope}"),
            Self::Stop(scope) => write!(f, "stop {scope}"),
            Self::Restart(scope) => write!(f, "restart {scope}"),
            Self::Reload(scope) => write!(f, "reload {scope}"),
            Self::Signal(signal) => write!(f, "signal {signal}"),
            Self::Status => f.write_str("status"),
        }
    }
}

/// Result of a gated signal dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SignalOutcome {
    /// The signal was delivered through `sv`.
    Sent {
        /// Delivered signal.
        signal: Signal,
    },
    /// The run state did not satisfy the signal's gate.
    Skipped {
        /// Withheld signal.
        signal: Signal,
        /// Probed run state.
        running: bool,
    },
}

/// Observed state reported by [`Action::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    /// The activation link resolves to the service directory.
    pub enabled: bool,
    /// The service is running.
    pub running: bool,
    /// The logger is running.
    pub log_running: bool,
}

/// What an action did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Files were converged.
    Converged {
        /// Whether any file changed.
        changed: bool,
    },
    /// The service was enabled.
    Enabled {
        /// Whether any file changed.
        changed: bool,
        /// Whether the activation link was created by this call.
        linked: bool,
        /// Scopes restarted because their scripts changed.
        restarted: Vec<Scope>,
    },
    /// The service was disabled.
    Disabled {
        /// Whether the service was enabled beforehand.
        was_enabled: bool,
    },
    /// An `sv` control command was issued.
    Controlled {
        /// Target scope.
        scope: Scope,
        /// Issued subcommand.
        subcommand: Subcommand,
    },
    /// A signal was dispatched or withheld.
    Signal(SignalOutcome),
    /// The observed state.
    Status(ServiceStatus),
}
