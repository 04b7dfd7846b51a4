//! Gating table for signals delivered through `sv`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::control::Subcommand;

/// Run-state precondition for delivering a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Only sent to a running service.
    RequiresRunning,
    /// Only sent to a stopped service.
    RequiresStopped,
    /// Always sent.
    Unconditional,
}

impl Gate {
    /// Whether a service in the given state may receive the signal.
    #[must_use]
    pub const fn permits(self, running: bool) -> bool {
        match self {
            Self::RequiresRunning => running,
            Self::RequiresStopped => !running,
            Self::Unconditional => true,
        }
    }
}

/// One row of the gating table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPolicy {
    /// Canonical name.
    pub name: &'static str,
    /// `sv` subcommand that delivers the signal.
    pub subcommand: Subcommand,
    /// Precondition.
    pub gate: Gate,
}

/// Signals an operator may dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Stop the service.
    Down,
    /// Send HUP.
    Hup,
    /// Send INT.
    Int,
    /// Send TERM.
    Term,
    /// Send KILL.
    Kill,
    /// Send QUIT.
    Quit,
    /// Start the service.
    Up,
    /// Start once.
    Once,
    /// Send CONT.
    Cont,
    /// Send USR1.
    Usr1,
    /// Send USR2.
    Usr2,
}

impl Signal {
    /// Every signal, in table order.
    pub const ALL: [Self; 11] = [
        Self::Down,
        Self::Hup,
        Self::Int,
        Self::Term,
        Self::Kill,
        Self::Quit,
        Self::Up,
        Self::Once,
        Self::Cont,
        Self::Usr1,
        Self::Usr2,
    ];

    /// The table row for this signal.
    #[must_use]
    pub const fn policy(self) -> SignalPolicy {
        let (name, subcommand, gate) = match self {
            Self::Down => ("down", Subcommand::Down, Gate::RequiresRunning),
            Self::Hup => ("hup", Subcommand::Hup, Gate::RequiresRunning),
            Self::Int => ("int", Subcommand::Int, Gate::RequiresRunning),
            Self::Term => ("term", Subcommand::Term, Gate::RequiresRunning),
            Self::Kill => ("kill", Subcommand::Kill, Gate::RequiresRunning),
            Self::Quit => ("quit", Subcommand::Quit, Gate::RequiresRunning),
            Self::Up => ("up", Subcommand::Up, Gate::RequiresStopped),
            Self::Once => ("once", Subcommand::Once, Gate::RequiresStopped),
            Self::Cont => ("cont", Subcommand::Cont, Gate::RequiresStopped),
            Self::Usr1 => ("usr1", Subcommand::Usr1, Gate::Unconditional),
            Self::Usr2 => ("usr2", Subcommand::Usr2, Gate::Unconditional),
        };
        SignalPolicy {
            name,
            subcommand,
            gate,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.policy().name)
    }
}

/// Error for a signal name that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal '{0}'")]
pub struct UnknownSignal(pub String);

impl FromStr for Signal {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        match wanted.as_str() {
            "1" => Ok(Self::Usr1),
            "2" => Ok(Self::Usr2),
            other => Self::ALL
                .into_iter()
                .find(|signal| signal.policy().name == other)
                .ok_or_else(|| UnknownSignal(s.to_owned())),
        }
    }
}
