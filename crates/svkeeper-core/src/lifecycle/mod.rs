//! Administrative actions over one supervised service.
//!
//! [`LifecycleController`] owns a validated [`ServiceSpec`](crate::ServiceSpec),
//! the latest [`CurrentState`](crate::CurrentState) snapshot and the injected
//! collaborators. Actions are dispatched through
//! [`LifecycleController::handle`] or the [`ServiceLifecycle`] trait.

mod container;
mod controller;
mod error;
mod readiness;
pub mod signal;
mod types;

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

pub use container::{
    CONTAINER_MARKERS, CgroupContainerDetector, ContainerDetector, cgroup_indicates_container,
};
pub use controller::{Collaborators, LifecycleController, ServiceLifecycle};
pub use error::LifecycleError;
pub use readiness::{
    CancellationToken, Pause, ReadinessPolicy, ThreadPause, is_ready, wait_for_marker,
};
pub use signal::{Gate, Signal, SignalPolicy, UnknownSignal};
pub use types::{Action, ActionOutcome, Scope, ServiceStatus, SignalOutcome};
