//! Error type for the CLI runtime.

use std::io;
use std::sync::Arc;

use svkeeper_core::{LifecycleError, SpecError};
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error("failed to install cancellation handler: {0}")]
    InstallSignalHandler(io::Error),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("failed to serialise outcome: {0}")]
    SerialiseOutcome(serde_json::Error),
    #[error("failed to write outcome: {0}")]
    EmitOutcome(io::Error),
}
