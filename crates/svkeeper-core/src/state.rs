//! Snapshot of what is currently on disk and running.

use std::collections::BTreeMap;
use std::fs;

use crate::control::{CommandRunner, RunStateProbe, SvCommand};
use crate::env::{EnvReadError, read_current_env};
use crate::lifecycle::Scope;
use crate::spec::ServiceSpec;

/// Observed state of one service, rebuilt rather than mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentState {
    /// `sv status` reports the service as running.
    pub running: bool,
    /// `sv status` reports the log service as running; false when logging is
    /// disabled.
    pub log_running: bool,
    /// The `run` script is reachable through the activation link.
    pub enabled: bool,
    /// A symlink exists at the activation path, even if it dangles.
    pub linked: bool,
    /// Variables materialised under `env/`.
    pub env: BTreeMap<String, String>,
}

impl CurrentState {
    /// Probes the supervisor and reads the service directories.
    ///
    /// # Errors
    ///
    /// Returns [`EnvReadError`] when the `env` directory exists but cannot be
    /// read. Probe failures are reported as not running.
    pub fn load(
        spec: &ServiceSpec,
        command: &SvCommand,
        runner: &mut dyn CommandRunner,
    ) -> Result<Self, EnvReadError> {
        let probe = RunStateProbe::new(command);
        let running = probe
            .probe(runner, &spec.control_target(Scope::Service))
            .is_running();
        let log_running = spec.log
            && probe
                .probe(runner, &spec.control_target(Scope::Log))
                .is_running();
        Ok(Self {
            running,
            log_running,
            enabled: spec.service_dir_path().join("run").exists(),
            linked: fs::symlink_metadata(spec.service_dir_path())
                .is_ok_and(|meta| meta.file_type().is_symlink()),
            env: read_current_env(&spec.env_dir_path())?,
        })
    }
}
