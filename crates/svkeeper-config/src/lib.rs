//! Shared runtime configuration for the svkeeper toolchain.
//!
//! Values are layered by `ortho_config`: command-line flags win over
//! `SVKEEPER_*` environment variables, which win over a `svkeeper.toml`
//! file, which wins over the built-in defaults in [`defaults`].

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;

pub use defaults::{
    DEFAULT_CGROUP_PATH, DEFAULT_LOG_FILTER, DEFAULT_OS_RELEASE_PATH,
    DEFAULT_READINESS_INTERVAL_MS, DEFAULT_TEMPLATES_DIR, default_log_format,
};
pub use logging::LogFormat;

/// Resolved configuration shared by the CLI and the engine wiring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SVKEEPER")]
#[serde(default)]
pub struct Config {
    /// `tracing` filter directive, for example `info` or `svkeeper_core=debug`.
    pub log_filter: String,
    /// Output format for log records.
    pub log_format: LogFormat,
    /// Directory holding named script templates (`sv-<name>-run` and friends).
    pub templates_dir: Utf8PathBuf,
    /// Delay between checks for the supervisor readiness pipe.
    pub readiness_interval_ms: u64,
    /// Upper bound on the readiness wait. Unset waits indefinitely.
    pub readiness_timeout_secs: Option<u64>,
    /// Control-group membership file of the init process.
    pub cgroup_path: Utf8PathBuf,
    /// `os-release` file used to pick the compatibility shim style.
    pub os_release_path: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            templates_dir: Utf8PathBuf::from(DEFAULT_TEMPLATES_DIR),
            readiness_interval_ms: DEFAULT_READINESS_INTERVAL_MS,
            readiness_timeout_secs: None,
            cgroup_path: Utf8PathBuf::from(DEFAULT_CGROUP_PATH),
            os_release_path: Utf8PathBuf::from(DEFAULT_OS_RELEASE_PATH),
        }
    }
}

impl Config {
    /// Log filter expression handed to the subscriber.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Selected log output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Template directory for named script templates.
    pub fn templates_dir(&self) -> &Utf8Path {
        &self.templates_dir
    }

    /// Poll interval for the readiness wait.
    pub fn readiness_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_interval_ms)
    }

    /// Optional bound on the readiness wait.
    pub fn readiness_timeout(&self) -> Option<Duration> {
        self.readiness_timeout_secs.map(Duration::from_secs)
    }

    /// Init-process cgroup file consulted for container detection.
    pub fn cgroup_path(&self) -> &Utf8Path {
        &self.cgroup_path
    }

    /// `os-release` file consulted for platform detection.
    pub fn os_release_path(&self) -> &Utf8Path {
        &self.os_release_path
    }
}
