use crate::logging::LogFormat;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default location of named script templates.
pub const DEFAULT_TEMPLATES_DIR: &str = "/etc/svkeeper/templates";

/// Default delay between readiness checks, matching runit's one-second cadence.
pub const DEFAULT_READINESS_INTERVAL_MS: u64 = 1_000;

/// Init-process cgroup membership file.
pub const DEFAULT_CGROUP_PATH: &str = "/proc/1/cgroup";

/// Operating-system identification file.
pub const DEFAULT_OS_RELEASE_PATH: &str = "/etc/os-release";

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
