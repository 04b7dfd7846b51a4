//! Container detection used to skip the readiness wait.
//!
//! Inside a container the supervisor tree is frequently not running at
//! converge time, so waiting for `supervise/ok` would never finish.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use super::LIFECYCLE_TARGET;

/// Substrings of the init cgroup file that indicate a container runtime.
pub const CONTAINER_MARKERS: [&str; 5] = ["docker", "lxc", "kubepods", "containerd", "libpod"];

/// Decides whether this process runs inside a container.
pub trait ContainerDetector {
    /// Returns true inside a container.
    fn in_container(&self) -> bool;
}

impl ContainerDetector for bool {
    fn in_container(&self) -> bool {
        *self
    }
}

/// Inspects the cgroup membership of the init process.
#[derive(Debug, Clone)]
pub struct CgroupContainerDetector {
    path: PathBuf,
}

impl CgroupContainerDetector {
    /// Reads the given cgroup file, normally `/proc/1/cgroup`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContainerDetector for CgroupContainerDetector {
    fn in_container(&self) -> bool {
        match fs::read_to_string(&self.path) {
            Ok(content) => cgroup_indicates_container(&content),
            Err(error) => {
                debug!(
                    target: LIFECYCLE_TARGET,
                    path = %self.path.display(),
                    %error,
                    "cgroup file unreadable; assuming host"
                );
                false
            }
        }
    }
}

/// Whether any cgroup line mentions a known container runtime.
#[must_use]
pub fn cgroup_indicates_container(content: &str) -> bool {
    content
        .lines()
        .any(|line| CONTAINER_MARKERS.iter().any(|marker| line.contains(marker)))
}
