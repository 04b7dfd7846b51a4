//! Host distribution detection.
//!
//! Only one distinction matters to the engine: Debian-family hosts get a
//! rendered init script as their compatibility shim, everything else gets a
//! symlink to `sv`.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

const PLATFORM_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::platform");

/// Distribution families the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    /// Debian and derivatives that declare `ID=debian`.
    Debian,
    /// Any other host.
    Other,
}

/// Reports the host distribution family.
pub trait PlatformProvider {
    /// Returns the distribution family of the current host.
    fn platform(&self) -> PlatformKind;
}

impl PlatformProvider for PlatformKind {
    fn platform(&self) -> PlatformKind {
        *self
    }
}

/// Reads `ID=` from an `os-release` file.
///
/// A missing or unreadable file is treated as [`PlatformKind::Other`].
#[derive(Debug, Clone)]
pub struct OsReleasePlatform {
    path: PathBuf,
}

impl OsReleasePlatform {
    /// Creates a provider reading the given `os-release` file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlatformProvider for OsReleasePlatform {
    fn platform(&self) -> PlatformKind {
        match fs::read_to_string(&self.path) {
            Ok(content) => parse_os_release(&content),
            Err(error) => {
                debug!(
                    target: PLATFORM_TARGET,
                    path = %self.path.display(),
                    %error,
                    "os-release unreadable; assuming non-debian host"
                );
                PlatformKind::Other
            }
        }
    }
}

fn parse_os_release(content: &str) -> PlatformKind {
    let id = content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("ID="))
        .map(|value| value.trim_matches(|c| c == '"' || c == '\''))
        .next();
    match id {
        Some("debian") => PlatformKind::Debian,
        _ => PlatformKind::Other,
    }
}
