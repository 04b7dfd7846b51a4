//! Preconditions checked before any lifecycle work begins.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use thiserror::Error;

use crate::spec::ServiceSpec;

/// Configuration problems that make the service unmanageable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The `sv` control binary is missing or not executable.
    #[error(
        "runit control binary {} is missing or not executable; install runit or set sv_bin",
        .path.display()
    )]
    MissingControlBinary {
        /// Configured `sv_bin`.
        path: PathBuf,
    },
}

/// Confirms that `sv_bin` names an executable regular file.
///
/// # Errors
///
/// Returns [`ConfigError::MissingControlBinary`] otherwise.
pub fn validate(spec: &ServiceSpec) -> Result<(), ConfigError> {
    let executable = fs::metadata(&spec.sv_bin)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false);
    if executable {
        Ok(())
    } else {
        Err(ConfigError::MissingControlBinary {
            path: spec.sv_bin.clone(),
        })
    }
}
