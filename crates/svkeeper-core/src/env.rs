//! Reconciliation of the `env` directory.
//!
//! `runsv` exposes each file under `env/` to the supervised process as an
//! environment variable named after the file. [`reconcile`] turns a desired
//! map and the materialised map into writes and removals.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use thiserror::Error;

use crate::desired::{Attributes, FsObject};

/// Failure reading the materialised environment.
#[derive(Debug, Error)]
#[error("failed to read environment directory {}: {source}", .path.display())]
pub struct EnvReadError {
    /// Directory or file being read.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// One variable to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvWrite {
    /// Variable name and file name.
    pub key: String,
    /// Desired value.
    pub value: String,
}

/// Writes and removals that bring `env/` in line with the desired map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvPlan {
    /// One entry per desired variable.
    pub writes: Vec<EnvWrite>,
    /// Variables present on disk but no longer desired.
    pub removals: Vec<String>,
}

/// A concrete step produced from an [`EnvPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvOperation {
    /// Write a variable file.
    Write(FsObject),
    /// Delete a variable file.
    Remove(PathBuf),
}

impl EnvPlan {
    /// Whether the plan has nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.removals.is_empty()
    }

    /// Expands the plan into file operations under `dir`.
    ///
    /// Written files carry `attributes`; removals are listed after writes.
    #[must_use]
    pub fn into_operations(self, dir: &Path, attributes: &Attributes) -> Vec<EnvOperation> {
        let writes = self.writes.into_iter().map(|write| {
            EnvOperation::Write(FsObject::File {
                path: dir.join(&write.key),
                content: write.value,
                attributes: attributes.clone(),
            })
        });
        let removals = self
            .removals
            .into_iter()
            .map(|key| EnvOperation::Remove(dir.join(key)));
        writes.chain(removals).collect()
    }
}

/// Diffs `desired` against `current`.
///
/// Every desired key yields a write, whether or not its value already
/// matches; the applier decides whether the file changes. Keys only in
/// `current` yield removals.
#[must_use]
pub fn reconcile(
    desired: &BTreeMap<String, String>,
    current: &BTreeMap<String, String>,
) -> EnvPlan {
    let writes = desired
        .iter()
        .map(|(key, value)| EnvWrite {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    let removals = current
        .keys()
        .filter(|key| !desired.contains_key(*key))
        .cloned()
        .collect();
    EnvPlan { writes, removals }
}

/// Reads the variables currently materialised under `dir`.
///
/// A missing directory is an empty environment. Hidden entries and
/// non-files are ignored, and trailing whitespace is stripped from values.
///
/// # Errors
///
/// Returns [`EnvReadError`] when the directory exists but cannot be read.
pub fn read_current_env(dir: &Path) -> Result<BTreeMap<String, String>, EnvReadError> {
    let wrap = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| EnvReadError { path, source }
    };
    let handle = match Dir::open_ambient_dir(dir, ambient_authority()) {
        Ok(handle) => handle,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(error) => return Err(wrap(dir)(error)),
    };
    let mut env = BTreeMap::new();
    for entry in handle.entries().map_err(wrap(dir))? {
        let entry = entry.map_err(wrap(dir))?;
        let Ok(key) = entry.file_name().into_string() else {
            continue;
        };
        if key.starts_with('.') || !entry.file_type().map_err(wrap(dir))?.is_file() {
            continue;
        }
        let value = handle
            .read_to_string(&key)
            .map_err(wrap(&dir.join(&key)))?;
        env.insert(key, value.trim_end().to_owned());
    }
    Ok(env)
}
