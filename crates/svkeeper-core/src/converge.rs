//! Ordered application of filesystem descriptors.
//!
//! The engine never reorders: directories come before their contents
//! because [`desired::build`](crate::desired::build) emits them that way.
//! The first failing object aborts the pass and objects already applied stay
//! applied.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::desired::FsObject;
use crate::env::EnvOperation;
use crate::template::RenderError;

const CONVERGE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::converge");

/// Failures while applying one filesystem object.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A filesystem call failed.
    #[error("failed to {operation} {}: {source}", .path.display())]
    Io {
        /// Object being applied.
        path: PathBuf,
        /// Short description such as `create directory`.
        operation: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The object's template could not be rendered.
    #[error("failed to render {}: {source}", .path.display())]
    Render {
        /// Object being applied.
        path: PathBuf,
        /// Underlying render error.
        #[source]
        source: RenderError,
    },
    /// Something of a different kind already occupies the path.
    #[error("{} exists but is not a {expected}", .path.display())]
    Conflict {
        /// Object being applied.
        path: PathBuf,
        /// Kind of object wanted at the path.
        expected: &'static str,
    },
    /// The requested owner does not exist.
    #[error("unknown user '{name}' for {}", .path.display())]
    UnknownUser {
        /// Object being applied.
        path: PathBuf,
        /// Requested user name.
        name: String,
    },
    /// The requested group does not exist.
    #[error("unknown group '{name}' for {}", .path.display())]
    UnknownGroup {
        /// Object being applied.
        path: PathBuf,
        /// Requested group name.
        name: String,
    },
}

impl ApplyError {
    /// Adapter for `map_err` on I/O results.
    pub fn io(path: &Path, operation: &'static str) -> impl FnOnce(io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            path,
            operation,
            source,
        }
    }
}

/// Idempotently materialises filesystem objects.
pub trait ObjectApplier {
    /// Brings `object` into existence with the requested content and
    /// attributes.
    ///
    /// Returns whether anything on disk changed.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the object cannot be materialised.
    fn apply(&mut self, object: &FsObject) -> Result<bool, ApplyError>;

    /// Removes the file or link at `path`.
    ///
    /// Returns whether anything was removed; a missing path is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] when the removal fails.
    fn remove(&mut self, path: &Path) -> Result<bool, ApplyError>;
}

/// Outcome of one convergence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergenceResult {
    /// Whether any object changed.
    pub any_changed: bool,
    /// Change flag per applied path.
    pub per_object: BTreeMap<PathBuf, bool>,
}

impl ConvergenceResult {
    /// Whether the object at `path` changed. Paths not applied report false.
    #[must_use]
    pub fn changed(&self, path: &Path) -> bool {
        self.per_object.get(path).copied().unwrap_or(false)
    }

    fn record(&mut self, path: &Path, changed: bool) {
        self.any_changed |= changed;
        self.per_object.insert(path.to_path_buf(), changed);
    }
}

/// Applies descriptor lists through an [`ObjectApplier`].
pub struct ConvergenceEngine<'a> {
    applier: &'a mut dyn ObjectApplier,
}

impl<'a> ConvergenceEngine<'a> {
    /// Drives `applier`.
    pub fn new(applier: &'a mut dyn ObjectApplier) -> Self {
        Self { applier }
    }

    /// Applies `objects` in order, then the environment operations.
    ///
    /// # Errors
    ///
    /// Returns the first [`ApplyError`]; later objects are not attempted.
    pub fn apply(
        &mut self,
        objects: &[FsObject],
        env: &[EnvOperation],
    ) -> Result<ConvergenceResult, ApplyError> {
        let mut result = ConvergenceResult::default();
        for object in objects {
            let changed = self.applier.apply(object)?;
            log_change(object.path(), changed);
            result.record(object.path(), changed);
        }
        for operation in env {
            let (path, changed) = match operation {
                EnvOperation::Write(object) => (object.path(), self.applier.apply(object)?),
                EnvOperation::Remove(path) => (path.as_path(), self.applier.remove(path)?),
            };
            log_change(path, changed);
            result.record(path, changed);
        }
        if result.any_changed {
            info!(
                target: CONVERGE_TARGET,
                changed = result.per_object.values().filter(|c| **c).count(),
                "service files converged"
            );
        }
        Ok(result)
    }
}

fn log_change(path: &Path, changed: bool) {
    debug!(target: CONVERGE_TARGET, path = %path.display(), changed, "applied");
}
