//! Local filesystem implementation of [`ObjectApplier`].
//!
//! Each object is compared with what is on disk first so that a repeated
//! pass reports no change. Files are replaced atomically and a symlink
//! standing where a file belongs (or the reverse) is replaced rather than
//! followed. Existing directories are never replaced.

mod files;
mod ownership;

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::Path;

use crate::converge::{ApplyError, ObjectApplier};
use crate::desired::{Attributes, FsObject};
use crate::template::{TemplateRenderer, render_ref};

use self::files::atomic_write;
use self::ownership::apply_ownership;

/// Mode given to new files that request none.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Applies objects to the local filesystem, rendering templates with `R`.
#[derive(Debug, Clone)]
pub struct LocalApplier<R> {
    renderer: R,
}

impl<R: TemplateRenderer> LocalApplier<R> {
    /// Creates an applier that renders named templates with `renderer`.
    pub const fn new(renderer: R) -> Self {
        Self { renderer }
    }
}

impl<R: TemplateRenderer> ObjectApplier for LocalApplier<R> {
    fn apply(&mut self, object: &FsObject) -> Result<bool, ApplyError> {
        match object {
            FsObject::Directory { path, attributes } => apply_directory(path, attributes),
            FsObject::File {
                path,
                content,
                attributes,
            } => apply_file(path, content.as_bytes(), attributes),
            FsObject::Template {
                path,
                template,
                vars,
                attributes,
            } => {
                let rendered = render_ref(&self.renderer, template, vars).map_err(|source| {
                    ApplyError::Render {
                        path: path.clone(),
                        source,
                    }
                })?;
                apply_file(path, &rendered, attributes)
            }
            FsObject::Symlink { path, target } => apply_symlink(path, target),
        }
    }

    fn remove(&mut self, path: &Path) -> Result<bool, ApplyError> {
        match fs::symlink_metadata(path) {
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(ApplyError::io(path, "inspect")(error)),
            Ok(metadata) if metadata.is_dir() => Err(ApplyError::Conflict {
                path: path.to_path_buf(),
                expected: "file or symbolic link",
            }),
            Ok(_) => {
                fs::remove_file(path).map_err(ApplyError::io(path, "remove"))?;
                Ok(true)
            }
        }
    }
}

fn existing(path: &Path) -> Result<Option<fs::Metadata>, ApplyError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(ApplyError::io(path, "inspect")(error)),
    }
}

fn apply_directory(path: &Path, attributes: &Attributes) -> Result<bool, ApplyError> {
    let created = match existing(path)? {
        Some(metadata) if metadata.is_dir() => false,
        Some(_) => {
            return Err(ApplyError::Conflict {
                path: path.to_path_buf(),
                expected: "directory",
            });
        }
        None => {
            fs::create_dir_all(path).map_err(ApplyError::io(path, "create directory"))?;
            true
        }
    };
    Ok(apply_attributes(path, attributes)? || created)
}

fn apply_file(path: &Path, content: &[u8], attributes: &Attributes) -> Result<bool, ApplyError> {
    let written = match existing(path)? {
        Some(metadata) if metadata.is_dir() => {
            return Err(ApplyError::Conflict {
                path: path.to_path_buf(),
                expected: "file",
            });
        }
        Some(metadata) if metadata.is_file() => {
            let current = fs::read(path).map_err(ApplyError::io(path, "read"))?;
            current != content
        }
        _ => true,
    };
    if written {
        let mode = attributes.mode.unwrap_or(DEFAULT_FILE_MODE);
        atomic_write(path, content, mode).map_err(ApplyError::io(path, "write"))?;
    }
    Ok(apply_attributes(path, attributes)? || written)
}

fn apply_symlink(path: &Path, target: &Path) -> Result<bool, ApplyError> {
    match existing(path)? {
        Some(metadata) if metadata.file_type().is_symlink() => {
            let current = fs::read_link(path).map_err(ApplyError::io(path, "read link"))?;
            if current == target {
                return Ok(false);
            }
            fs::remove_file(path).map_err(ApplyError::io(path, "replace link"))?;
        }
        Some(metadata) if metadata.is_dir() => {
            return Err(ApplyError::Conflict {
                path: path.to_path_buf(),
                expected: "symbolic link",
            });
        }
        Some(_) => fs::remove_file(path).map_err(ApplyError::io(path, "replace file"))?,
        None => {}
    }
    symlink(target, path).map_err(ApplyError::io(path, "create link"))?;
    Ok(true)
}

/// Applies mode and ownership to an existing regular file or directory.
fn apply_attributes(path: &Path, attributes: &Attributes) -> Result<bool, ApplyError> {
    let metadata = fs::metadata(path).map_err(ApplyError::io(path, "inspect"))?;
    let mut changed = false;
    if let Some(mode) = attributes.mode
        && metadata.permissions().mode() & 0o7777 != mode
    {
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(ApplyError::io(path, "set mode of"))?;
        changed = true;
    }
    Ok(apply_ownership(path, &metadata, attributes)? || changed)
}
