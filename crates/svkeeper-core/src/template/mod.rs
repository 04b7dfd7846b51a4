//! Rendering of templated service files.
//!
//! Named templates come from a [`TemplateRenderer`]; the `svlogd`
//! configuration and the LSB init script are built in. Placeholders take the
//! form `{{ key }}` and every placeholder must have a value.

mod builtin;

use std::io;
use std::path::PathBuf;

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use thiserror::Error;

use crate::desired::{TemplateRef, TemplateVars};

pub use builtin::{INIT_SCRIPT, log_config};

/// Failures while producing template output.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The named template does not exist or cannot be read.
    #[error("template '{name}' not readable under {}: {source}", .root.display())]
    NotFound {
        /// Requested template.
        name: String,
        /// Directory searched.
        root: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A placeholder has no matching variable.
    #[error("template '{name}' references undefined variable '{variable}'")]
    MissingVariable {
        /// Template being rendered.
        name: String,
        /// Placeholder without a value.
        variable: String,
    },
    /// A `{{` has no closing `}}`.
    #[error("template '{name}' has an unterminated placeholder")]
    Unterminated {
        /// Template being rendered.
        name: String,
    },
}

/// Produces file content for a named template.
pub trait TemplateRenderer {
    /// Renders `name` with `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when the template is unknown or malformed.
    fn render(&self, name: &str, vars: &TemplateVars) -> Result<Vec<u8>, RenderError>;
}

/// Reads named templates from a directory.
///
/// The template `sv-web-run` is read from `<root>/sv-web-run`. Lookups are
/// confined to `root`.
#[derive(Debug, Clone)]
pub struct FileTemplateRenderer {
    root: PathBuf,
}

impl FileTemplateRenderer {
    /// Serves templates from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, name: &str) -> io::Result<String> {
        let dir = Dir::open_ambient_dir(&self.root, ambient_authority())?;
        dir.read_to_string(name)
    }
}

impl TemplateRenderer for FileTemplateRenderer {
    fn render(&self, name: &str, vars: &TemplateVars) -> Result<Vec<u8>, RenderError> {
        let source = self.read(name).map_err(|source| RenderError::NotFound {
            name: name.to_owned(),
            root: self.root.clone(),
            source,
        })?;
        substitute(name, &source, vars).map(String::into_bytes)
    }
}

/// Renders any template reference, dispatching built-ins locally.
///
/// # Errors
///
/// Propagates [`RenderError`] from the renderer or the built-in templates.
pub fn render_ref(
    renderer: &dyn TemplateRenderer,
    template: &TemplateRef,
    vars: &TemplateVars,
) -> Result<Vec<u8>, RenderError> {
    match template {
        TemplateRef::Named(name) => renderer.render(name, vars),
        TemplateRef::LogConfig => Ok(log_config(vars).into_bytes()),
        TemplateRef::InitScript => {
            substitute("init-script", INIT_SCRIPT, vars).map(String::into_bytes)
        }
    }
}

/// Replaces every `{{ key }}` in `source` with its value from `vars`.
///
/// # Errors
///
/// Returns [`RenderError::MissingVariable`] or [`RenderError::Unterminated`].
pub fn substitute(name: &str, source: &str, vars: &TemplateVars) -> Result<String, RenderError> {
    let mut rendered = String::with_capacity(source.len());
    let mut rest = source;
    while let Some((before, after_open)) = rest.split_once("{{") {
        rendered.push_str(before);
        let Some((key, after_close)) = after_open.split_once("}}") else {
            return Err(RenderError::Unterminated {
                name: name.to_owned(),
            });
        };
        let key = key.trim();
        let value = vars.get(key).ok_or_else(|| RenderError::MissingVariable {
            name: name.to_owned(),
            variable: key.to_owned(),
        })?;
        rendered.push_str(value);
        rest = after_close;
    }
    rendered.push_str(rest);
    Ok(rendered)
}
