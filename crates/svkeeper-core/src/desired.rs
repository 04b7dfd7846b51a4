//! Pure derivation of the on-disk layout a [`ServiceSpec`] asks for.
//!
//! [`build`] performs no I/O. The returned descriptors are ordered so that
//! every directory precedes the entries placed inside it; the convergence
//! engine applies them in exactly this order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::platform::PlatformKind;
use crate::spec::ServiceSpec;

/// Mode applied to directories and executable scripts.
pub const EXECUTABLE_MODE: u32 = 0o755;
/// Mode applied to `log/config`.
pub const CONFIG_MODE: u32 = 0o644;

/// Variables handed to a template.
pub type TemplateVars = BTreeMap<String, String>;

/// Ownership and permissions for a filesystem object.
///
/// `None` fields leave the corresponding on-disk property untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    /// Owning user name.
    pub owner: Option<String>,
    /// Owning group name.
    pub group: Option<String>,
    /// Permission bits.
    pub mode: Option<u32>,
}

/// Source of a templated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// A user-supplied template such as `sv-web-run`.
    Named(String),
    /// The built-in `svlogd` configuration.
    LogConfig,
    /// The built-in LSB init script.
    InitScript,
}

/// One filesystem object to converge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsObject {
    /// A directory.
    Directory {
        /// Location.
        path: PathBuf,
        /// Ownership and mode.
        attributes: Attributes,
    },
    /// A regular file with literal content.
    File {
        /// Location.
        path: PathBuf,
        /// Exact content.
        content: String,
        /// Ownership and mode.
        attributes: Attributes,
    },
    /// A regular file rendered from a template.
    Template {
        /// Location.
        path: PathBuf,
        /// Template to render.
        template: TemplateRef,
        /// Variables for the template.
        vars: TemplateVars,
        /// Ownership and mode.
        attributes: Attributes,
    },
    /// A symbolic link.
    Symlink {
        /// Location of the link itself.
        path: PathBuf,
        /// Path the link points at.
        target: PathBuf,
    },
}

impl FsObject {
    /// Location of the object.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory { path, .. }
            | Self::File { path, .. }
            | Self::Template { path, .. }
            | Self::Symlink { path, .. } => path,
        }
    }
}

/// Builds the ordered descriptor list for `spec` on `platform`.
#[must_use]
pub fn build(spec: &ServiceSpec, platform: PlatformKind) -> Vec<FsObject> {
    let mut objects = Vec::new();
    if spec.sv_templates {
        push_service_dir(spec, &mut objects);
        if spec.log {
            push_log(spec, &mut objects);
        }
        if !spec.env.is_empty() {
            objects.push(directory(spec, spec.env_dir_path()));
        }
        if spec.check {
            objects.push(script(
                spec,
                spec.sv_dir_path().join("check"),
                format!("sv-{}-check", spec.check_script_template_name()),
            ));
        }
        if spec.finish {
            objects.push(script(
                spec,
                spec.sv_dir_path().join("finish"),
                format!("sv-{}-finish", spec.finish_script_template_name()),
            ));
        }
        if !spec.control.is_empty() {
            push_control(spec, &mut objects);
        }
    }
    objects.push(compatibility_shim(spec, platform));
    objects
}

fn push_service_dir(spec: &ServiceSpec, objects: &mut Vec<FsObject>) {
    objects.push(directory(spec, spec.sv_dir_path()));
    objects.push(script(
        spec,
        spec.run_script_path(),
        format!("sv-{}-run", spec.run_template_name()),
    ));
}

fn push_log(spec: &ServiceSpec, objects: &mut Vec<FsObject>) {
    objects.push(FsObject::Directory {
        path: spec.log_dir_path(),
        attributes: spec.attributes(None),
    });
    objects.push(directory(spec, spec.log_dir_path().join("main")));
    if spec.default_logger {
        objects.push(directory(spec, spec.default_log_dir_path()));
        objects.push(FsObject::File {
            path: spec.log_run_script_path(),
            content: format!(
                "#!/bin/sh\nexec svlogd -tt {}",
                spec.default_log_dir_path().display()
            ),
            attributes: spec.attributes(Some(EXECUTABLE_MODE)),
        });
    } else {
        objects.push(script(
            spec,
            spec.log_run_script_path(),
            format!("sv-{}-log-run", spec.log_template_name()),
        ));
    }
    objects.push(FsObject::Template {
        path: spec.log_config_path(),
        template: TemplateRef::LogConfig,
        vars: spec.log_config.variables(),
        attributes: spec.attributes(Some(CONFIG_MODE)),
    });
}

fn push_control(spec: &ServiceSpec, objects: &mut Vec<FsObject>) {
    let control_dir = spec.control_dir_path();
    objects.push(directory(spec, control_dir.clone()));
    for signal in &spec.control {
        objects.push(script(
            spec,
            control_dir.join(signal),
            format!("sv-{}-{signal}", spec.control_template_name(signal)),
        ));
    }
}

fn compatibility_shim(spec: &ServiceSpec, platform: PlatformKind) -> FsObject {
    match platform {
        PlatformKind::Debian => FsObject::Template {
            path: spec.lsb_init_path(),
            template: TemplateRef::InitScript,
            vars: BTreeMap::from([
                (String::from("name"), spec.name.clone()),
                (String::from("sv_bin"), spec.sv_bin.display().to_string()),
                (
                    String::from("service_dir"),
                    spec.service_dir_path().display().to_string(),
                ),
            ]),
            attributes: Attributes {
                owner: Some(String::from("root")),
                group: Some(String::from("root")),
                mode: Some(EXECUTABLE_MODE),
            },
        },
        PlatformKind::Other => FsObject::Symlink {
            path: spec.lsb_init_path(),
            target: spec.sv_bin.clone(),
        },
    }
}

fn directory(spec: &ServiceSpec, path: PathBuf) -> FsObject {
    FsObject::Directory {
        path,
        attributes: spec.attributes(Some(EXECUTABLE_MODE)),
    }
}

fn script(spec: &ServiceSpec, path: PathBuf, template: String) -> FsObject {
    FsObject::Template {
        path,
        template: TemplateRef::Named(template),
        vars: named_vars(spec),
        attributes: spec.attributes(Some(EXECUTABLE_MODE)),
    }
}

/// `name` plus every option as `options.<key>`.
fn named_vars(spec: &ServiceSpec) -> TemplateVars {
    std::iter::once((String::from("name"), spec.name.clone()))
        .chain(
            spec.options
                .iter()
                .map(|(key, value)| (format!("options.{key}"), value.clone())),
        )
        .collect()
}
