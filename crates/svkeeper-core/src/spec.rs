//! Declarative description of a supervised service.
//!
//! A [`ServiceSpec`] is parsed once per request and then treated as
//! read-only. Every on-disk location the engine touches is derived from it
//! through the path helpers below rather than stored alongside it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::control::SvCommand;
use crate::desired::Attributes;
use crate::lifecycle::Scope;

const DEFAULT_SV_DIR: &str = "/etc/sv";
const DEFAULT_SERVICE_DIR: &str = "/etc/service";
const DEFAULT_LSB_INIT_DIR: &str = "/etc/init.d";
const DEFAULT_SV_BIN: &str = "/usr/bin/sv";
const DEFAULT_LOG_ROOT: &str = "/var/log";

/// Control files `runsv` consults before acting on a control character.
const CONTROL_CHARACTERS: [&str; 13] = [
    "u", "d", "o", "c", "p", "h", "a", "i", "q", "1", "2", "t", "x",
];

/// Errors raised while loading a service specification.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The specification file could not be read.
    #[error("failed to read service spec {}: {source}", .path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The specification was not valid JSON or had unexpected fields.
    #[error("failed to parse service spec: {source}")]
    Parse {
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// The service name cannot be used as a directory name.
    #[error("invalid service name '{name}': must be a plain file name")]
    InvalidName {
        /// Rejected name.
        name: String,
    },
    /// An `env` key cannot be stored as a file directly under `env/`.
    #[error("invalid env key '{key}' for service '{service}': must be a plain file name")]
    InvalidEnvKey {
        /// Service being loaded.
        service: String,
        /// Rejected key.
        key: String,
    },
    /// A `control` entry is not a control character `runsv` understands.
    #[error("unknown control signal '{signal}' for service '{service}'")]
    UnknownControlSignal {
        /// Service being loaded.
        service: String,
        /// Rejected entry.
        signal: String,
    },
}

/// Parameters rendered into `log/config` for `svlogd`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Maximum size of the current log file in bytes (`s`).
    pub size: Option<u64>,
    /// Number of rotated files to keep (`n`).
    pub num: Option<u32>,
    /// Minimum number of rotated files to keep (`N`).
    pub min: Option<u32>,
    /// Rotate after this many seconds (`t`).
    pub timeout: Option<u64>,
    /// Processor run on rotated files (`!`).
    pub processor: Option<String>,
    /// UDP destination for log lines (`u`).
    pub socket: Option<String>,
    /// Prefix for lines forwarded over UDP (`p`).
    pub prefix: Option<String>,
    /// Verbatim text appended to the file.
    pub append: Option<String>,
}

impl LogConfig {
    /// Flattens the set parameters into template variables.
    pub fn variables(&self) -> BTreeMap<String, String> {
        let numeric = [
            ("size", self.size),
            ("timeout", self.timeout),
            ("num", self.num.map(u64::from)),
            ("min", self.min.map(u64::from)),
        ];
        let textual = [
            ("processor", self.processor.as_ref()),
            ("socket", self.socket.as_ref()),
            ("prefix", self.prefix.as_ref()),
            ("append", self.append.as_ref()),
        ];
        numeric
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_owned(), v.to_string())))
            .chain(
                textual
                    .into_iter()
                    .filter_map(|(key, value)| value.map(|v| (key.to_owned(), v.clone()))),
            )
            .collect()
    }
}

/// Declarative specification of one runit service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    /// Service name; the directory name under both roots.
    pub name: String,
    /// Root holding service definitions.
    #[serde(default = "default_sv_dir")]
    pub sv_dir: PathBuf,
    /// Root scanned by `runsvdir`.
    #[serde(default = "default_service_dir")]
    pub service_dir: PathBuf,
    /// Directory for the init-system compatibility shim.
    #[serde(default = "default_lsb_init_dir")]
    pub lsb_init_dir: PathBuf,
    /// Owner of generated files; unset leaves ownership alone.
    #[serde(default)]
    pub owner: Option<String>,
    /// Group of generated files; unset leaves ownership alone.
    #[serde(default)]
    pub group: Option<String>,
    /// Path to the `sv` control binary.
    #[serde(default = "default_sv_bin")]
    pub sv_bin: PathBuf,
    /// Seconds passed to `sv -w`.
    #[serde(default)]
    pub sv_timeout: Option<u64>,
    /// Pass `-v` to every `sv` invocation.
    #[serde(default)]
    pub sv_verbose: bool,
    /// Manage the contents of the service directory.
    #[serde(default = "enabled")]
    pub sv_templates: bool,
    /// Restart the service when its scripts change during `enable`.
    #[serde(default = "enabled")]
    pub restart_on_update: bool,
    /// Run a `log` service alongside the main process.
    #[serde(default = "enabled")]
    pub log: bool,
    /// Use the stock `svlogd` logger instead of a log run template.
    #[serde(default)]
    pub default_logger: bool,
    /// Install a `check` script.
    #[serde(default)]
    pub check: bool,
    /// Install a `finish` script.
    #[serde(default)]
    pub finish: bool,
    /// Environment exposed through the `env` directory.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Control characters with custom handler scripts, in declaration order.
    #[serde(default)]
    pub control: Vec<String>,
    /// Template name per control character; defaults to the service name.
    #[serde(default)]
    pub control_template_names: BTreeMap<String, String>,
    /// Template name for `run`.
    #[serde(default)]
    pub run_template_name: Option<String>,
    /// Template name for `log/run`.
    #[serde(default)]
    pub log_template_name: Option<String>,
    /// Template name for `check`.
    #[serde(default)]
    pub check_script_template_name: Option<String>,
    /// Template name for `finish`.
    #[serde(default)]
    pub finish_script_template_name: Option<String>,
    /// `svlogd` settings.
    #[serde(default)]
    pub log_config: LogConfig,
    /// Opaque values handed to every named template.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_sv_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SV_DIR)
}

fn default_service_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SERVICE_DIR)
}

fn default_lsb_init_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LSB_INIT_DIR)
}

fn default_sv_bin() -> PathBuf {
    PathBuf::from(DEFAULT_SV_BIN)
}

const fn enabled() -> bool {
    true
}

impl ServiceSpec {
    /// Builds a specification with every option at its default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sv_dir: default_sv_dir(),
            service_dir: default_service_dir(),
            lsb_init_dir: default_lsb_init_dir(),
            owner: None,
            group: None,
            sv_bin: default_sv_bin(),
            sv_timeout: None,
            sv_verbose: false,
            sv_templates: true,
            restart_on_update: true,
            log: true,
            default_logger: false,
            check: false,
            finish: false,
            env: BTreeMap::new(),
            control: Vec::new(),
            control_template_names: BTreeMap::new(),
            run_template_name: None,
            log_template_name: None,
            check_script_template_name: None,
            finish_script_template_name: None,
            log_config: LogConfig::default(),
            options: BTreeMap::new(),
        }
    }

    /// Reads and validates a JSON specification file.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when the file cannot be read, does not parse, or
    /// fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self, SpecError> {
        let content = fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Parses and validates a JSON specification.
    ///
    /// Duplicate `control` entries are collapsed, keeping the first
    /// occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] when the text does not parse or fails validation.
    pub fn from_json_str(content: &str) -> Result<Self, SpecError> {
        let spec: Self =
            serde_json::from_str(content).map_err(|source| SpecError::Parse { source })?;
        spec.validated()
    }

    /// Checks the name and control entries, deduplicating the latter.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidName`], [`SpecError::InvalidEnvKey`] or
    /// [`SpecError::UnknownControlSignal`].
    pub fn validated(mut self) -> Result<Self, SpecError> {
        if !is_plain_file_name(&self.name) || self.name.starts_with('.') {
            return Err(SpecError::InvalidName { name: self.name });
        }
        // `read_current_env` skips dotfiles, so a dotted key could never be removed.
        if let Some(key) = self
            .env
            .keys()
            .find(|key| !is_plain_file_name(key) || key.starts_with('.'))
        {
            return Err(SpecError::InvalidEnvKey {
                service: self.name,
                key: key.clone(),
            });
        }
        let mut seen = Vec::with_capacity(self.control.len());
        for signal in self.control {
            if !CONTROL_CHARACTERS.contains(&signal.as_str()) {
                return Err(SpecError::UnknownControlSignal {
                    service: self.name,
                    signal,
                });
            }
            if !seen.contains(&signal) {
                seen.push(signal);
            }
        }
        self.control = seen;
        Ok(self)
    }

    /// `sv_dir/<name>`, the service definition directory.
    pub fn sv_dir_path(&self) -> PathBuf {
        self.sv_dir.join(&self.name)
    }

    /// `service_dir/<name>`, the activation link.
    pub fn service_dir_path(&self) -> PathBuf {
        self.service_dir.join(&self.name)
    }

    /// The main `run` script.
    pub fn run_script_path(&self) -> PathBuf {
        self.sv_dir_path().join("run")
    }

    /// The `log` service directory.
    pub fn log_dir_path(&self) -> PathBuf {
        self.sv_dir_path().join("log")
    }

    /// The log service `run` script.
    pub fn log_run_script_path(&self) -> PathBuf {
        self.log_dir_path().join("run")
    }

    /// The `svlogd` configuration file.
    pub fn log_config_path(&self) -> PathBuf {
        self.log_dir_path().join("config")
    }

    /// Directory holding one file per environment variable.
    pub fn env_dir_path(&self) -> PathBuf {
        self.sv_dir_path().join("env")
    }

    /// Directory holding custom control handlers.
    pub fn control_dir_path(&self) -> PathBuf {
        self.sv_dir_path().join("control")
    }

    /// Where the stock logger writes.
    pub fn default_log_dir_path(&self) -> PathBuf {
        Path::new(DEFAULT_LOG_ROOT).join(&self.name)
    }

    /// The compatibility shim.
    pub fn lsb_init_path(&self) -> PathBuf {
        self.lsb_init_dir.join(&self.name)
    }

    /// Target handed to `sv` for the given scope.
    pub fn control_target(&self, scope: Scope) -> PathBuf {
        match scope {
            Scope::Service => self.service_dir_path(),
            Scope::Log => self.service_dir_path().join("log"),
        }
    }

    /// Named pipe `runsv` creates once it accepts commands for the scope.
    pub fn supervise_ok_path(&self, scope: Scope) -> PathBuf {
        self.control_target(scope).join("supervise").join("ok")
    }

    /// Template name for `run`.
    pub fn run_template_name(&self) -> &str {
        self.run_template_name.as_deref().unwrap_or(&self.name)
    }

    /// Template name for `log/run`.
    pub fn log_template_name(&self) -> &str {
        self.log_template_name.as_deref().unwrap_or(&self.name)
    }

    /// Template name for `check`.
    pub fn check_script_template_name(&self) -> &str {
        self.check_script_template_name
            .as_deref()
            .unwrap_or(&self.name)
    }

    /// Template name for `finish`.
    pub fn finish_script_template_name(&self) -> &str {
        self.finish_script_template_name
            .as_deref()
            .unwrap_or(&self.name)
    }

    /// Template name for a control handler.
    pub fn control_template_name(&self, signal: &str) -> &str {
        self.control_template_names
            .get(signal)
            .map_or(self.name.as_str(), String::as_str)
    }

    /// Ownership applied to generated files and directories.
    pub fn attributes(&self, mode: Option<u32>) -> Attributes {
        Attributes {
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode,
        }
    }

    /// `sv` invocation settings derived from this spec.
    pub fn sv_command(&self) -> SvCommand {
        SvCommand::new(self.sv_bin.clone())
            .with_timeout(self.sv_timeout.map(Duration::from_secs))
            .with_verbose(self.sv_verbose)
    }
}

/// Non-empty, a single path component, and free of NUL bytes.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\0'])
}
