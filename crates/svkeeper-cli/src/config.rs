//! Configuration loading for the CLI.
//!
//! Leading configuration flags are handed to `ortho_config`; everything from
//! the first other token onwards belongs to the action parser.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use svkeeper_config::Config;

use crate::AppError;

/// Flags understood by [`Config`], which must precede `--spec` and the action.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--templates-dir",
    "--readiness-interval-ms",
    "--readiness-timeout-secs",
    "--cgroup-path",
    "--os-release-path",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the filtered argument list.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

/// Loader that ignores arguments and the environment.
#[cfg(test)]
pub(crate) struct FixedConfigLoader(pub(crate) Config);

#[cfg(test)]
impl ConfigLoader for FixedConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut awaiting_value = false;
    let mut command_start = 1;
    for argument in args.iter().skip(1) {
        if awaiting_value {
            awaiting_value = false;
        } else {
            match classify(argument) {
                FlagAction::Include { needs_value } => awaiting_value = needs_value,
                FlagAction::Stop => break,
            }
        }
        config_arguments.push(argument.clone());
        command_start += 1;
    }

    ConfigArgumentSplit {
        config_arguments,
        command_start,
    }
}

/// The action parser's view: the program name plus the non-config tail.
pub(crate) fn command_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.iter().skip(split.command_start))
        .cloned()
        .collect()
}
