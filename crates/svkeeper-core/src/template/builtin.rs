use crate::desired::TemplateVars;

/// LSB init script forwarding every action to `sv`.
///
/// Placeholders: `name`, `sv_bin`, `service_dir`.
pub const INIT_SCRIPT: &str = r#"#!/bin/sh
### BEGIN INIT INFO
# Provides:          {{ name }}
# Required-Start:    $remote_fs $syslog
# Required-Stop:     $remote_fs $syslog
# Default-Start:     2 3 4 5
# Default-Stop:      0 1 6
# Short-Description: runit-supervised {{ name }}
### END INIT INFO

exec {{ sv_bin }} "$@" {{ service_dir }}
"#;

/// `svlogd` directives in the order `svlogd` documents them.
const LOG_DIRECTIVES: [(&str, &str); 7] = [
    ("size", "s"),
    ("num", "n"),
    ("min", "N"),
    ("timeout", "t"),
    ("processor", "!"),
    ("socket", "u"),
    ("prefix", "p"),
];

/// Renders `log/config` from the variables of a
/// [`LogConfig`](crate::spec::LogConfig).
///
/// Each set directive becomes one line; `append` is copied verbatim at the
/// end. An empty variable set yields an empty file.
#[must_use]
pub fn log_config(vars: &TemplateVars) -> String {
    let mut rendered = String::new();
    for (key, directive) in LOG_DIRECTIVES {
        if let Some(value) = vars.get(key) {
            rendered.push_str(directive);
            rendered.push_str(value);
            rendered.push('\n');
        }
    }
    if let Some(append) = vars.get("append") {
        rendered.push_str(append);
        if !append.ends_with('\n') {
            rendered.push('\n');
        }
    }
    rendered
}
