use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Log record layouts understood by the CLI telemetry.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per record, for log shippers.
    #[default]
    Json,
    /// Single human-readable line per record.
    Compact,
}
