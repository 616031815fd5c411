//! Outbound line configuration.

use serde::Deserialize;

/// Pacing and size limits for the printer.
///
/// IRC servers disconnect clients that write too fast ("Excess Flood"), so
/// the printer paces itself with a token bucket.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Sustained lines per second; 0 disables pacing (default: 2).
    #[serde(default = "default_lines_per_second")]
    pub lines_per_second: u32,
    /// Lines that may be sent back to back before pacing starts (default: 4).
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Longest protocol line written, CRLF excluded (default: 400).
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            lines_per_second: default_lines_per_second(),
            burst: default_burst(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

fn default_lines_per_second() -> u32 {
    2
}

fn default_burst() -> u32 {
    4
}

fn default_max_line_bytes() -> usize {
    400
}
