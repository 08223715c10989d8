//! Framing and keep-alive limits.

use serde::Deserialize;
use std::time::Duration;

/// Link limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum inbound line length in bytes, terminator excluded.
    /// A longer line tears the link down (default: 16384).
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
    /// Seconds between our keep-alive PINGs (default: 90).
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    /// Seconds of inbound silence before the link is dropped (default: 240).
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
    /// Members per burst SJOIN line (default: 15).
    #[serde(default = "default_burst_chunk")]
    pub burst_chunk: usize,
}

impl LimitsConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_line_len: default_max_line_len(),
            ping_interval: default_ping_interval(),
            ping_timeout: default_ping_timeout(),
            burst_chunk: default_burst_chunk(),
        }
    }
}

fn default_max_line_len() -> usize {
    ts6_proto::DEFAULT_MAX_LINE_LEN
}

fn default_ping_interval() -> u64 {
    90
}

fn default_ping_timeout() -> u64 {
    240
}

fn default_burst_chunk() -> usize {
    15
}
