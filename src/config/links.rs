//! Uplink configuration.

use serde::Deserialize;

/// The single hub this engine links to.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkBlock {
    /// Remote server name (e.g., "hub.example.net").
    pub name: String,
    /// Remote server IP/hostname to connect to.
    pub hostname: String,
    /// Remote server port.
    pub port: u16,
    /// Password we send in `PASS`.
    pub password: String,
    /// Password the hub must send back. Unchecked when absent.
    #[serde(default)]
    pub accept_password: Option<String>,
    /// Expected hub SID. Unchecked when absent.
    #[serde(default)]
    pub sid: Option<String>,
    /// Whether to use TLS for this link (system roots, verified).
    #[serde(default)]
    pub tls: bool,
}

impl LinkBlock {
    /// `host:port` for the socket connect.
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}
