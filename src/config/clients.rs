//! Pseudo-client blocks.

use serde::Deserialize;

/// A locally-owned client the binary introduces when the link starts.
///
/// ```toml
/// [[client]]
/// nick = "NickServ"
/// user = "NickServ"
/// host = "services.int"
/// gecos = "Nickname Services"
/// channels = ["#services"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ClientBlock {
    pub nick: String,
    pub user: String,
    pub host: String,
    pub gecos: String,
    /// User modes at introduction (default: "+io").
    #[serde(default = "default_client_modes")]
    pub modes: String,
    /// Channels joined right after introduction.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Account the client is logged in as.
    #[serde(default)]
    pub account: Option<String>,
}

fn default_client_modes() -> String {
    "+io".to_string()
}
