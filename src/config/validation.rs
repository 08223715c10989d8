//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::collections::HashSet;
use thiserror::Error;
use ts6_proto::irc_to_lower;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.sid must be exactly 3 characters, got {0}")]
    InvalidSid(usize),
    #[error("server.sid must match pattern [0-9][A-Z0-9][A-Z0-9], got '{0}'")]
    InvalidSidFormat(String),
    #[error("{field} must be a dotted server name, got '{value}'")]
    InvalidServerName { field: &'static str, value: String },
    #[error("uplink.password is required")]
    MissingPassword,
    #[error("modes table is malformed: {0}")]
    InvalidModes(String),
    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),
    #[error("client nick '{0}' is empty or contains spaces")]
    InvalidNick(String),
    #[error("client nick '{0}' is configured twice")]
    DuplicateNick(String),
}

/// Check the shape of a TS6 server ID.
pub fn is_valid_sid(sid: &str) -> bool {
    let b = sid.as_bytes();
    b.len() == 3
        && b[0].is_ascii_digit()
        && (b[1].is_ascii_uppercase() || b[1].is_ascii_digit())
        && (b[2].is_ascii_uppercase() || b[2].is_ascii_digit())
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // SID validation (TS6 format)
    let sid = &config.server.sid;
    if sid.len() != 3 {
        errors.push(ValidationError::InvalidSid(sid.len()));
    } else if !is_valid_sid(sid) {
        errors.push(ValidationError::InvalidSidFormat(sid.clone()));
    }

    for (field, value) in [
        ("server.name", &config.server.name),
        ("uplink.name", &config.uplink.name),
    ] {
        if !value.contains('.') || value.contains(' ') {
            errors.push(ValidationError::InvalidServerName {
                field,
                value: value.clone(),
            });
        }
    }

    if config.uplink.password.is_empty() {
        errors.push(ValidationError::MissingPassword);
    }

    if let Err(e) = config.modes.table() {
        errors.push(ValidationError::InvalidModes(e.to_string()));
    }

    for (name, value) in [
        ("max_line_len", config.limits.max_line_len as u64),
        ("ping_interval", config.limits.ping_interval),
        ("ping_timeout", config.limits.ping_timeout),
        ("burst_chunk", config.limits.burst_chunk as u64),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroLimit(name));
        }
    }

    let mut seen = HashSet::new();
    for client in &config.clients {
        if client.nick.is_empty() || client.nick.contains(' ') {
            errors.push(ValidationError::InvalidNick(client.nick.clone()));
        } else if !seen.insert(irc_to_lower(&client.nick)) {
            errors.push(ValidationError::DuplicateNick(client.nick.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config::parse(
            r#"
[server]
name = "services.example.net"
sid = "42X"
description = "Network Services"

[uplink]
name = "hub.example.net"
hostname = "127.0.0.1"
port = 6667
password = "linkpass"
"#,
        )
        .unwrap()
    }

    #[test]
    fn base_config_is_valid() {
        assert!(validate(&base()).is_ok());
    }

    #[test]
    fn sid_shape_is_checked() {
        assert!(is_valid_sid("0AB"));
        assert!(is_valid_sid("999"));
        assert!(!is_valid_sid("A00"));
        assert!(!is_valid_sid("0ab"));
        assert!(!is_valid_sid("00"));

        let mut config = base();
        config.server.sid = "X1".into();
        let errors = validate(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidSid(2)));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = base();
        config.server.sid = "abc".into();
        config.server.name = "services".into();
        config.uplink.password.clear();
        config.limits.burst_chunk = 0;
        config.modes.prefix = "ov".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn duplicate_nicks_fold_case() {
        let mut config = base();
        let block = crate::config::ClientBlock {
            nick: "NickServ".into(),
            user: "ns".into(),
            host: "services.int".into(),
            gecos: "x".into(),
            modes: "+io".into(),
            channels: Vec::new(),
            account: None,
        };
        let mut twin = block.clone();
        twin.nick = "nickserv".into();
        config.clients = vec![block, twin];
        let errors = validate(&config).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::DuplicateNick(n) if n == "nickserv"));
    }
}
