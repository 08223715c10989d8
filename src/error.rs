//! Unified error handling for the link engine.
//!
//! Every failure a session can hit is a [`LinkError`]. The split that
//! matters is [`LinkError::is_fatal`]: recoverable errors are logged and the
//! offending line is dropped without touching state; fatal errors tear the
//! link down.

use thiserror::Error;
use ts6_proto::{ModeError, ProtoError};

/// Errors raised while processing lines or local operations.
#[derive(Debug, Error)]
pub enum LinkError {
    // ------------------------------------------------------------------------
    // Recoverable: log and drop
    // ------------------------------------------------------------------------
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("bad mode string: {0}")]
    BadModeString(#[from] ModeError),

    #[error("unrecognized verb: {0}")]
    UnrecognizedVerb(String),

    #[error("not enough parameters for {0}")]
    NeedMoreParams(&'static str),

    #[error("malformed {verb}: {reason}")]
    Malformed { verb: &'static str, reason: String },

    // ------------------------------------------------------------------------
    // Fatal: tear the session down
    // ------------------------------------------------------------------------
    #[error("duplicate {kind} {key}: state desynchronized with peer")]
    DuplicateKey { kind: &'static str, key: String },

    #[error("protocol framing: {0}")]
    ProtocolFraming(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("peer sent ERROR: {0}")]
    RemoteError(String),

    #[error("ping timeout: no data for {0}s")]
    PingTimeout(u64),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("link closed")]
    Closed,
}

impl LinkError {
    /// Whether the session must be torn down.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateKey { .. }
                | Self::ProtocolFraming(_)
                | Self::AuthFailed(_)
                | Self::RemoteError(_)
                | Self::PingTimeout(_)
                | Self::Io(_)
                | Self::Closed
        )
    }

    /// Static label for logs and counters.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownEntity(_) => "unknown_entity",
            Self::BadModeString(_) => "bad_mode_string",
            Self::UnrecognizedVerb(_) => "unrecognized_verb",
            Self::NeedMoreParams(_) => "need_more_params",
            Self::Malformed { .. } => "malformed",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::ProtocolFraming(_) => "protocol_framing",
            Self::AuthFailed(_) => "auth_failed",
            Self::RemoteError(_) => "remote_error",
            Self::PingTimeout(_) => "ping_timeout",
            Self::Io(_) => "io",
            Self::Closed => "closed",
        }
    }

    pub(crate) fn malformed(verb: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            verb,
            reason: reason.into(),
        }
    }
}

impl From<ProtoError> for LinkError {
    fn from(err: ProtoError) -> Self {
        match err {
            ProtoError::Io(e) => Self::Io(e),
            other => Self::ProtocolFraming(other.to_string()),
        }
    }
}

/// Result type for handlers and session operations.
pub type LinkResult<T = ()> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_not_fatal() {
        assert!(!LinkError::UnknownEntity("00AAAAAAB".into()).is_fatal());
        assert!(!LinkError::BadModeString(ModeError::UnknownMode('Y')).is_fatal());
        assert!(!LinkError::UnrecognizedVerb("WHOIS".into()).is_fatal());
        assert!(!LinkError::NeedMoreParams("SJOIN").is_fatal());
        assert!(!LinkError::malformed("NICK", "ts").is_fatal());
    }

    #[test]
    fn desync_and_framing_are_fatal() {
        let dup = LinkError::DuplicateKey {
            kind: "client",
            key: "00AAAAAAB".into(),
        };
        assert!(dup.is_fatal());
        assert!(LinkError::ProtocolFraming("too long".into()).is_fatal());
        assert!(LinkError::Closed.is_fatal());
    }

    #[test]
    fn framing_errors_convert() {
        let err: LinkError = ProtoError::LineTooLong {
            actual: 20000,
            limit: 16384,
        }
        .into();
        assert!(matches!(err, LinkError::ProtocolFraming(_)));
        assert_eq!(err.error_code(), "protocol_framing");
    }

    #[test]
    fn display_names_the_key() {
        let dup = LinkError::DuplicateKey {
            kind: "server",
            key: "00A".into(),
        };
        assert_eq!(
            dup.to_string(),
            "duplicate server 00A: state desynchronized with peer"
        );
    }
}
