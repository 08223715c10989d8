//! Error types for the TS6 protocol primitives.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtoError`].
pub type Result<T, E = ProtoError> = std::result::Result<T, E>;

/// Framing and tokenizing errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A line (or an unterminated partial line) exceeded the framing limit.
    #[error("line too long: {actual} bytes (limit: {limit})")]
    LineTooLong {
        /// Bytes seen so far.
        actual: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// The line could not be tokenized into source, verb and parameters.
    #[error("invalid line at position {position}: {line:?}")]
    InvalidLine {
        /// The offending input.
        line: String,
        /// Character position where tokenizing stopped.
        position: usize,
    },
}

/// Errors produced by [`crate::parse_modes`].
///
/// Every variant is recoverable: callers log the offending mode string and
/// drop the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    /// The mode string was empty.
    #[error("empty mode string")]
    Empty,

    /// The mode string did not start with `+` or `-`.
    #[error("mode string {0:?} does not start with '+' or '-'")]
    MissingDirection(String),

    /// A letter requiring a parameter ran out of positional arguments.
    #[error("mode '{0}' requires a parameter but none was left")]
    MissingParam(char),

    /// A letter outside the permitted set.
    #[error("unknown mode letter '{0}'")]
    UnknownMode(char),

    /// Positional arguments were left over after every letter was consumed.
    #[error("unused mode parameters: {0:?}")]
    TooManyParams(Vec<String>),

    /// A `PREFIX` or `CHANMODES` token could not be read.
    #[error("malformed feature token {0:?}")]
    BadFeatureToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err: ProtoError = io_err.into();
        assert!(matches!(err, ProtoError::Io(_)));
        assert_eq!(err.to_string(), "io error: broken pipe");
    }

    #[test]
    fn test_line_too_long_display() {
        let err = ProtoError::LineTooLong {
            actual: 20000,
            limit: 16384,
        };
        assert_eq!(err.to_string(), "line too long: 20000 bytes (limit: 16384)");
    }

    #[test]
    fn test_mode_error_display() {
        assert_eq!(
            ModeError::MissingParam('k').to_string(),
            "mode 'k' requires a parameter but none was left"
        );
        assert_eq!(ModeError::UnknownMode('Y').to_string(), "unknown mode letter 'Y'");
    }
}
