use std::fmt;
use std::io::Error as IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Handshake digest mismatch: {0}")]
    DigestMismatch(String),

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Too many chunk streams: csid {csid} exceeds limit of {limit}")]
    TooManyChunkStreams { csid: u32, limit: usize },

    #[error("AMF decode error: {0}")]
    AmfDecode(String),

    #[error("AMF encode error: {0}")]
    AmfEncode(String),

    #[error("Unknown AMF0 marker: 0x{0:02x}")]
    UnknownMarker(u8),

    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Collector error: {0}")]
    Collector(String),
}

/// Error families used when deciding how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Handshake,
    Framing,
    Codec,
    ResourceLimit,
    Timeout,
    Configuration,
    Other,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Io => "io",
            ErrorCategory::Handshake => "handshake",
            ErrorCategory::Framing => "framing",
            ErrorCategory::Codec => "codec",
            ErrorCategory::ResourceLimit => "resource-limit",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Other => "other",
        };
        f.write_str(label)
    }
}

impl Error {
    /// Create a handshake error
    pub fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }

    /// Create a digest mismatch error
    pub fn digest_mismatch(msg: impl Into<String>) -> Self {
        Error::DigestMismatch(msg.into())
    }

    /// Create a framing error
    pub fn framing(msg: impl Into<String>) -> Self {
        Error::Framing(msg.into())
    }

    /// Create an AMF decode error
    pub fn amf_decode(msg: impl Into<String>) -> Self {
        Error::AmfDecode(msg.into())
    }

    /// Create an AMF encode error
    pub fn amf_encode(msg: impl Into<String>) -> Self {
        Error::AmfEncode(msg.into())
    }

    /// Create a truncation error
    pub fn truncated(needed: usize, remaining: usize) -> Self {
        Error::Truncated { needed, remaining }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a collector error
    pub fn collector(msg: impl Into<String>) -> Self {
        Error::Collector(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Io(_) | Error::Connection(_) => ErrorCategory::Io,
            Error::Handshake(_) | Error::DigestMismatch(_) => ErrorCategory::Handshake,
            Error::Framing(_) => ErrorCategory::Framing,
            Error::TooManyChunkStreams { .. } => ErrorCategory::ResourceLimit,
            Error::AmfDecode(_)
            | Error::AmfEncode(_)
            | Error::UnknownMarker(_)
            | Error::Truncated { .. } => ErrorCategory::Codec,
            Error::Timeout(_) => ErrorCategory::Timeout,
            Error::Configuration(_) => ErrorCategory::Configuration,
            Error::InvalidState(_) | Error::Collector(_) => ErrorCategory::Other,
        }
    }

    /// Whether the peer simply went away rather than misbehaving.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::framing("unknown header type");
        assert_eq!(format!("{}", err), "Framing error: unknown header type");

        let err = Error::TooManyChunkStreams { csid: 40, limit: 16 };
        assert_eq!(
            format!("{}", err),
            "Too many chunk streams: csid 40 exceeds limit of 16"
        );

        let err = Error::UnknownMarker(0x07);
        assert_eq!(format!("{}", err), "Unknown AMF0 marker: 0x07");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::handshake("x").category(), ErrorCategory::Handshake);
        assert_eq!(Error::digest_mismatch("x").category(), ErrorCategory::Handshake);
        assert_eq!(Error::framing("x").category(), ErrorCategory::Framing);
        assert_eq!(Error::truncated(4, 1).category(), ErrorCategory::Codec);
        assert_eq!(
            Error::TooManyChunkStreams { csid: 3, limit: 1 }.category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(ErrorCategory::ResourceLimit.to_string(), "resource-limit");
    }

    #[test]
    fn test_io_conversion() {
        use std::io::ErrorKind;

        let io_err = IoError::new(ErrorKind::UnexpectedEof, "EOF");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_disconnect());
        assert_eq!(err.category(), ErrorCategory::Io);
    }
}
