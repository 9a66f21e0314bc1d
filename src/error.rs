use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::types::AddressFamily;

/// Classifies errors for programmatic matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Name resolution failed
    Resolve,
    /// The family filter excluded every resolved address
    NoMatchingAddressFamily,
    /// Resolution succeeded but yielded no usable address
    HostNotFound,
    /// Deadline exceeded
    TimedOut,
    /// Connect, write or read failure unrelated to the deadline
    Transport,
    /// Malformed SOCKS4 reply
    Protocol,
    /// The proxy refused the request
    ProxyRejected,
    /// Invalid options
    Config,
}

/// Which part of an operation the deadline was guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Connect,
    Handshake,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Resolve => f.write_str("resolve"),
            Phase::Connect => f.write_str("connect"),
            Phase::Handshake => f.write_str("handshake"),
        }
    }
}

/// Reason a SOCKS4 proxy gave for not granting a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// 0x5B: request rejected or failed
    RequestFailed,
    /// 0x5C: the proxy cannot reach an identd on the client
    NoIdentd,
    /// 0x5D: identd reported a different user id
    BadUserId,
    /// Status byte outside the SOCKS4 set, handled like `RequestFailed`
    Unknown(u8),
}

impl RejectReason {
    /// The io error class this rejection belongs to.
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            RejectReason::RequestFailed | RejectReason::Unknown(_) => io::ErrorKind::Interrupted,
            RejectReason::NoIdentd | RejectReason::BadUserId => io::ErrorKind::PermissionDenied,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::RequestFailed => f.write_str("request rejected or failed"),
            RejectReason::NoIdentd => f.write_str("proxy cannot reach identd on the client"),
            RejectReason::BadUserId => f.write_str("identd reported a different user id"),
            RejectReason::Unknown(code) => write!(f, "unknown status 0x{:02x}", code),
        }
    }
}

/// Connect and handshake errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("No {family} address for {host}")]
    NoMatchingAddressFamily { host: String, family: AddressFamily },

    #[error("Host not found: {0}")]
    HostNotFound(String),

    #[error("Timed out during {phase} after {timeout:?}")]
    TimedOut { phase: Phase, timeout: Duration },

    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("Malformed SOCKS4 reply: version byte 0x{version:02x}")]
    Protocol { version: u8 },

    #[error("Truncated SOCKS4 message: {len} bytes")]
    Truncated { len: usize },

    #[error("SOCKS4 proxy rejected the request: {0}")]
    ProxyRejected(RejectReason),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Resolve { .. } => ErrorKind::Resolve,
            Error::NoMatchingAddressFamily { .. } => ErrorKind::NoMatchingAddressFamily,
            Error::HostNotFound(_) => ErrorKind::HostNotFound,
            Error::TimedOut { .. } => ErrorKind::TimedOut,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Protocol { .. } | Error::Truncated { .. } => ErrorKind::Protocol,
            Error::ProxyRejected(_) => ErrorKind::ProxyRejected,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether repeating the same attempt against the same proxy can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TimedOut { .. } | Error::Transport(_) => true,
            Error::ProxyRejected(reason) => reason.io_kind() == io::ErrorKind::Interrupted,
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Transport(e) => e,
            Error::Resolve { source, .. } => source,
            Error::TimedOut { .. } => io::Error::new(io::ErrorKind::TimedOut, err),
            Error::Protocol { .. } | Error::Truncated { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, err)
            }
            Error::ProxyRejected(reason) => io::Error::new(reason.io_kind(), err),
            Error::HostNotFound(_) | Error::NoMatchingAddressFamily { .. } => {
                io::Error::new(io::ErrorKind::NotFound, err)
            }
            Error::Config(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_is_matchable() {
        let err = Error::TimedOut {
            phase: Phase::Connect,
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.kind(), ErrorKind::TimedOut);

        let err = Error::ProxyRejected(RejectReason::BadUserId);
        assert_eq!(err.kind(), ErrorKind::ProxyRejected);
    }

    #[test]
    fn test_reject_reason_io_kind() {
        assert_eq!(
            RejectReason::RequestFailed.io_kind(),
            io::ErrorKind::Interrupted
        );
        assert_eq!(
            RejectReason::Unknown(0x42).io_kind(),
            io::ErrorKind::Interrupted
        );
        assert_eq!(
            RejectReason::NoIdentd.io_kind(),
            io::ErrorKind::PermissionDenied
        );
        assert_eq!(
            RejectReason::BadUserId.io_kind(),
            io::ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn test_retryable() {
        let timeout = Error::TimedOut {
            phase: Phase::Handshake,
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());
        assert!(Error::ProxyRejected(RejectReason::RequestFailed).is_retryable());
        assert!(!Error::ProxyRejected(RejectReason::BadUserId).is_retryable());
        assert!(!Error::ProxyRejected(RejectReason::NoIdentd).is_retryable());
        assert!(!Error::Protocol { version: 4 }.is_retryable());
    }

    #[test]
    fn test_into_io_error_keeps_class() {
        let io_err: io::Error = Error::TimedOut {
            phase: Phase::Connect,
            timeout: Duration::from_secs(3),
        }
        .into();
        assert_eq!(io_err.kind(), io::ErrorKind::TimedOut);

        let io_err: io::Error = Error::Protocol { version: 0x05 }.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let io_err: io::Error = Error::ProxyRejected(RejectReason::NoIdentd).into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_display_includes_details() {
        let err = Error::NoMatchingAddressFamily {
            host: "localhost".into(),
            family: AddressFamily::V6Only,
        };
        let display = format!("{}", err);
        assert!(display.contains("localhost"), "got: {}", display);
        assert!(display.contains("IPv6"), "got: {}", display);

        let display = format!("{}", Error::Protocol { version: 0x5a });
        assert!(display.contains("0x5a"), "got: {}", display);

        let err = Error::Truncated { len: 0 };
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(!err.is_retryable());
        let display = format!("{}", err);
        assert!(display.contains("Truncated"), "got: {}", display);
        assert!(!display.contains("version"), "got: {}", display);
    }
}
