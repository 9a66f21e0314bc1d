//! socks4-connect - timed TCP connect and SOCKS4 client handshake for tokio
//!
//! This library provides:
//! - A connect operation that resolves a host, filters by address family and
//!   gives up after a deadline, leaving the socket closed
//! - A SOCKS4 CONNECT handshake over an already connected socket, bounded by
//!   its own deadline
//! - A dialer chaining both to open a tunnel through a SOCKS4 proxy
//!
//! # Example
//!
//! ```no_run
//! use socks4_connect::{socks4_handshake, timed_connect, AddressFamily, Socket};
//!
//! # async fn run() -> socks4_connect::Result<()> {
//! let mut socket = Socket::new();
//! timed_connect(&mut socket, "proxy.example.com", 1080, 5, AddressFamily::V4Only).await?;
//! socks4_handshake(&mut socket, "www.example.com", 80, 5).await?;
//! // `socket` now talks to www.example.com:80 through the proxy
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every operation completes exactly once with a `Result`. Use
//! [`Error::kind`] to tell a timeout, which may be retried, from a proxy
//! rejection such as a bad user id, which should not be retried against the
//! same proxy.

pub mod connect;
pub mod error;
pub mod resolver;
pub mod session;
pub mod socket;
pub mod socks4;
pub mod timer;
pub mod types;

// Re-export commonly used items
pub use connect::{timed_connect, ConnectState, TimedConnect};
pub use error::{Error, ErrorKind, Phase, RejectReason, Result};
pub use resolver::{NilResolver, Resolver, StaticResolver, SystemResolver};
pub use session::{DialerOptions, Socks4Dialer};
pub use socket::Socket;
pub use socks4::{socks4_handshake, HandshakeState, ReplyStatus, Socks4Handshake};
pub use timer::{DeadlineTimer, TimerState};
pub use types::{
    validate_user_id, AddressFamily, ConnectRequest, HandshakeRequest, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_ID, MAX_USER_ID_LEN,
};
