//! SOCKS4 client support.
//!
//! - `proto`: request/reply wire format
//! - `handshake`: the CONNECT exchange over a socket connected to a proxy

mod handshake;
pub mod proto;

pub use handshake::{socks4_handshake, HandshakeState, Socks4Handshake};
pub use proto::{ReplyStatus, Socks4Reply, Socks4Request};
