//! SOCKS4 wire format.
//!
//! Request: `VN(4) CD(1) DSTPORT(2, BE) DSTIP(4) USERID(*) NUL`.
//! Reply: `VN(0) CD DSTPORT(2) DSTIP(4)`, the last six bytes unused by clients.

use std::net::Ipv4Addr;

use crate::error::{Error, RejectReason, Result};

pub const SOCKS4_VERSION: u8 = 0x04;
pub const SOCKS4_CMD_CONNECT: u8 = 0x01;

/// First byte of every valid reply
pub const SOCKS4_REPLY_VERSION: u8 = 0x00;

pub const SOCKS4_REP_GRANTED: u8 = 0x5A;
pub const SOCKS4_REP_FAILED: u8 = 0x5B;
pub const SOCKS4_REP_NO_IDENTD: u8 = 0x5C;
pub const SOCKS4_REP_BAD_USER_ID: u8 = 0x5D;

/// Fixed part of a request, before the user id
pub const REQUEST_HEADER_LEN: usize = 8;
pub const REPLY_LEN: usize = 8;

/// Status byte of a SOCKS4 reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Granted,
    Rejected(RejectReason),
}

impl From<u8> for ReplyStatus {
    fn from(code: u8) -> Self {
        match code {
            SOCKS4_REP_GRANTED => ReplyStatus::Granted,
            SOCKS4_REP_FAILED => ReplyStatus::Rejected(RejectReason::RequestFailed),
            SOCKS4_REP_NO_IDENTD => ReplyStatus::Rejected(RejectReason::NoIdentd),
            SOCKS4_REP_BAD_USER_ID => ReplyStatus::Rejected(RejectReason::BadUserId),
            other => ReplyStatus::Rejected(RejectReason::Unknown(other)),
        }
    }
}

/// A SOCKS4 CONNECT request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Request {
    pub command: u8,
    pub port: u16,
    pub ip: Ipv4Addr,
    pub user_id: Vec<u8>,
}

impl Socks4Request {
    pub fn connect(ip: Ipv4Addr, port: u16, user_id: impl Into<Vec<u8>>) -> Self {
        Self {
            command: SOCKS4_CMD_CONNECT,
            port,
            ip,
            user_id: user_id.into(),
        }
    }

    /// Total encoded length: header, user id and terminator.
    pub fn encoded_len(&self) -> usize {
        REQUEST_HEADER_LEN + self.user_id.len() + 1
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(SOCKS4_VERSION);
        buf.push(self.command);
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf.extend_from_slice(&self.ip.octets());
        buf.extend_from_slice(&self.user_id);
        buf.push(0x00);
        buf
    }

    /// Parse a request, as a proxy would see it.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < REQUEST_HEADER_LEN + 1 {
            return Err(Error::Truncated { len: buf.len() });
        }
        if buf[0] != SOCKS4_VERSION {
            return Err(Error::Protocol { version: buf[0] });
        }

        let rest = &buf[REQUEST_HEADER_LEN..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(Error::Truncated { len: buf.len() })?;

        Ok(Self {
            command: buf[1],
            port: u16::from_be_bytes([buf[2], buf[3]]),
            ip: Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]),
            user_id: rest[..nul].to_vec(),
        })
    }
}

/// A SOCKS4 reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Socks4Reply {
    pub status: ReplyStatus,
    /// Bound port, unused by clients
    pub port: u16,
    /// Bound address, unused by clients
    pub ip: Ipv4Addr,
}

impl Socks4Reply {
    pub fn decode(buf: &[u8; REPLY_LEN]) -> Result<Self> {
        if buf[0] != SOCKS4_REPLY_VERSION {
            return Err(Error::Protocol { version: buf[0] });
        }
        Ok(Self {
            status: ReplyStatus::from(buf[1]),
            port: u16::from_be_bytes([buf[2], buf[3]]),
            ip: Ipv4Addr::new(buf[4], buf[5], buf[6], buf[7]),
        })
    }

    /// Turn the status into the handshake outcome.
    pub fn into_result(self) -> Result<()> {
        match self.status {
            ReplyStatus::Granted => Ok(()),
            ReplyStatus::Rejected(reason) => Err(Error::ProxyRejected(reason)),
        }
    }
}
