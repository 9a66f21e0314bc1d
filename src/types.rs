use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default connect and handshake timeout, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// User id sent in SOCKS4 requests unless one is given
pub const DEFAULT_USER_ID: &str = "socks4-connect";

/// Longest user id accepted
pub const MAX_USER_ID_LEN: usize = 255;

/// Reject user ids that cannot be put on the wire unchanged.
///
/// The field is NUL-terminated, so an embedded NUL would truncate it.
pub fn validate_user_id(user_id: &[u8]) -> Result<()> {
    if user_id.contains(&0) {
        return Err(Error::Config(
            "user_id must not contain a NUL byte".to_string(),
        ));
    }
    if user_id.len() > MAX_USER_ID_LEN {
        return Err(Error::Config(format!(
            "user_id is {} bytes, at most {} allowed",
            user_id.len(),
            MAX_USER_ID_LEN
        )));
    }
    Ok(())
}

/// Address family filter applied to resolution results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressFamily {
    #[default]
    Any,
    V4Only,
    V6Only,
}

impl AddressFamily {
    /// Check if this filter admits the given address
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4Only => ip.is_ipv4(),
            AddressFamily::V6Only => ip.is_ipv6(),
        }
    }

    /// Keep only the endpoints this filter admits, preserving order
    pub fn filter(&self, addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
        addrs.into_iter().filter(|a| self.matches(&a.ip())).collect()
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Any => f.write_str("IPv4 or IPv6"),
            AddressFamily::V4Only => f.write_str("IPv4"),
            AddressFamily::V6Only => f.write_str("IPv6"),
        }
    }
}

/// Parameters of one timed connect attempt
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Hostname or IP literal
    pub host: String,
    pub port: u16,
    /// Deadline for the connect phase, in whole seconds
    pub timeout_secs: u64,
    pub family: AddressFamily,
    /// Optional deadline for resolution; unbounded when `None`
    pub resolve_timeout_secs: Option<u64>,
}

impl ConnectRequest {
    pub fn new(host: impl Into<String>, port: u16, timeout_secs: u64) -> Self {
        Self {
            host: host.into(),
            port,
            timeout_secs,
            family: AddressFamily::Any,
            resolve_timeout_secs: None,
        }
    }

    pub fn with_family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_resolve_timeout(mut self, secs: u64) -> Self {
        self.resolve_timeout_secs = Some(secs);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Option<Duration> {
        self.resolve_timeout_secs.map(Duration::from_secs)
    }
}

/// Parameters of one SOCKS4 handshake
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    /// Target the proxy should connect to; resolved locally to IPv4
    pub target_host: String,
    pub target_port: u16,
    /// Deadline for the request/reply exchange, in whole seconds
    pub timeout_secs: u64,
    pub user_id: Vec<u8>,
}

impl HandshakeRequest {
    pub fn new(target_host: impl Into<String>, target_port: u16, timeout_secs: u64) -> Self {
        Self {
            target_host: target_host.into(),
            target_port,
            timeout_secs,
            user_id: DEFAULT_USER_ID.as_bytes().to_vec(),
        }
    }

    /// Set the user id. It is checked with `validate_user_id` when the
    /// handshake starts.
    pub fn with_user_id(mut self, user_id: impl Into<Vec<u8>>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
