//! Connect to a SOCKS4 proxy and open a tunnel through it.
//!
//! `Socks4Dialer` chains a timed connect to the proxy with the handshake for
//! the target and hands back the tunnel-ready socket.

use serde::{Deserialize, Serialize};

use crate::connect::TimedConnect;
use crate::error::Result;
use crate::resolver::{Resolver, SystemResolver};
use crate::socket::Socket;
use crate::socks4::Socks4Handshake;
use crate::types::{
    validate_user_id, AddressFamily, ConnectRequest, HandshakeRequest, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_ID,
};

/// Options for creating a `Socks4Dialer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialerOptions {
    /// Deadline for connecting to the proxy, in seconds
    pub connect_timeout_secs: u64,
    /// Deadline for the SOCKS4 exchange, in seconds
    pub handshake_timeout_secs: u64,
    /// Deadline for resolving the proxy host, unbounded when absent
    pub resolve_timeout_secs: Option<u64>,
    /// Address family used to reach the proxy
    pub family: AddressFamily,
    /// User id sent in the request
    pub user_id: String,
}

impl Default for DialerOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_TIMEOUT_SECS,
            handshake_timeout_secs: DEFAULT_TIMEOUT_SECS,
            resolve_timeout_secs: None,
            family: AddressFamily::Any,
            user_id: DEFAULT_USER_ID.to_string(),
        }
    }
}

impl DialerOptions {
    /// Reject options that cannot be put on the wire.
    pub fn validate(&self) -> Result<()> {
        validate_user_id(self.user_id.as_bytes())
    }
}

/// Dials targets through a SOCKS4 proxy.
#[derive(Debug, Clone)]
pub struct Socks4Dialer {
    proxy_host: String,
    proxy_port: u16,
    options: DialerOptions,
}

impl Socks4Dialer {
    /// Create a dialer with default options.
    pub fn new(proxy_host: impl Into<String>, proxy_port: u16) -> Self {
        Self {
            proxy_host: proxy_host.into(),
            proxy_port,
            options: DialerOptions::default(),
        }
    }

    /// Create a dialer with the given options.
    pub fn with_options(
        proxy_host: impl Into<String>,
        proxy_port: u16,
        options: DialerOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            proxy_host: proxy_host.into(),
            proxy_port,
            options,
        })
    }

    /// Set the user id sent to the proxy.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Result<Self> {
        self.options.user_id = user_id.into();
        self.options.validate()?;
        Ok(self)
    }

    pub fn options(&self) -> &DialerOptions {
        &self.options
    }

    pub fn proxy(&self) -> (&str, u16) {
        (&self.proxy_host, self.proxy_port)
    }

    /// Open a tunnel to `target_host:target_port`.
    pub async fn dial(&self, target_host: &str, target_port: u16) -> Result<Socket> {
        self.dial_with(&SystemResolver::new(), target_host, target_port)
            .await
    }

    /// Like `dial`, resolving both proxy and target with `resolver`.
    pub async fn dial_with<R: Resolver>(
        &self,
        resolver: &R,
        target_host: &str,
        target_port: u16,
    ) -> Result<Socket> {
        let mut socket = Socket::new();

        let mut connect = ConnectRequest::new(
            self.proxy_host.clone(),
            self.proxy_port,
            self.options.connect_timeout_secs,
        )
        .with_family(self.options.family);
        connect.resolve_timeout_secs = self.options.resolve_timeout_secs;
        TimedConnect::with_resolver(&mut socket, connect, resolver)
            .run()
            .await?;

        let handshake = HandshakeRequest::new(
            target_host,
            target_port,
            self.options.handshake_timeout_secs,
        )
        .with_user_id(self.options.user_id.as_bytes());
        Socks4Handshake::with_resolver(&mut socket, handshake, resolver)
            .run()
            .await?;

        Ok(socket)
    }
}
