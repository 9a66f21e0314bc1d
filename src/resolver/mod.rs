//! DNS resolver module.
//!
//! Provides the resolver interface used by the connect and handshake
//! operations, and a few implementations of it.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::AddressFamily;

/// DNS resolver interface.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `host:port` to candidate endpoints, in preference order.
    ///
    /// Only endpoints admitted by `family` are returned. An empty list means
    /// the lookup worked but nothing matched; a failed lookup is an error.
    async fn resolve(&self, host: &str, port: u16, family: AddressFamily)
        -> Result<Vec<SocketAddr>>;
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for &R {
    async fn resolve(
        &self,
        host: &str,
        port: u16,
        family: AddressFamily,
    ) -> Result<Vec<SocketAddr>> {
        (**self).resolve(host, port, family).await
    }
}

/// System DNS resolver using the OS resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl SystemResolver {
    /// Create a new system resolver.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(
        &self,
        host: &str,
        port: u16,
        family: AddressFamily,
    ) -> Result<Vec<SocketAddr>> {
        if let Some(addr) = parse_literal(host, port) {
            return Ok(family.filter([addr]));
        }

        let addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| Error::Resolve {
                host: host.to_string(),
                source: e,
            })?;

        Ok(dedup(family.filter(addrs)))
    }
}

/// Nil resolver that always returns no addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilResolver;

impl NilResolver {
    /// Create a new nil resolver.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resolver for NilResolver {
    async fn resolve(
        &self,
        _host: &str,
        _port: u16,
        _family: AddressFamily,
    ) -> Result<Vec<SocketAddr>> {
        Ok(Vec::new())
    }
}

/// Static resolver with predefined mappings.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    mappings: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    /// Create a new empty static resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping for a hostname. Addresses keep their order.
    pub fn add(&mut self, host: impl Into<String>, ips: impl IntoIterator<Item = IpAddr>) {
        self.mappings
            .entry(host.into().to_lowercase())
            .or_default()
            .extend(ips);
    }

    /// Add a mapping and return self for chaining.
    pub fn with_mapping(
        mut self,
        host: impl Into<String>,
        ips: impl IntoIterator<Item = IpAddr>,
    ) -> Self {
        self.add(host, ips);
        self
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(
        &self,
        host: &str,
        port: u16,
        family: AddressFamily,
    ) -> Result<Vec<SocketAddr>> {
        if let Some(addr) = parse_literal(host, port) {
            return Ok(family.filter([addr]));
        }

        let ips = self
            .mappings
            .get(&host.to_lowercase())
            .ok_or_else(|| Error::Resolve {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no mapping for host"),
            })?;

        Ok(family.filter(ips.iter().map(|ip| SocketAddr::new(*ip, port))))
    }
}

/// Treat IP literals (including bracketed IPv6) as already resolved.
fn parse_literal(host: &str, port: u16) -> Option<SocketAddr> {
    let trimmed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    trimmed
        .parse::<IpAddr>()
        .ok()
        .map(|ip| SocketAddr::new(ip, port))
}

/// getaddrinfo reports one entry per socket type; keep the first of each.
fn dedup(addrs: Vec<SocketAddr>) -> Vec<SocketAddr> {
    let mut out: Vec<SocketAddr> = Vec::with_capacity(addrs.len());
    for addr in addrs {
        if !out.contains(&addr) {
            out.push(addr);
        }
    }
    out
}
