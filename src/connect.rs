//! Resolve a host and connect to it within a deadline.

use std::net::SocketAddr;

use log::debug;

use crate::error::{Error, Phase, Result};
use crate::resolver::{Resolver, SystemResolver};
use crate::socket::Socket;
use crate::timer::{bounded, race, DeadlineTimer, Race};
use crate::types::{AddressFamily, ConnectRequest};

/// Progress of a timed connect. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    Start,
    Resolving,
    Connecting,
    Done,
}

/// One timed connect attempt.
///
/// The deadline covers the connect phase only, starting once resolution has
/// produced candidates (see `ConnectRequest::resolve_timeout_secs` for
/// bounding resolution). When the deadline passes, the socket is closed and
/// the attempt fails with `Error::TimedOut`.
pub struct TimedConnect<'a, R = SystemResolver> {
    socket: &'a mut Socket,
    request: ConnectRequest,
    resolver: R,
    timer: DeadlineTimer,
    state: ConnectState,
    candidates: Vec<SocketAddr>,
}

impl<'a> TimedConnect<'a, SystemResolver> {
    pub fn new(socket: &'a mut Socket, request: ConnectRequest) -> Self {
        Self::with_resolver(socket, request, SystemResolver::new())
    }
}

impl<'a, R: Resolver> TimedConnect<'a, R> {
    pub fn with_resolver(socket: &'a mut Socket, request: ConnectRequest, resolver: R) -> Self {
        Self {
            socket,
            request,
            resolver,
            timer: DeadlineTimer::new(),
            state: ConnectState::Start,
            candidates: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectState {
        self.state
    }

    /// Run the attempt to completion.
    ///
    /// On success the socket is connected to one of the resolved endpoints.
    /// On failure it is closed.
    pub async fn run(mut self) -> Result<()> {
        let result = self.drive().await;
        if result.is_err() {
            self.socket.close();
        }
        self.timer.cancel();
        self.state = ConnectState::Done;
        result
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            match self.state {
                ConnectState::Start => self.advance(ConnectState::Resolving),
                ConnectState::Resolving => self.resolve().await?,
                ConnectState::Connecting => self.connect().await?,
                ConnectState::Done => return Ok(()),
            }
        }
    }

    fn advance(&mut self, next: ConnectState) {
        debug!(
            "timed connect to {}:{}: {:?} -> {:?}",
            self.request.host, self.request.port, self.state, next
        );
        self.state = next;
    }

    async fn resolve(&mut self) -> Result<()> {
        let ConnectRequest {
            ref host,
            port,
            family,
            ..
        } = self.request;

        let lookup = self.resolver.resolve(host, port, family);
        let addrs = bounded(self.request.resolve_timeout(), lookup)
            .await
            .ok_or(Error::TimedOut {
                phase: Phase::Resolve,
                timeout: self.request.resolve_timeout().unwrap_or_default(),
            })??;

        let candidates = family.filter(addrs);
        if candidates.is_empty() {
            return Err(match family {
                AddressFamily::Any => Error::HostNotFound(host.clone()),
                _ => Error::NoMatchingAddressFamily {
                    host: host.clone(),
                    family,
                },
            });
        }

        debug!("{} resolved to {:?}", host, candidates);
        self.candidates = candidates;
        self.timer.arm(self.request.timeout());
        self.advance(ConnectState::Connecting);
        Ok(())
    }

    async fn connect(&mut self) -> Result<()> {
        let outcome = race(self.socket.connect(&self.candidates), &mut self.timer).await;

        match outcome {
            Race::Completed(Ok(addr)) => {
                self.timer.cancel();
                if !self.socket.is_open() {
                    return Err(self.timed_out());
                }
                debug!("connected to {}", addr);
                self.candidates = Vec::new();
                self.advance(ConnectState::Done);
                Ok(())
            }
            Race::Completed(Err(e)) => {
                self.timer.cancel();
                Err(Error::Transport(e))
            }
            Race::Aborted => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> Error {
        Error::TimedOut {
            phase: Phase::Connect,
            timeout: self.request.timeout(),
        }
    }
}

/// Resolve `host` and connect `socket` to it, failing with
/// `Error::TimedOut` if the connect phase takes longer than `timeout_secs`.
pub async fn timed_connect(
    socket: &mut Socket,
    host: &str,
    port: u16,
    timeout_secs: u64,
    family: AddressFamily,
) -> Result<()> {
    let request = ConnectRequest::new(host, port, timeout_secs).with_family(family);
    TimedConnect::new(socket, request).run().await
}
