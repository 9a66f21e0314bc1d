//! SOCKS4 request/reply exchange over an already connected socket.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use log::{debug, warn};

use crate::error::{Error, Phase, Result};
use crate::resolver::{Resolver, SystemResolver};
use crate::socket::Socket;
use crate::timer::{race, DeadlineTimer, Race};
use crate::types::{validate_user_id, AddressFamily, HandshakeRequest};

use super::proto::{Socks4Reply, Socks4Request, REPLY_LEN};

/// Progress of a handshake. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Start,
    ResolvingTarget,
    WritingRequest,
    ReadingReply,
    Done,
}

/// One SOCKS4 handshake attempt.
///
/// Constructing the operation does nothing observable; `run` drives it to
/// completion and consumes it. The socket is left open only when the proxy
/// granted the request.
pub struct Socks4Handshake<'a, R = SystemResolver> {
    socket: &'a mut Socket,
    request: HandshakeRequest,
    resolver: R,
    timer: DeadlineTimer,
    state: HandshakeState,
    target: Option<Ipv4Addr>,
    request_buf: Vec<u8>,
    reply_buf: [u8; REPLY_LEN],
}

impl<'a> Socks4Handshake<'a, SystemResolver> {
    pub fn new(socket: &'a mut Socket, request: HandshakeRequest) -> Self {
        Self::with_resolver(socket, request, SystemResolver::new())
    }
}

impl<'a, R: Resolver> Socks4Handshake<'a, R> {
    pub fn with_resolver(socket: &'a mut Socket, request: HandshakeRequest, resolver: R) -> Self {
        Self {
            socket,
            request,
            resolver,
            timer: DeadlineTimer::new(),
            state: HandshakeState::Start,
            target: None,
            request_buf: Vec::new(),
            reply_buf: [0u8; REPLY_LEN],
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Run the handshake to completion.
    pub async fn run(mut self) -> Result<()> {
        let result = self.drive().await;
        if result.is_err() {
            self.socket.close();
        }
        self.timer.cancel();
        self.state = HandshakeState::Done;
        result
    }

    async fn drive(&mut self) -> Result<()> {
        loop {
            match self.state {
                HandshakeState::Start => self.start()?,
                HandshakeState::ResolvingTarget => self.resolve_target().await?,
                HandshakeState::WritingRequest => self.write_request().await?,
                HandshakeState::ReadingReply => self.read_reply().await?,
                HandshakeState::Done => return Ok(()),
            }
        }
    }

    fn advance(&mut self, next: HandshakeState) {
        debug!(
            "socks4 handshake for {}:{}: {:?} -> {:?}",
            self.request.target_host, self.request.target_port, self.state, next
        );
        self.state = next;
    }

    fn start(&mut self) -> Result<()> {
        if !self.socket.is_open() {
            return Err(Error::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "socket is not connected to a proxy",
            )));
        }
        validate_user_id(&self.request.user_id)?;
        self.advance(HandshakeState::ResolvingTarget);
        Ok(())
    }

    async fn resolve_target(&mut self) -> Result<()> {
        let host = &self.request.target_host;
        let addrs = self
            .resolver
            .resolve(host, self.request.target_port, AddressFamily::Any)
            .await?;

        let ip = first_ipv4(host, &addrs).ok_or_else(|| Error::HostNotFound(host.clone()))?;
        self.target = Some(ip);

        let request = Socks4Request::connect(
            ip,
            self.request.target_port,
            self.request.user_id.as_slice(),
        );
        self.request_buf = request.encode();
        self.timer.arm(self.request.timeout());
        self.advance(HandshakeState::WritingRequest);
        Ok(())
    }

    async fn write_request(&mut self) -> Result<()> {
        let outcome = race(self.socket.write_all(&self.request_buf), &mut self.timer).await;
        match outcome.settle(self.socket.is_open()) {
            Race::Completed(Ok(())) => {
                self.advance(HandshakeState::ReadingReply);
                Ok(())
            }
            Race::Completed(Err(e)) => Err(Error::Transport(e)),
            Race::Aborted => Err(self.timed_out()),
        }
    }

    async fn read_reply(&mut self) -> Result<()> {
        let outcome = race(self.socket.read_exact(&mut self.reply_buf), &mut self.timer).await;
        self.timer.cancel();

        match outcome.settle(self.socket.is_open()) {
            Race::Completed(Ok(())) => {}
            Race::Completed(Err(e)) => return Err(Error::Transport(e)),
            Race::Aborted => return Err(self.timed_out()),
        }

        let reply = Socks4Reply::decode(&self.reply_buf);
        self.request_buf = Vec::new();
        reply?.into_result()?;

        debug!(
            "socks4 proxy granted tunnel to {:?}:{}",
            self.target, self.request.target_port
        );
        self.advance(HandshakeState::Done);
        Ok(())
    }

    fn timed_out(&self) -> Error {
        Error::TimedOut {
            phase: Phase::Handshake,
            timeout: self.request.timeout(),
        }
    }
}

/// Pick the first IPv4 endpoint; SOCKS4 cannot carry anything else.
fn first_ipv4(host: &str, addrs: &[SocketAddr]) -> Option<Ipv4Addr> {
    let mut found = None;
    for addr in addrs {
        match addr.ip() {
            IpAddr::V4(v4) => {
                found = Some(v4);
                break;
            }
            IpAddr::V6(v6) => {
                warn!("skipping IPv6 address {} of {}: SOCKS4 is IPv4 only", v6, host);
            }
        }
    }
    found
}

/// Perform a SOCKS4 handshake for `target_host:target_port` on a socket
/// already connected to the proxy.
pub async fn socks4_handshake(
    socket: &mut Socket,
    target_host: &str,
    target_port: u16,
    timeout_secs: u64,
) -> Result<()> {
    let request = HandshakeRequest::new(target_host, target_port, timeout_secs);
    Socks4Handshake::new(socket, request).run().await
}
