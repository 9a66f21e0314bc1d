//! Caller-owned TCP socket handle.
//!
//! The connect and handshake operations borrow a `Socket` for their duration
//! and leave it open on success and closed on failure. Closing drops the
//! underlying stream, which is also how a pending operation is aborted.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

/// A TCP socket that may or may not be connected.
#[derive(Debug, Default)]
pub struct Socket {
    stream: Option<TcpStream>,
}

impl Socket {
    /// Create an unconnected socket.
    pub fn new() -> Self {
        Self { stream: None }
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    /// Connect to the first endpoint in `candidates` that accepts.
    ///
    /// Any existing connection is closed first. Candidates are tried in
    /// order; if all fail, the last error is returned.
    pub async fn connect(&mut self, candidates: &[SocketAddr]) -> io::Result<SocketAddr> {
        self.close();

        let mut last_err = None;
        for addr in candidates {
            match TcpStream::connect(*addr).await {
                Ok(stream) => {
                    self.stream = Some(stream);
                    return Ok(*addr);
                }
                Err(e) => {
                    debug!("connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "no endpoints to connect to")
        }))
    }

    /// Write the whole buffer.
    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream_mut()?.write_all(buf).await
    }

    /// Fill the whole buffer.
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.stream_mut()?.read_exact(buf).await.map(|_| ())
    }

    /// Close the socket. Closing a closed socket is a no-op.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!(
                "closing socket to {}",
                stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "<unconnected>".to_string())
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn remote_endpoint(&self) -> io::Result<SocketAddr> {
        self.stream_ref()?.peer_addr()
    }

    pub fn local_endpoint(&self) -> io::Result<SocketAddr> {
        self.stream_ref()?.local_addr()
    }

    /// Take the connected stream out, leaving this socket closed.
    pub fn into_stream(mut self) -> Option<TcpStream> {
        self.stream.take()
    }

    fn stream_ref(&self) -> io::Result<&TcpStream> {
        self.stream.as_ref().ok_or_else(not_connected)
    }

    fn stream_mut(&mut self) -> io::Result<&mut TcpStream> {
        self.stream.as_mut().ok_or_else(not_connected)
    }
}

impl From<TcpStream> for Socket {
    fn from(stream: TcpStream) -> Self {
        Self::from_stream(stream)
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "socket is closed")
}

impl AsyncRead for Socket {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_read(cx, buf),
            None => Poll::Ready(Err(not_connected())),
        }
    }
}

impl AsyncWrite for Socket {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_write(cx, buf),
            None => Poll::Ready(Err(not_connected())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_flush(cx),
            None => Poll::Ready(Err(not_connected())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stream.as_mut() {
            Some(stream) => Pin::new(stream).poll_shutdown(cx),
            None => Poll::Ready(Err(not_connected())),
        }
    }
}
