//! Command and bulk channel transports.
//!
//! The command channel is either a TCP stream serving one client at a time or a
//! UDP socket replying to the most recent sender. The engine never sees which.
//! The bulk channel is always a single-client TCP stream.

use std::fmt;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info, warn};

/// Command channel flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// TCP, one client at a time
    Stream,
    /// UDP, replies go to the last sender
    Datagram,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stream => f.write_str("stream"),
            TransportKind::Datagram => f.write_str("datagram"),
        }
    }
}

/// What a receive produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    /// `n` bytes were read into the buffer
    Data(usize),
    /// A client attached
    Connected(SocketAddr),
    /// The client went away
    Disconnected(SocketAddr),
}

/// TCP listener holding at most one client
pub struct StreamEndpoint {
    listener: TcpListener,
    client: Option<(TcpStream, SocketAddr)>,
}

impl StreamEndpoint {
    /// Bind a listener
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            client: None,
        })
    }

    /// Bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Whether a client is attached
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Accept a client if none is attached, otherwise read from it.
    ///
    /// Cancel safe: nothing is lost if the future is dropped before completing.
    pub async fn next(&mut self, buf: &mut [u8]) -> std::io::Result<Incoming> {
        let (stream, peer) = match self.client.as_mut() {
            Some((stream, peer)) => (stream, *peer),
            None => return self.accept().await,
        };

        match stream.read(buf).await {
            Ok(0) => {
                self.client = None;
                Ok(Incoming::Disconnected(peer))
            }
            Ok(n) => Ok(Incoming::Data(n)),
            Err(e) => {
                warn!("Read from {} failed: {}", peer, e);
                self.client = None;
                Ok(Incoming::Disconnected(peer))
            }
        }
    }

    async fn accept(&mut self) -> std::io::Result<Incoming> {
        let (stream, peer) = self.listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("TCP_NODELAY not set for {}: {}", peer, e);
        }
        self.client = Some((stream, peer));
        Ok(Incoming::Connected(peer))
    }

    /// Write to the attached client; dropped if there is none
    pub async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self.client.as_mut() {
            Some((stream, _)) => stream.write_all(bytes).await,
            None => {
                debug!("No client attached, dropping {} bytes", bytes.len());
                Ok(())
            }
        }
    }
}

/// Runtime-selected command channel
pub enum CommandTransport {
    /// TCP stream
    Stream(StreamEndpoint),
    /// UDP socket
    Datagram {
        /// Bound socket
        socket: UdpSocket,
        /// Most recent sender
        peer: Option<SocketAddr>,
    },
}

impl CommandTransport {
    /// Bind the command channel
    pub async fn bind(kind: TransportKind, addr: SocketAddr) -> std::io::Result<Self> {
        let transport = match kind {
            TransportKind::Stream => CommandTransport::Stream(StreamEndpoint::bind(addr).await?),
            TransportKind::Datagram => CommandTransport::Datagram {
                socket: UdpSocket::bind(addr).await?,
                peer: None,
            },
        };
        info!(
            "Command channel ({}) listening on {}",
            kind,
            transport.local_addr()?
        );
        Ok(transport)
    }

    /// Flavor of this channel
    pub fn kind(&self) -> TransportKind {
        match self {
            CommandTransport::Stream(_) => TransportKind::Stream,
            CommandTransport::Datagram { .. } => TransportKind::Datagram,
        }
    }

    /// Bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match self {
            CommandTransport::Stream(endpoint) => endpoint.local_addr(),
            CommandTransport::Datagram { socket, .. } => socket.local_addr(),
        }
    }

    /// Receive the next chunk or client change. Cancel safe.
    ///
    /// A datagram from a new sender reports [`Incoming::Connected`] and its bytes
    /// are returned by the following call.
    pub async fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Incoming> {
        match self {
            CommandTransport::Stream(endpoint) => endpoint.next(buf).await,
            CommandTransport::Datagram { socket, peer } => {
                let (_, from) = socket.peek_from(buf).await?;
                if *peer != Some(from) {
                    *peer = Some(from);
                    return Ok(Incoming::Connected(from));
                }
                let (n, _) = socket.recv_from(buf).await?;
                Ok(Incoming::Data(n))
            }
        }
    }

    /// Send a reply to the current client
    pub async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match self {
            CommandTransport::Stream(endpoint) => endpoint.send(bytes).await,
            CommandTransport::Datagram { socket, peer } => match peer {
                Some(peer) => socket.send_to(bytes, *peer).await.map(|_| ()),
                None => {
                    debug!("No sender known, dropping {} bytes", bytes.len());
                    Ok(())
                }
            },
        }
    }
}
