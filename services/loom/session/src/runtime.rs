//! Cooperative runtime loop.
//!
//! One task owns the engine, both channels, and the link event queue. Each
//! iteration drains queued link events, then waits for the first of shutdown, a
//! new link event, command channel input, or bulk channel input. Command input
//! runs through the engine to completion and every reply is written before the
//! next iteration starts.

use crate::engine::{EngineStats, ProtocolEngine};
use crate::link::LinkEvent;
use crate::transport::{CommandTransport, Incoming, StreamEndpoint, TransportKind};
use crate::SessionError;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Bulk channel read size
pub const BULK_CHUNK_SIZE: usize = 512;

/// Command channel read size
const COMMAND_READ_SIZE: usize = 256;

/// Runtime configuration
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Command channel flavor
    pub transport: TransportKind,
    /// Command channel bind address
    pub command_addr: SocketAddr,
    /// Bulk channel bind address; `None` on boards without one
    pub bulk_addr: Option<SocketAddr>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Stream,
            command_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            bulk_addr: None,
        }
    }
}

/// Counters reported when the loop exits
#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    /// Engine counters
    pub engine: EngineStats,
    /// Bytes received on the bulk channel
    pub bulk_bytes_in: u64,
    /// Link events applied
    pub link_events: u64,
}

/// The controller's single task
pub struct Runtime {
    engine: ProtocolEngine,
    command: CommandTransport,
    bulk: Option<StreamEndpoint>,
    events_tx: mpsc::UnboundedSender<LinkEvent>,
    events_rx: mpsc::UnboundedReceiver<LinkEvent>,
    stats: RuntimeStats,
}

impl Runtime {
    /// Bind the configured channels
    pub async fn bind(config: RuntimeConfig, engine: ProtocolEngine) -> Result<Self, SessionError> {
        let command = CommandTransport::bind(config.transport, config.command_addr).await?;
        let bulk = match config.bulk_addr {
            Some(addr) => {
                let endpoint = StreamEndpoint::bind(addr).await?;
                info!("Bulk channel listening on {}", endpoint.local_addr()?);
                Some(endpoint)
            }
            None => None,
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            engine,
            command,
            bulk,
            events_tx,
            events_rx,
            stats: RuntimeStats::default(),
        })
    }

    /// Bound command channel address
    pub fn command_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.command.local_addr()?)
    }

    /// Bound bulk channel address
    pub fn bulk_addr(&self) -> Option<SocketAddr> {
        self.bulk
            .as_ref()
            .and_then(|endpoint| endpoint.local_addr().ok())
    }

    /// Sender for link notifications from outside the loop
    pub fn link_events(&self) -> mpsc::UnboundedSender<LinkEvent> {
        self.events_tx.clone()
    }

    /// Protocol engine
    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// Run until `shutdown` completes, then close any open transfer
    pub async fn run<F>(mut self, shutdown: F) -> Result<RuntimeStats, SessionError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut command_buf = vec![0u8; COMMAND_READ_SIZE];
        let mut bulk_buf = vec![0u8; BULK_CHUNK_SIZE];

        info!("Controller loop started ({} command channel)", self.command.kind());

        let result = loop {
            self.drain_link_events();

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }

                Some(event) = self.events_rx.recv() => {
                    self.apply_link_event(event);
                }

                incoming = self.command.recv(&mut command_buf) => {
                    match incoming {
                        Ok(incoming) => {
                            if let Err(e) = self.on_command(incoming, &command_buf).await {
                                error!("Command channel write failed: {}", e);
                            }
                        }
                        Err(e) => {
                            error!("Command channel failed: {}", e);
                            break Err(SessionError::Io(e));
                        }
                    }
                }

                incoming = next_bulk(self.bulk.as_mut(), &mut bulk_buf) => {
                    match incoming {
                        Ok(incoming) => self.on_bulk(incoming, &bulk_buf),
                        Err(e) => warn!("Bulk channel accept failed: {}", e),
                    }
                }
            }
        };

        if let Some(summary) = self.engine.dispatcher_mut().transfer_mut().finalize() {
            info!(
                "Closed {:?} on shutdown after {} bytes",
                summary.name, summary.bytes_written
            );
        }

        self.stats.engine = self.engine.stats().clone();
        info!("Controller loop stopped: {:?}", self.stats);
        result.map(|()| self.stats)
    }

    fn drain_link_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_link_event(event);
        }
    }

    fn apply_link_event(&mut self, event: LinkEvent) {
        self.stats.link_events += 1;
        self.engine.dispatcher_mut().apply_link_event(&event);
    }

    async fn on_command(&mut self, incoming: Incoming, buf: &[u8]) -> std::io::Result<()> {
        match incoming {
            Incoming::Data(n) => {
                let mut replies: Vec<Bytes> = Vec::new();
                self.engine.ingest(&buf[..n], &mut replies);
                for reply in replies {
                    self.command.send(&reply).await?;
                }
            }
            Incoming::Connected(peer) => {
                info!("Command client {} connected", peer);
                self.engine.reset_channel();
                self.queue(LinkEvent::ClientConnected { peer });
            }
            Incoming::Disconnected(peer) => {
                info!("Command client {} disconnected", peer);
                self.engine.reset_channel();
                self.queue(LinkEvent::ClientDisconnected);
            }
        }
        Ok(())
    }

    fn on_bulk(&mut self, incoming: Incoming, buf: &[u8]) {
        match incoming {
            Incoming::Data(n) => {
                self.stats.bulk_bytes_in += n as u64;
                if let Err(e) = self
                    .engine
                    .dispatcher_mut()
                    .transfer_mut()
                    .write_chunk(&buf[..n])
                {
                    error!("Bulk write failed: {}", e);
                }
            }
            Incoming::Connected(peer) => info!("Bulk client {} connected", peer),
            Incoming::Disconnected(peer) => debug!("Bulk client {} disconnected", peer),
        }
    }

    fn queue(&self, event: LinkEvent) {
        // receiver is owned by self
        let _ = self.events_tx.send(event);
    }
}

async fn next_bulk(
    endpoint: Option<&mut StreamEndpoint>,
    buf: &mut [u8],
) -> std::io::Result<Incoming> {
    match endpoint {
        Some(endpoint) => endpoint.next(buf).await,
        None => std::future::pending().await,
    }
}
