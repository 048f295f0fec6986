//! Command handling and channel plumbing for the loom controller.
//!
//! This crate sits between the sockets and the wire codec: it owns the protocol
//! engine for the command channel, the dispatcher and its collaborators (credential
//! flow, network link, file transfer session), and the single-task runtime loop
//! that also feeds the bulk channel into the open pattern file.
//!
//! ## Features
//!
//! - **Protocol engine**: reassembly, validation, dispatch, and reply encoding per channel
//! - **Transports**: TCP stream or UDP datagram command channel, TCP bulk channel
//! - **File transfer**: one open pattern file at a time, last-known names per target
//! - **Network link**: station/access point join status driven by queued link events
//!
//! ## Example
//!
//! ```rust,no_run
//! use loom_session::{
//!     AccessPointLink, Dispatcher, ProtocolEngine, Runtime, RuntimeConfig, TransferSession,
//!     TransportKind,
//! };
//! use loom_storage::{open_store, StorageMode};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = open_store(StorageMode::InMemory)?;
//! let dispatcher = Dispatcher::new(TransferSession::new(store), Box::new(AccessPointLink));
//! let engine = ProtocolEngine::new(dispatcher);
//!
//! let config = RuntimeConfig {
//!     transport: TransportKind::Datagram,
//!     command_addr: "0.0.0.0:5000".parse()?,
//!     bulk_addr: Some("0.0.0.0:8080".parse()?),
//! };
//!
//! let runtime = Runtime::bind(config, engine).await?;
//! let stats = runtime.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! println!("{} replies sent", stats.engine.responses_sent);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod credentials;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod link;
pub mod runtime;
pub mod transfer;
pub mod transport;

// Re-export main types
pub use credentials::{CredentialFlow, Credentials};
pub use dispatcher::Dispatcher;
pub use engine::{EngineStats, ProtocolEngine, ResponseSink};
pub use error::SessionError;
pub use link::{join_status, AccessPointLink, DisabledLink, LinkEvent, NetworkLink, StationLink};
pub use runtime::{Runtime, RuntimeConfig, RuntimeStats, BULK_CHUNK_SIZE};
pub use transfer::{TransferSession, TransferSummary};
pub use transport::{CommandTransport, Incoming, StreamEndpoint, TransportKind};
