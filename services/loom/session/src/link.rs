//! Network link collaborator.
//!
//! The dispatcher hands credentials to a [`NetworkLink`] and later polls it for a
//! one-byte join status that is sent back to the application unchanged. Radio and
//! client notifications arrive as [`LinkEvent`]s drained by the runtime loop.

use crate::credentials::Credentials;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Join status bytes reported by confirm-wifi-connection
pub mod join_status {
    /// Joined / serving
    pub const CONNECTED: u8 = 0xF0;
    /// No join attempted
    pub const IDLE: u8 = 0xC8;
    /// Join in progress
    pub const JOINING: u8 = 0xC9;
    /// Network rejected the password
    pub const AUTH_FAILED: u8 = 0xCA;
    /// Network lost or not found
    pub const LOST: u8 = 0xCB;
}

/// Notifications queued for the runtime loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A command client attached
    ClientConnected {
        /// Client address
        peer: SocketAddr,
    },
    /// The command client went away
    ClientDisconnected,
    /// Station join completed
    Joined,
    /// Station join failed with the given status byte
    JoinFailed(u8),
    /// Joined network dropped
    Lost,
}

/// Network join collaborator
pub trait NetworkLink: Send {
    /// Start joining a network. Returns immediately.
    fn initiate_join(&mut self, credentials: &Credentials);

    /// Current join status byte
    fn join_status(&self) -> u8;

    /// Apply a queued notification
    fn apply(&mut self, event: &LinkEvent);
}

/// Boards without a network radio; joins are ignored and the link reports connected
#[derive(Debug, Default)]
pub struct DisabledLink;

impl NetworkLink for DisabledLink {
    fn initiate_join(&mut self, credentials: &Credentials) {
        warn!(
            "Ignoring join to {:?}: this board has no network radio",
            credentials.ssid_lossy()
        );
    }

    fn join_status(&self) -> u8 {
        join_status::CONNECTED
    }

    fn apply(&mut self, event: &LinkEvent) {
        debug!("Link event: {:?}", event);
    }
}

/// Controller hosting its own access point; always reports connected
#[derive(Debug, Default)]
pub struct AccessPointLink;

impl NetworkLink for AccessPointLink {
    fn initiate_join(&mut self, credentials: &Credentials) {
        debug!(
            "Access point mode, not joining {:?}",
            credentials.ssid_lossy()
        );
    }

    fn join_status(&self) -> u8 {
        join_status::CONNECTED
    }

    fn apply(&mut self, event: &LinkEvent) {
        debug!("Link event: {:?}", event);
    }
}

/// Controller joining an existing network as a station.
///
/// With a join delay configured, a pending join reports connected once the delay
/// has elapsed, standing in for radio association on hosts without one.
#[derive(Debug)]
pub struct StationLink {
    status: u8,
    join_delay: Option<Duration>,
    join_started: Option<Instant>,
}

impl StationLink {
    /// Create an idle station link
    pub fn new(join_delay: Option<Duration>) -> Self {
        Self {
            status: join_status::IDLE,
            join_delay,
            join_started: None,
        }
    }
}

impl Default for StationLink {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NetworkLink for StationLink {
    fn initiate_join(&mut self, credentials: &Credentials) {
        info!("Joining network {:?}", credentials.ssid_lossy());
        self.status = join_status::JOINING;
        self.join_started = Some(Instant::now());
    }

    fn join_status(&self) -> u8 {
        if self.status != join_status::JOINING {
            return self.status;
        }
        match (self.join_delay, self.join_started) {
            (Some(delay), Some(started)) if started.elapsed() >= delay => join_status::CONNECTED,
            _ => join_status::JOINING,
        }
    }

    fn apply(&mut self, event: &LinkEvent) {
        match event {
            LinkEvent::Joined => {
                info!("Network joined");
                self.status = join_status::CONNECTED;
                self.join_started = None;
            }
            LinkEvent::JoinFailed(code) => {
                warn!("Network join failed (status {:#04x})", code);
                self.status = *code;
                self.join_started = None;
            }
            LinkEvent::Lost => {
                warn!("Network lost");
                self.status = join_status::LOST;
                self.join_started = None;
            }
            LinkEvent::ClientConnected { .. } | LinkEvent::ClientDisconnected => {
                debug!("Link event: {:?}", event);
            }
        }
    }
}
