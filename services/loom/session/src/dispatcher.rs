//! Command dispatch.
//!
//! Each validated command runs to completion and yields at most one reply
//! payload. Commands without a handler get no reply unless explicit error codes
//! are enabled.

use crate::credentials::CredentialFlow;
use crate::link::{LinkEvent, NetworkLink};
use crate::transfer::TransferSession;
use bytes::Bytes;
use loom_wire::{Command, ResponseCode, TargetKind};
use tracing::{debug, info, warn};

/// Routes commands to the credential flow, network link, and transfer session
pub struct Dispatcher {
    credentials: CredentialFlow,
    transfer: TransferSession,
    link: Box<dyn NetworkLink>,
    explicit_errors: bool,
}

impl Dispatcher {
    /// Create a dispatcher with silent failures
    pub fn new(transfer: TransferSession, link: Box<dyn NetworkLink>) -> Self {
        Self {
            credentials: CredentialFlow::new(),
            transfer,
            link,
            explicit_errors: false,
        }
    }

    /// Reply with codes 0x03/0x04 to unknown commands and rejected transfers
    pub fn with_explicit_errors(mut self, explicit_errors: bool) -> Self {
        self.explicit_errors = explicit_errors;
        self
    }

    /// Run one command, returning the reply payload if there is one
    pub fn dispatch(&mut self, command: Command, payload: &[u8]) -> Option<Bytes> {
        debug!("Dispatching {} ({} payload bytes)", command, payload.len());

        match command {
            Command::ConnectWifi => {
                self.credentials.submit_ssid(Bytes::copy_from_slice(payload));
                info!(
                    "Network name received: {:?}",
                    String::from_utf8_lossy(payload)
                );
                Some(code(ResponseCode::Success))
            }
            Command::SendWifiPassword => {
                match self
                    .credentials
                    .with_password(Bytes::copy_from_slice(payload))
                {
                    Some(credentials) => self.link.initiate_join(&credentials),
                    None => warn!("Password received before a network name; not joining"),
                }
                Some(code(ResponseCode::Success))
            }
            Command::ConfirmWifiConnection => {
                Some(Bytes::copy_from_slice(&[self.link.join_status()]))
            }
            Command::GetFileStatus => Some(self.transfer.status().encode()),
            Command::StartFileTransfer => self.start_file_transfer(payload),
            Command::EndFileTransfer => {
                if self.transfer.finalize().is_none() {
                    debug!("End of transfer with no file open");
                }
                Some(code(ResponseCode::Success))
            }
            Command::SetPickValue | Command::SetRpm | Command::Unknown(_) => {
                warn!("No handler for {}", command);
                self.explicit(ResponseCode::UnknownCommand)
            }
        }
    }

    fn start_file_transfer(&mut self, payload: &[u8]) -> Option<Bytes> {
        let Some((&category, name)) = payload.split_first() else {
            warn!("Transfer rejected: empty request");
            return self.explicit(ResponseCode::TransferRejected);
        };

        let kind = match TargetKind::try_from(category) {
            Ok(kind) => Some(kind),
            Err(e) => {
                warn!("Receiving file for {}; it will not appear in the status report", e);
                None
            }
        };

        let name = file_name(name);
        match self.transfer.start(kind, &name) {
            Ok(()) => Some(code(ResponseCode::Success)),
            Err(e) => {
                warn!("Transfer of {:?} rejected: {}", name, e);
                self.explicit(ResponseCode::TransferRejected)
            }
        }
    }

    fn explicit(&self, response: ResponseCode) -> Option<Bytes> {
        self.explicit_errors.then(|| code(response))
    }

    /// Apply a queued link notification
    pub fn apply_link_event(&mut self, event: &LinkEvent) {
        self.link.apply(event);
    }

    /// Transfer session
    pub fn transfer(&self) -> &TransferSession {
        &self.transfer
    }

    /// Transfer session, for the bulk channel
    pub fn transfer_mut(&mut self) -> &mut TransferSession {
        &mut self.transfer
    }

    /// Network link
    pub fn link(&self) -> &dyn NetworkLink {
        self.link.as_ref()
    }
}

fn code(response: ResponseCode) -> Bytes {
    Bytes::copy_from_slice(&[response as u8])
}

/// File name carried after the category byte; trailing NULs are not part of it
fn file_name(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
