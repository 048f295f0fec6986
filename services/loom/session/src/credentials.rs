//! Two-step network credential submission.
//!
//! The application sends the network name first and the password second. The
//! name is held until a password arrives; a later name replaces it.

use bytes::Bytes;
use std::fmt;

/// Network name and password for a station join
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Network name, exactly as received
    pub ssid: Bytes,
    /// Password, exactly as received
    pub password: Bytes,
}

impl Credentials {
    /// Network name for log output
    pub fn ssid_lossy(&self) -> String {
        String::from_utf8_lossy(&self.ssid).into_owned()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid_lossy())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Pending network name awaiting its password
#[derive(Debug, Default)]
pub struct CredentialFlow {
    pending_ssid: Option<Bytes>,
}

impl CredentialFlow {
    /// Create an empty flow
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a network name, replacing any earlier one
    pub fn submit_ssid(&mut self, ssid: Bytes) {
        self.pending_ssid = Some(ssid);
    }

    /// Most recently submitted network name
    pub fn pending_ssid(&self) -> Option<&Bytes> {
        self.pending_ssid.as_ref()
    }

    /// Pair a password with the pending name.
    ///
    /// The name is kept so the application can retry with another password.
    pub fn with_password(&self, password: Bytes) -> Option<Credentials> {
        self.pending_ssid.as_ref().map(|ssid| Credentials {
            ssid: ssid.clone(),
            password,
        })
    }
}
