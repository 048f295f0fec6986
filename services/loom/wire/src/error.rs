//! Wire protocol error types.

use crate::command::ResponseCode;
use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Bad header, footer, or total length. The command byte cannot be trusted.
    #[error("malformed frame")]
    Malformed,

    /// Declared payload length disagrees with the bytes actually framed
    #[error("length mismatch for command {command:#04x}: declared {declared}, framed {actual}")]
    LengthMismatch {
        /// Command byte recovered from the frame
        command: u8,
        /// Length byte as sent
        declared: usize,
        /// Payload bytes between the length byte and the checksum
        actual: usize,
    },

    /// Payload checksum mismatch
    #[error("checksum mismatch for command {command:#04x}: received {received:#04x}, computed {computed:#04x}")]
    ChecksumFailed {
        /// Command byte recovered from the frame
        command: u8,
        /// Checksum byte as sent
        received: u8,
        /// Checksum computed over the payload
        computed: u8,
    },

    /// Size limit exceeded
    #[error("size limit exceeded: {0}")]
    Size(usize),

    /// Unknown file target category
    #[error("unknown target kind {0:#04x}")]
    Target(u8),

    /// Unknown response code
    #[error("unknown code {0:#04x}")]
    Code(u8),

    /// Field could not be decoded
    #[error("truncated field")]
    Truncated,
}

impl WireError {
    /// Error code to report back to the sender, if this error is answerable.
    ///
    /// Malformed frames have no trustworthy command byte and are never answered.
    pub fn response(&self) -> Option<(u8, ResponseCode)> {
        match *self {
            WireError::LengthMismatch { command, .. } => {
                Some((command, ResponseCode::LengthMismatch))
            }
            WireError::ChecksumFailed { command, .. } => {
                Some((command, ResponseCode::ChecksumFailed))
            }
            _ => None,
        }
    }
}
