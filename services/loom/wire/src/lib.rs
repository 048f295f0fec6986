//! Packet framing, validation, reassembly, and response encoding for the loom controller.
//!
//! The mobile application talks to the controller with small self-describing frames
//! over a byte channel that may split or merge writes arbitrarily. This crate holds
//! the transport-agnostic half of the protocol engine: turning bytes into validated
//! commands and replies back into bytes.
//!
//! ## Wire Format
//!
//! ```text
//! +--------+---------+--------+-----------------+----------+--------+
//! | 0xA5   | command | len N  | payload (N)     | checksum | 0x5A   |
//! +--------+---------+--------+-----------------+----------+--------+
//!   1 byte   1 byte    1 byte   N bytes           1 byte     1 byte
//! ```
//!
//! The checksum is the low byte of the arithmetic sum of the payload bytes only.
//! Frame boundaries come from the length byte; the footer is an integrity check,
//! not a delimiter.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod error;
pub mod frame;
pub mod reassembly;
pub mod status;

// Re-export main types
pub use command::{Command, ResponseCode, TargetKind};
pub use error::WireError;
pub use frame::{
    checksum, encode_response, Frame, FOOTER, FRAME_OVERHEAD, HEADER, MAX_FRAME_SIZE,
    MAX_RESPONSE_FRAME_SIZE,
};
pub use reassembly::{FrameEvent, Reassembler};
pub use status::{FileStatus, TargetStatus, FILE_STATUS_LEN, NAME_FIELD_LEN};
