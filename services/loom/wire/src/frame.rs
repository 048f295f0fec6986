//! Frame validation and encoding.
//!
//! A frame on the wire is `0xA5 | command | N | payload(N) | checksum | 0x5A`.
//! The same layout is used for commands and replies.

use crate::command::{Command, ResponseCode};
use crate::WireError;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

/// First byte of every frame
pub const HEADER: u8 = 0xA5;
/// Last byte of every frame
pub const FOOTER: u8 = 0x5A;

/// Header, command, length, checksum, and footer bytes
pub const FRAME_OVERHEAD: usize = 5;

/// Inbound reassembly capacity (total frame size, overhead included)
pub const MAX_FRAME_SIZE: usize = 32;

/// Outbound capacity; the 48-byte file status reply does not fit the inbound buffer
pub const MAX_RESPONSE_FRAME_SIZE: usize = 64;

/// Offset of the payload within a frame
const PAYLOAD_OFFSET: usize = 3;

/// Low byte of the arithmetic sum of `data`
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

/// A validated frame: command plus payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command byte
    pub command: Command,
    /// Payload bytes (checksum and footer stripped)
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(command: Command, payload: Bytes) -> Self {
        Self { command, payload }
    }

    /// Create a one-byte status reply
    pub fn status(command: Command, code: ResponseCode) -> Self {
        Self::new(command, Bytes::copy_from_slice(&[code as u8]))
    }

    /// Total size when encoded
    pub fn encoded_size(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Validate a complete candidate frame.
    ///
    /// Checks run in order: structure (length, header, footer), declared length,
    /// then payload checksum. Only the first failure is reported.
    pub fn decode(raw: Bytes) -> Result<Self, WireError> {
        let len = raw.len();
        if len < FRAME_OVERHEAD || raw[0] != HEADER || raw[len - 1] != FOOTER {
            return Err(WireError::Malformed);
        }

        let command = raw[1];
        let declared = raw[2] as usize;
        let actual = len - FRAME_OVERHEAD;
        if declared != actual {
            return Err(WireError::LengthMismatch {
                command,
                declared,
                actual,
            });
        }

        let payload = raw.slice(PAYLOAD_OFFSET..PAYLOAD_OFFSET + declared);
        let received = raw[PAYLOAD_OFFSET + declared];
        let computed = checksum(&payload);
        if received != computed {
            return Err(WireError::ChecksumFailed {
                command,
                received,
                computed,
            });
        }

        debug!(
            "Frame validated: command={:#04x} payload_len={}",
            command, declared
        );

        Ok(Self {
            command: Command::from(command),
            payload,
        })
    }

    /// Encode frame to a contiguous buffer
    pub fn encode(&self, max_frame_size: usize) -> Result<Bytes, WireError> {
        let total_size = self.encoded_size();
        if total_size > max_frame_size || self.payload.len() > u8::MAX as usize {
            return Err(WireError::Size(total_size));
        }

        let mut buf = BytesMut::with_capacity(total_size);
        buf.put_u8(HEADER);
        buf.put_u8(self.command.into());
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
        buf.put_u8(checksum(&self.payload));
        buf.put_u8(FOOTER);

        Ok(buf.freeze())
    }
}

/// Encode a reply echoing `command` with the given payload
pub fn encode_response(
    command: Command,
    payload: &[u8],
    max_frame_size: usize,
) -> Result<Bytes, WireError> {
    Frame::new(command, Bytes::copy_from_slice(payload)).encode(max_frame_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0x00);
        assert_eq!(checksum(&[0x01, 0x02, 0x03]), 0x06);
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[0x80; 4]), 0x00);
    }

    #[test]
    fn test_decode_valid_frame() {
        let raw = Bytes::from_static(&[0xA5, 0x10, 0x03, b'a', b'b', b'c', 0x26, 0x5A]);
        let frame = Frame::decode(raw).unwrap();

        assert_eq!(frame.command, Command::ConnectWifi);
        assert_eq!(&frame.payload[..], b"abc");
    }

    #[test]
    fn test_decode_empty_payload() {
        let raw = Bytes::from_static(&[0xA5, 0x13, 0x00, 0x00, 0x5A]);
        let frame = Frame::decode(raw).unwrap();

        assert_eq!(frame.command, Command::GetFileStatus);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_decode_structural_errors() {
        // too short
        assert_eq!(
            Frame::decode(Bytes::from_static(&[0xA5, 0x13, 0x00, 0x5A])),
            Err(WireError::Malformed)
        );
        // bad header
        assert_eq!(
            Frame::decode(Bytes::from_static(&[0xA4, 0x13, 0x00, 0x00, 0x5A])),
            Err(WireError::Malformed)
        );
        // bad footer
        assert_eq!(
            Frame::decode(Bytes::from_static(&[0xA5, 0x13, 0x00, 0x00, 0x5B])),
            Err(WireError::Malformed)
        );
    }

    #[test]
    fn test_decode_length_mismatch() {
        // declares 3 payload bytes, carries 1
        let raw = Bytes::from_static(&[0xA5, 0x11, 0x03, 0x41, 0x41, 0x5A]);
        let err = Frame::decode(raw).unwrap_err();

        assert_eq!(
            err,
            WireError::LengthMismatch {
                command: 0x11,
                declared: 3,
                actual: 1
            }
        );
        assert_eq!(err.response(), Some((0x11, ResponseCode::LengthMismatch)));
    }

    #[test]
    fn test_decode_declared_length_beyond_buffer() {
        // declared length far larger than the frame must not index out of bounds
        let raw = Bytes::from_static(&[0xA5, 0x14, 0xFF, 0x00, 0x5A]);
        assert!(matches!(
            Frame::decode(raw),
            Err(WireError::LengthMismatch { command: 0x14, .. })
        ));
    }

    #[test]
    fn test_decode_checksum_failure() {
        let raw = Bytes::from_static(&[0xA5, 0x13, 0x00, 0x13, 0x5A]);
        let err = Frame::decode(raw).unwrap_err();

        assert_eq!(
            err,
            WireError::ChecksumFailed {
                command: 0x13,
                received: 0x13,
                computed: 0x00
            }
        );
        assert_eq!(err.response(), Some((0x13, ResponseCode::ChecksumFailed)));
        assert_eq!(WireError::Malformed.response(), None);
    }

    #[test]
    fn test_encode_status_reply() {
        let bytes = Frame::status(Command::StartFileTransfer, ResponseCode::Success)
            .encode(MAX_RESPONSE_FRAME_SIZE)
            .unwrap();
        assert_eq!(&bytes[..], &[0xA5, 0x14, 0x01, 0x00, 0x00, 0x5A]);

        let bytes = encode_response(
            Command::GetFileStatus,
            &[ResponseCode::ChecksumFailed as u8],
            MAX_FRAME_SIZE,
        )
        .unwrap();
        assert_eq!(&bytes[..], &[0xA5, 0x13, 0x01, 0x02, 0x02, 0x5A]);
    }

    #[test]
    fn test_encode_echoes_unknown_command() {
        let bytes = encode_response(Command::Unknown(0x42), &[0x03], MAX_FRAME_SIZE).unwrap();
        assert_eq!(bytes[1], 0x42);
    }

    #[test]
    fn test_encode_rejects_oversize() {
        let payload = vec![0u8; MAX_FRAME_SIZE - FRAME_OVERHEAD + 1];
        let result = encode_response(Command::GetFileStatus, &payload, MAX_FRAME_SIZE);
        assert_eq!(result, Err(WireError::Size(MAX_FRAME_SIZE + 1)));

        let payload = vec![0u8; 300];
        assert!(encode_response(Command::GetFileStatus, &payload, usize::MAX).is_err());
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(
            command in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..=(MAX_RESPONSE_FRAME_SIZE - FRAME_OVERHEAD)),
        ) {
            let frame = Frame::new(Command::from(command), Bytes::from(payload));
            let encoded = frame.encode(MAX_RESPONSE_FRAME_SIZE).unwrap();

            prop_assert_eq!(encoded.len(), frame.payload.len() + FRAME_OVERHEAD);
            prop_assert_eq!(Frame::decode(encoded).unwrap(), frame);
        }

        #[test]
        fn prop_checksum_ignores_order(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut reversed = payload.clone();
            reversed.reverse();
            prop_assert_eq!(checksum(&payload), checksum(&reversed));
        }

        #[test]
        fn prop_decode_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Frame::decode(Bytes::from(raw));
        }
    }
}
