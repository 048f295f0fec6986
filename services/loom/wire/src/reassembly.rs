//! Frame reassembly from a fragmented byte stream.
//!
//! The reassembler is a two-phase state machine fed one byte at a time:
//!
//! - **Seeking**: bytes other than [`HEADER`] are discarded. This is how the
//!   stream resynchronizes after garbage.
//! - **Accumulating**: bytes are appended until the length declared in the third
//!   byte has been reached, then the candidate frame is emitted.
//!
//! Whatever happens to an emitted frame downstream, the reassembler is already
//! back in the seeking phase.

use crate::frame::{FRAME_OVERHEAD, HEADER, MAX_FRAME_SIZE};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

/// Offset of the declared payload length
const LENGTH_OFFSET: usize = 2;

/// Outcome of feeding one byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Nothing to report yet
    None,
    /// A complete candidate frame (not yet validated)
    Complete(Bytes),
    /// The buffer would have overflowed; partial frame discarded
    Overflow,
    /// Declared length exceeds capacity; partial frame discarded
    LengthTooLarge(usize),
}

/// Per-channel reassembly state: buffer, write index, and expected length.
///
/// One instance per input channel. Not shared.
#[derive(Debug)]
pub struct Reassembler {
    /// Accumulated bytes; its length is the write index
    buffer: BytesMut,
    /// Total frame length once the length byte has arrived
    expected_len: Option<usize>,
    /// Maximum total frame size
    capacity: usize,
}

impl Reassembler {
    /// Create a reassembler with the default 32-byte capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_FRAME_SIZE)
    }

    /// Create a reassembler with a custom capacity (never below the frame overhead)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(FRAME_OVERHEAD);
        Self {
            buffer: BytesMut::with_capacity(capacity),
            expected_len: None,
            capacity,
        }
    }

    /// Feed a single byte
    pub fn feed(&mut self, byte: u8) -> FrameEvent {
        if self.buffer.is_empty() {
            if byte == HEADER {
                self.buffer.put_u8(byte);
                self.expected_len = None;
            }
            return FrameEvent::None;
        }

        if self.buffer.len() >= self.capacity {
            warn!(
                "Packet buffer overflow at {} bytes, discarding",
                self.buffer.len()
            );
            self.reset();
            return FrameEvent::Overflow;
        }

        self.buffer.put_u8(byte);

        if self.buffer.len() == LENGTH_OFFSET + 1 {
            let expected = self.buffer[LENGTH_OFFSET] as usize + FRAME_OVERHEAD;
            if expected > self.capacity {
                warn!(
                    "Declared packet length {} exceeds buffer size {}, discarding",
                    expected, self.capacity
                );
                self.reset();
                return FrameEvent::LengthTooLarge(expected);
            }
            self.expected_len = Some(expected);
        }

        match self.expected_len {
            Some(expected) if self.buffer.len() == expected => {
                let frame = self.buffer.split().freeze();
                self.expected_len = None;
                debug!("Complete packet received with length {}", frame.len());
                FrameEvent::Complete(frame)
            }
            _ => FrameEvent::None,
        }
    }

    /// Feed a chunk and collect every event other than [`FrameEvent::None`], in order
    pub fn push(&mut self, data: &[u8]) -> Vec<FrameEvent> {
        data.iter()
            .map(|byte| self.feed(*byte))
            .filter(|event| *event != FrameEvent::None)
            .collect()
    }

    /// Discard any partial frame and go back to seeking
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.expected_len = None;
    }

    /// Number of bytes accumulated for the frame in flight
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True while seeking a header
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum total frame size
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, FOOTER};
    use crate::Command;
    use proptest::prelude::*;

    fn frame_bytes(command: u8, payload: &[u8]) -> Vec<u8> {
        Frame::new(Command::from(command), Bytes::copy_from_slice(payload))
            .encode(MAX_FRAME_SIZE)
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_single_complete_frame() {
        let mut reassembler = Reassembler::new();
        let bytes = frame_bytes(0x10, b"loom");

        let events = reassembler.push(&bytes);

        assert_eq!(events, vec![FrameEvent::Complete(Bytes::from(bytes))]);
        assert!(reassembler.is_empty());
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut reassembler = Reassembler::new();
        let bytes = frame_bytes(0x13, b"");

        for byte in &bytes[..bytes.len() - 1] {
            assert_eq!(reassembler.feed(*byte), FrameEvent::None);
        }
        assert_eq!(reassembler.len(), bytes.len() - 1);
        assert_eq!(
            reassembler.feed(bytes[bytes.len() - 1]),
            FrameEvent::Complete(Bytes::from(bytes))
        );
    }

    #[test]
    fn test_garbage_before_header_discarded() {
        let mut reassembler = Reassembler::new();
        let mut data = vec![0x00, 0x5A, 0xFF, 0x13];
        let bytes = frame_bytes(0x12, b"");
        data.extend_from_slice(&bytes);

        let events = reassembler.push(&data);

        assert_eq!(events, vec![FrameEvent::Complete(Bytes::from(bytes))]);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut reassembler = Reassembler::new();
        let first = frame_bytes(0x10, b"net");
        let second = frame_bytes(0x11, b"secret");

        let mut data = first.clone();
        data.extend_from_slice(&second);

        let events = reassembler.push(&data);
        assert_eq!(
            events,
            vec![
                FrameEvent::Complete(Bytes::from(first)),
                FrameEvent::Complete(Bytes::from(second)),
            ]
        );
    }

    #[test]
    fn test_length_too_large_resets() {
        let mut reassembler = Reassembler::new();

        // 28 + 5 = 33 > 32
        let events = reassembler.push(&[HEADER, 0x14, 28]);
        assert_eq!(events, vec![FrameEvent::LengthTooLarge(33)]);
        assert!(reassembler.is_empty());

        // the largest frame that fits still completes
        let payload = [0x01u8; MAX_FRAME_SIZE - FRAME_OVERHEAD];
        let bytes = frame_bytes(0x14, &payload);
        assert_eq!(
            reassembler.push(&bytes),
            vec![FrameEvent::Complete(Bytes::from(bytes))]
        );
    }

    #[test]
    fn test_capacity_clamped_to_overhead() {
        let mut reassembler = Reassembler::with_capacity(1);
        assert_eq!(reassembler.capacity(), FRAME_OVERHEAD);

        let events = reassembler.push(&[HEADER, 0x13, 0x00, 0x00, FOOTER]);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], FrameEvent::Complete(_)));

        let events = reassembler.push(&[HEADER, 0x13, 0x01]);
        assert_eq!(events, vec![FrameEvent::LengthTooLarge(6)]);
    }

    #[test]
    fn test_bad_footer_still_emitted() {
        let mut reassembler = Reassembler::new();
        let events = reassembler.push(&[HEADER, 0x13, 0x00, 0x00, 0x00]);

        // the footer is checked by the validator, not here
        assert_eq!(events.len(), 1);
        assert_eq!(
            Frame::decode(match &events[0] {
                FrameEvent::Complete(raw) => raw.clone(),
                other => panic!("unexpected event {:?}", other),
            }),
            Err(crate::WireError::Malformed)
        );
    }

    #[test]
    fn test_recovers_after_truncated_frame() {
        let mut reassembler = Reassembler::new();

        // a frame cut off after its length byte swallows the next bytes as payload;
        // once it completes, the frame after it is found again
        let mut data = vec![HEADER, 0x10, 0x02];
        let good = frame_bytes(0x15, b"");
        data.extend_from_slice(&good);
        data.extend_from_slice(&good);

        let events = reassembler.push(&data);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], FrameEvent::Complete(Bytes::from(good)));
    }

    proptest! {
        #[test]
        fn prop_fragmentation_does_not_change_events(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..16),
        ) {
            let mut whole = Reassembler::new();
            let expected = whole.push(&data);

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(data.len() + 1)).collect();
            points.sort_unstable();

            let mut fragmented = Reassembler::new();
            let mut events = Vec::new();
            let mut start = 0;
            for point in points.into_iter().chain(std::iter::once(data.len())) {
                events.extend(fragmented.push(&data[start..point]));
                start = point;
            }

            prop_assert_eq!(events, expected);
        }

        #[test]
        fn prop_garbage_then_frame_recovers(
            garbage in proptest::collection::vec(any::<u8>().prop_filter("not a header", |b| *b != HEADER), 0..64),
            payload in proptest::collection::vec(any::<u8>(), 0..=(MAX_FRAME_SIZE - FRAME_OVERHEAD)),
        ) {
            let bytes = frame_bytes(0x10, &payload);
            let mut data = garbage;
            data.extend_from_slice(&bytes);

            let mut reassembler = Reassembler::new();
            let events = reassembler.push(&data);

            prop_assert_eq!(events, vec![FrameEvent::Complete(Bytes::from(bytes))]);
        }
    }
}
