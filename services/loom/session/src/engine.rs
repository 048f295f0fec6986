//! Protocol engine: reassembly, validation, dispatch, and reply encoding for one
//! command channel.

use crate::dispatcher::Dispatcher;
use bytes::Bytes;
use loom_wire::{
    encode_response, Command, Frame, FrameEvent, Reassembler, ResponseCode, MAX_FRAME_SIZE,
    MAX_RESPONSE_FRAME_SIZE,
};
use tracing::{debug, error, warn};

/// Destination for encoded reply frames
pub trait ResponseSink {
    /// Queue one complete frame for the command channel
    fn send_bytes(&mut self, frame: Bytes);
}

impl ResponseSink for Vec<Bytes> {
    fn send_bytes(&mut self, frame: Bytes) {
        self.push(frame);
    }
}

/// Engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Bytes fed to the reassembler
    pub bytes_in: u64,
    /// Candidate frames emitted by the reassembler
    pub frames_completed: u64,
    /// Frames that passed validation
    pub frames_dispatched: u64,
    /// Malformed frames dropped without a reply
    pub frames_dropped: u64,
    /// Length mismatch replies sent
    pub length_mismatches: u64,
    /// Checksum failure replies sent
    pub checksum_failures: u64,
    /// Partial frames discarded on overflow or oversize declarations
    pub resyncs: u64,
    /// Reply frames handed to the sink
    pub responses_sent: u64,
}

/// Byte-in, frames-out pipeline for one command channel
pub struct ProtocolEngine {
    reassembler: Reassembler,
    dispatcher: Dispatcher,
    response_capacity: usize,
    stats: EngineStats,
}

impl ProtocolEngine {
    /// Create an engine with the default inbound and reply capacities
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_capacities(dispatcher, MAX_FRAME_SIZE, MAX_RESPONSE_FRAME_SIZE)
    }

    /// Create an engine with custom capacities
    pub fn with_capacities(
        dispatcher: Dispatcher,
        inbound_capacity: usize,
        response_capacity: usize,
    ) -> Self {
        Self {
            reassembler: Reassembler::with_capacity(inbound_capacity),
            dispatcher,
            response_capacity,
            stats: EngineStats::default(),
        }
    }

    /// Run received bytes through the pipeline, handing every reply to `sink`
    pub fn ingest(&mut self, data: &[u8], sink: &mut dyn ResponseSink) {
        self.stats.bytes_in += data.len() as u64;

        for event in self.reassembler.push(data) {
            match event {
                FrameEvent::Complete(raw) => {
                    self.stats.frames_completed += 1;
                    self.handle_frame(raw, sink);
                }
                FrameEvent::Overflow => {
                    self.stats.resyncs += 1;
                    warn!("Reassembly buffer overflow, partial frame discarded");
                }
                FrameEvent::LengthTooLarge(len) => {
                    self.stats.resyncs += 1;
                    warn!(
                        "Declared frame length {} exceeds capacity {}",
                        len,
                        self.reassembler.capacity()
                    );
                }
                FrameEvent::None => {}
            }
        }
    }

    fn handle_frame(&mut self, raw: Bytes, sink: &mut dyn ResponseSink) {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                match e.response() {
                    Some((command, code)) => {
                        warn!("Rejecting frame: {}", e);
                        if code == ResponseCode::LengthMismatch {
                            self.stats.length_mismatches += 1;
                        } else {
                            self.stats.checksum_failures += 1;
                        }
                        self.respond(Command::from(command), &[code as u8], sink);
                    }
                    None => {
                        self.stats.frames_dropped += 1;
                        warn!("Dropping frame: {}", e);
                    }
                }
                return;
            }
        };

        self.stats.frames_dispatched += 1;
        if let Some(payload) = self.dispatcher.dispatch(frame.command, &frame.payload) {
            self.respond(frame.command, &payload, sink);
        }
    }

    fn respond(&mut self, command: Command, payload: &[u8], sink: &mut dyn ResponseSink) {
        match encode_response(command, payload, self.response_capacity) {
            Ok(frame) => {
                debug!("Reply to {}: {} bytes", command, frame.len());
                self.stats.responses_sent += 1;
                sink.send_bytes(frame);
            }
            Err(e) => error!("Reply to {} not sent: {}", command, e),
        }
    }

    /// Drop any partial frame, as when the command client changes
    pub fn reset_channel(&mut self) {
        if !self.reassembler.is_empty() {
            debug!("Discarding {} buffered bytes", self.reassembler.len());
        }
        self.reassembler.reset();
    }

    /// Dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Dispatcher, for link events and bulk bytes
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Counters
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::AccessPointLink;
    use crate::transfer::TransferSession;
    use loom_storage::MemoryStore;

    fn engine(response_capacity: usize) -> ProtocolEngine {
        let dispatcher = Dispatcher::new(
            TransferSession::new(Box::new(MemoryStore::new())),
            Box::new(AccessPointLink),
        );
        ProtocolEngine::with_capacities(dispatcher, MAX_FRAME_SIZE, response_capacity)
    }

    #[test]
    fn test_fragmented_command() {
        let mut engine = engine(MAX_RESPONSE_FRAME_SIZE);
        let mut sink: Vec<Bytes> = Vec::new();

        engine.ingest(&[0xA5, 0x12], &mut sink);
        assert!(sink.is_empty());
        engine.ingest(&[0x00, 0x00], &mut sink);
        assert!(sink.is_empty());
        engine.ingest(&[0x5A], &mut sink);

        assert_eq!(sink, vec![Bytes::from_static(&[0xA5, 0x12, 0x01, 0xF0, 0xF0, 0x5A])]);
        assert_eq!(engine.stats().frames_dispatched, 1);
        assert_eq!(engine.stats().bytes_in, 5);
    }

    #[test]
    fn test_checksum_failure_reply() {
        let mut engine = engine(MAX_RESPONSE_FRAME_SIZE);
        let mut sink: Vec<Bytes> = Vec::new();

        // payload 61 5A sums to 0xBB, frame carries 0x5A
        engine.ingest(&[0xA5, 0x10, 0x02, 0x61, 0x5A, 0x5A, 0x5A], &mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(&sink[0][..], &[0xA5, 0x10, 0x01, 0x02, 0x02, 0x5A]);
        assert_eq!(engine.stats().checksum_failures, 1);
    }

    #[test]
    fn test_malformed_dropped() {
        let mut engine = engine(MAX_RESPONSE_FRAME_SIZE);
        let mut sink: Vec<Bytes> = Vec::new();

        engine.ingest(&[0xA5, 0x12, 0x00, 0x00, 0x00], &mut sink);
        assert!(sink.is_empty());
        assert_eq!(engine.stats().frames_dropped, 1);

        // next frame still works
        engine.ingest(&[0xA5, 0x12, 0x00, 0x00, 0x5A], &mut sink);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_merged_frames() {
        let mut engine = engine(MAX_RESPONSE_FRAME_SIZE);
        let mut sink: Vec<Bytes> = Vec::new();

        let mut data = vec![0x00, 0xFF];
        data.extend_from_slice(&[0xA5, 0x12, 0x00, 0x00, 0x5A]);
        data.extend_from_slice(&[0xA5, 0x15, 0x00, 0x00, 0x5A]);
        engine.ingest(&data, &mut sink);

        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1][1], 0x15);
    }

    #[test]
    fn test_oversize_declaration_resyncs() {
        let mut engine = engine(MAX_RESPONSE_FRAME_SIZE);
        let mut sink: Vec<Bytes> = Vec::new();

        engine.ingest(&[0xA5, 0x10, 0xF0], &mut sink);
        assert_eq!(engine.stats().resyncs, 1);

        engine.ingest(&[0xA5, 0x15, 0x00, 0x00, 0x5A], &mut sink);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_oversize_reply_not_sent() {
        let mut engine = engine(32);
        let mut sink: Vec<Bytes> = Vec::new();

        engine.ingest(&[0xA5, 0x13, 0x00, 0x00, 0x5A], &mut sink);
        assert!(sink.is_empty());
        assert_eq!(engine.stats().responses_sent, 0);
    }

    #[test]
    fn test_reset_channel_discards_partial() {
        let mut engine = engine(MAX_RESPONSE_FRAME_SIZE);
        let mut sink: Vec<Bytes> = Vec::new();

        engine.ingest(&[0xA5, 0x12], &mut sink);
        engine.reset_channel();
        engine.ingest(&[0x00, 0x00, 0x5A], &mut sink);
        assert!(sink.is_empty());
    }
}
