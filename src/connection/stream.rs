//! # Stream Message Reader
//!
//! Turns the byte stream of a direct connection into gated meter
//! messages. A HAN port speaks one format, but which one is only
//! visible from the bytes: P1 meters send `/`-led text telegrams, DLMS
//! meters send HDLC frames. The reader detects per message, so a
//! misconfigured or swapped meter still produces data.
//!
//! Unlike the one-shot payload classifier, this reader is incremental:
//! chunks arrive at arbitrary boundaries and messages complete whenever
//! their terminator does. Invalid frames and readouts are counted and
//! logged here instead of being emitted.

use crate::hdlc::{HdlcFrame, HdlcFrameReader};
use crate::log_warn_throttled;
use crate::message::MeterMessage;
use crate::p1::DataReadout;
use crate::util::logging::{log_payload_hex, LogThrottle};

/// Upper bound on a buffered readout; a real telegram is around a
/// kilobyte
const MAX_READOUT_LEN: usize = 16 * 1024;

/// Statistics for stream reading operations
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamStats {
    pub messages_emitted: u64,
    pub invalid_frames: u64,
    pub invalid_readouts: u64,
    pub oversized_readouts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamMode {
    /// Bytes go to the frame reader; a `/` may open a readout
    Detecting,
    /// Accumulating a P1 readout up to its terminator line
    Readout,
}

/// Incremental, auto-detecting reader for direct meter streams
pub struct MeterStreamReader {
    mode: StreamMode,
    hdlc: HdlcFrameReader,
    readout: Vec<u8>,
    /// Start of the current readout line, for spotting the `!` line
    line_start: usize,
    stats: StreamStats,
    throttle: LogThrottle,
}

impl MeterStreamReader {
    pub fn new() -> Self {
        MeterStreamReader {
            mode: StreamMode::Detecting,
            hdlc: HdlcFrameReader::new(),
            readout: Vec::new(),
            line_start: 0,
            stats: StreamStats::default(),
            throttle: LogThrottle::new(5_000, 3), // 3 warnings per 5 s
        }
    }

    /// Feed a chunk of stream bytes, collecting any messages that
    /// complete
    pub fn read(&mut self, chunk: &[u8]) -> Vec<MeterMessage> {
        let mut messages = Vec::new();
        for &byte in chunk {
            self.accept_byte(byte, &mut messages);
        }
        messages
    }

    /// Drop partial state and return to detection. Statistics are kept.
    pub fn reset(&mut self) {
        self.mode = StreamMode::Detecting;
        self.hdlc.reset();
        self.readout.clear();
        self.line_start = 0;
    }

    /// Get current reading statistics
    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    fn accept_byte(&mut self, byte: u8, messages: &mut Vec<MeterMessage>) {
        match self.mode {
            StreamMode::Detecting => {
                // A `/` inside a frame body belongs to the frame; only
                // between frames can it open a readout
                if byte == b'/' && !self.hdlc.in_frame() {
                    self.mode = StreamMode::Readout;
                    self.readout.clear();
                    self.readout.push(byte);
                    self.line_start = 0;
                    return;
                }
                for frame in self.hdlc.read(&[byte]) {
                    self.take_frame(frame, messages);
                }
            }
            StreamMode::Readout => {
                self.readout.push(byte);
                if byte == b'\n' {
                    if self.readout[self.line_start..].first() == Some(&b'!') {
                        self.finish_readout(messages);
                        return;
                    }
                    self.line_start = self.readout.len();
                }
                if self.readout.len() > MAX_READOUT_LEN {
                    self.stats.oversized_readouts += 1;
                    log_warn_throttled!(
                        self.throttle,
                        "Readout exceeded {MAX_READOUT_LEN} bytes without a terminator, dropping it"
                    );
                    self.readout.clear();
                    self.line_start = 0;
                    self.mode = StreamMode::Detecting;
                }
            }
        }
    }

    /// The `!` line just completed; parse and gate the telegram
    fn finish_readout(&mut self, messages: &mut Vec<MeterMessage>) {
        let bytes = std::mem::take(&mut self.readout);
        self.line_start = 0;
        self.mode = StreamMode::Detecting;

        match DataReadout::parse(&bytes) {
            Ok(readout) if readout.is_valid() => {
                self.stats.messages_emitted += 1;
                log_payload_hex("Got valid P1 readout from stream", readout.as_bytes());
                messages.push(MeterMessage::P1(readout));
            }
            Ok(readout) => {
                self.stats.invalid_readouts += 1;
                log_payload_hex("Got invalid P1 readout from stream", readout.as_bytes());
            }
            Err(err) => {
                self.stats.invalid_readouts += 1;
                log_warn_throttled!(self.throttle, "Malformed P1 readout on stream: {err}");
            }
        }
    }

    fn take_frame(&mut self, frame: HdlcFrame, messages: &mut Vec<MeterMessage>) {
        if frame.is_valid() {
            self.stats.messages_emitted += 1;
            log_payload_hex("Got valid frame from stream", frame.as_bytes());
            messages.push(MeterMessage::Hdlc(frame));
        } else {
            self.stats.invalid_frames += 1;
            log_payload_hex("Got invalid frame from stream", frame.as_bytes());
        }
    }
}

impl Default for MeterStreamReader {
    fn default() -> Self {
        Self::new()
    }
}
