//! # HDLC Frame Reader
//!
//! Incremental frame reader for the byte streams HAN ports actually
//! produce. Bytes arrive in arbitrary chunks from a serial port, a TCP
//! stream or an MQTT publish, and frames are delimited by `0x7E` flag
//! sequences that may be shared between adjacent frames, stripped by an
//! upstream bridge, or preceded by line noise.
//!
//! ## Key behaviors
//!
//! 1. **Flag hunting** - bytes before the first flag are counted and
//!    discarded
//! 2. **Declared-length lock** - once the frame format field is readable,
//!    the reader collects exactly the declared byte count, so `0x7E`
//!    bytes inside a frame body do not end the frame
//! 3. **Flag-terminated fallback** - segments whose first two bytes are
//!    not a frame format field are collected up to the next flag and
//!    discarded as unframed data; only byte sequences that declare a
//!    frame structure become frame candidates, so bare DLMS payloads are
//!    left for the unframed fallback instead of surfacing as broken
//!    frames
//! 4. **Runt discard** - segments too short to be a frame are dropped as
//!    line noise
//! 5. **Shared flags** - a closing flag doubles as the next opening flag
//! 6. **Optional octet stuffing** - `0x7D` control escapes and the abort
//!    sequence for asynchronous links; off by default, since HAN push
//!    lists use the synchronous profile
//!
//! Every emitted frame is a candidate: validity travels on the frame
//! (`HdlcFrame::is_valid`), it is not filtered here.

use crate::hdlc::frame::{FrameFormat, HdlcFrame, FLAG_SEQUENCE, MIN_FRAME_LEN};
use crate::log_warn_throttled;
use crate::util::logging::LogThrottle;

/// Control escape octet used by the asynchronous framing profile
pub const CONTROL_ESCAPE: u8 = 0x7D;

/// XOR mask applied to escaped octets
const ESCAPE_MASK: u8 = 0x20;

/// Upper bound on a buffered segment. The 11-bit frame length field tops
/// out at 2047 bytes, so anything longer cannot be a frame.
const MAX_SEGMENT_LEN: usize = 2048;

/// Reader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HdlcReaderConfig {
    /// Decode `0x7D` control escapes (asynchronous links)
    pub octet_stuffing: bool,
    /// Treat `0x7D 0x7E` as an abort sequence; only meaningful together
    /// with octet stuffing
    pub abort_sequence: bool,
}

/// Statistics for frame reading operations
#[derive(Debug, Default, Clone, Copy)]
pub struct ReaderStats {
    pub frames_emitted: u64,
    pub framing_errors: u64,
    pub runt_segments: u64,
    pub unframed_segments: u64,
    pub noise_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Discarding noise while waiting for a flag sequence
    Hunting,
    /// Between flags, accumulating a frame body
    Framing,
}

/// Incremental HDLC frame reader
#[derive(Debug)]
pub struct HdlcFrameReader {
    config: HdlcReaderConfig,
    state: ReaderState,
    buffer: Vec<u8>,
    /// Declared frame length, once locked from the format field
    expected_len: Option<usize>,
    /// Set when the first two bytes cannot be a frame format field; the
    /// segment is then collected up to the next flag and discarded
    flag_terminated: bool,
    escape_pending: bool,
    stats: ReaderStats,
    error_throttle: LogThrottle,
}

impl HdlcFrameReader {
    /// Create a reader with the default (synchronous) profile
    pub fn new() -> Self {
        Self::with_config(HdlcReaderConfig::default())
    }

    /// Create a reader with an explicit framing profile
    pub fn with_config(config: HdlcReaderConfig) -> Self {
        Self {
            config,
            state: ReaderState::Hunting,
            buffer: Vec::with_capacity(128),
            expected_len: None,
            flag_terminated: false,
            escape_pending: false,
            stats: ReaderStats::default(),
            error_throttle: LogThrottle::new(1000, 5), // 5 warnings per second
        }
    }

    /// Feed a chunk of bytes, collecting any frames that complete
    pub fn read(&mut self, chunk: &[u8]) -> Vec<HdlcFrame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if let Some(frame) = self.accept_byte(byte) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Drop any partial frame and return to flag hunting. Statistics are
    /// kept across resets.
    pub fn reset(&mut self) {
        self.state = ReaderState::Hunting;
        self.buffer.clear();
        self.expected_len = None;
        self.flag_terminated = false;
        self.escape_pending = false;
    }

    /// Get current reading statistics
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// True while bytes of a possible frame are buffered
    pub fn in_frame(&self) -> bool {
        self.state == ReaderState::Framing && !self.buffer.is_empty()
    }

    fn accept_byte(&mut self, byte: u8) -> Option<HdlcFrame> {
        match self.state {
            ReaderState::Hunting => {
                if byte == FLAG_SEQUENCE {
                    self.open_segment();
                } else {
                    self.stats.noise_bytes += 1;
                }
                None
            }
            ReaderState::Framing => {
                if self.config.octet_stuffing {
                    self.accept_stuffed_byte(byte)
                } else if let Some(expected) = self.expected_len {
                    self.accept_locked_byte(byte, expected)
                } else {
                    self.accept_unlocked_byte(byte)
                }
            }
        }
    }

    /// Start a fresh segment right after a flag
    fn open_segment(&mut self) {
        self.state = ReaderState::Framing;
        self.buffer.clear();
        self.expected_len = None;
        self.flag_terminated = false;
        self.escape_pending = false;
    }

    /// Length is locked: collect exactly `expected` bytes, then require a
    /// closing flag. Flag bytes inside the body count as data.
    fn accept_locked_byte(&mut self, byte: u8, expected: usize) -> Option<HdlcFrame> {
        if self.buffer.len() < expected {
            self.buffer.push(byte);
            return None;
        }
        if byte == FLAG_SEQUENCE {
            return self.emit_segment();
        }
        self.stats.framing_errors += 1;
        log_warn_throttled!(
            self.error_throttle,
            "Framing error: no flag after {expected} byte frame body, resynchronizing"
        );
        self.state = ReaderState::Hunting;
        None
    }

    /// Length not locked yet, or locking failed: flags terminate the
    /// segment.
    fn accept_unlocked_byte(&mut self, byte: u8) -> Option<HdlcFrame> {
        if byte == FLAG_SEQUENCE {
            return self.finalize_segment();
        }
        self.push_body_byte(byte);
        if self.buffer.len() == 2 {
            let word = u16::from(self.buffer[0]) << 8 | u16::from(self.buffer[1]);
            match FrameFormat::parse(word) {
                Some(format) if usize::from(format.length) >= MIN_FRAME_LEN => {
                    self.expected_len = Some(usize::from(format.length));
                }
                _ => self.flag_terminated = true,
            }
        }
        None
    }

    /// Asynchronous profile: decode control escapes, optionally honor the
    /// abort sequence. No length lock, flags cannot occur inside a body.
    fn accept_stuffed_byte(&mut self, byte: u8) -> Option<HdlcFrame> {
        if self.escape_pending {
            self.escape_pending = false;
            if byte == FLAG_SEQUENCE {
                if self.config.abort_sequence {
                    self.stats.framing_errors += 1;
                    log_warn_throttled!(
                        self.error_throttle,
                        "Abort sequence received, dropping frame in progress"
                    );
                    self.open_segment();
                    return None;
                }
                // Dangling escape before a closing flag: drop the escape
                return self.finalize_segment();
            }
            self.push_body_byte(byte ^ ESCAPE_MASK);
            return None;
        }
        match byte {
            CONTROL_ESCAPE => {
                self.escape_pending = true;
                None
            }
            FLAG_SEQUENCE => self.finalize_segment(),
            _ => {
                self.push_body_byte(byte);
                None
            }
        }
    }

    fn push_body_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
        if self.buffer.len() > MAX_SEGMENT_LEN {
            self.stats.framing_errors += 1;
            log_warn_throttled!(
                self.error_throttle,
                "Oversized segment with no closing flag, resynchronizing"
            );
            self.buffer.clear();
            self.state = ReaderState::Hunting;
        }
    }

    /// A closing flag arrived without a length lock. Segments that do not
    /// declare a frame structure are not frames and are discarded, which
    /// keeps bare DLMS payloads out of the frame stream.
    fn finalize_segment(&mut self) -> Option<HdlcFrame> {
        if self.buffer.is_empty() {
            // Adjacent flags: stay open on the new segment
            self.open_segment();
            return None;
        }
        if self.buffer.len() < MIN_FRAME_LEN {
            self.stats.runt_segments += 1;
            self.open_segment();
            return None;
        }
        let word = u16::from(self.buffer[0]) << 8 | u16::from(self.buffer[1]);
        let framed = matches!(
            FrameFormat::parse(word),
            Some(format) if usize::from(format.length) >= MIN_FRAME_LEN
        );
        if !framed {
            self.stats.unframed_segments += 1;
            self.open_segment();
            return None;
        }
        self.emit_segment()
    }

    /// Emit the buffered segment as a frame candidate; the closing flag
    /// opens the next segment.
    fn emit_segment(&mut self) -> Option<HdlcFrame> {
        let raw = std::mem::take(&mut self.buffer);
        self.stats.frames_emitted += 1;
        let frame = HdlcFrame::from_segment(raw);
        self.open_segment();
        Some(frame)
    }
}

impl Default for HdlcFrameReader {
    fn default() -> Self {
        Self::new()
    }
}
