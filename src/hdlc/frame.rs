//! # HDLC Frame Model
//!
//! Parsing and validation of DLMS HDLC frames (frame format type 3, as
//! pushed by smart meters on the HAN port). A frame body sits between two
//! `0x7E` flag sequences:
//!
//! ```text
//! format(2) | dest addr(1..4) | src addr(1..4) | control(1) | [HCS(2)] | [info(n)] | FCS(2)
//! ```
//!
//! `HdlcFrame::from_segment` never fails: structural problems and checksum
//! mismatches are recorded on the frame so the caller can observe, log and
//! gate invalid frames instead of plumbing errors through the read path.

use crate::hdlc::fcs::FcsCalc;

/// HDLC flag sequence delimiting frames on the wire
pub const FLAG_SEQUENCE: u8 = 0x7E;

/// Shortest possible frame body: format(2) + two one-octet addresses +
/// control(1) + FCS(2). Anything shorter between two flags is line noise.
pub const MIN_FRAME_LEN: usize = 7;

/// Variable-length HDLC address (1 to 4 octets, LSB of each octet is the
/// extension stop bit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcAddress {
    octets: Vec<u8>,
}

impl HdlcAddress {
    /// The raw address octets as they appear in the frame
    pub fn octets(&self) -> &[u8] {
        &self.octets
    }

    /// Logical address value (7 data bits per octet, stop bits removed)
    pub fn value(&self) -> u32 {
        self.octets
            .iter()
            .fold(0u32, |acc, &o| (acc << 7) | u32::from(o >> 1))
    }
}

/// The 16-bit frame format field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Segmentation bit: the information field continues in the next frame
    pub segmented: bool,
    /// Declared frame length, counting every byte between the flags
    pub length: u16,
}

impl FrameFormat {
    /// Parse the format word. Returns `None` unless the type nibble is
    /// `0b1010` (frame format type 3).
    pub fn parse(word: u16) -> Option<FrameFormat> {
        if word >> 12 != 0b1010 {
            return None;
        }
        Some(FrameFormat {
            segmented: word & 0x0800 != 0,
            length: word & 0x07FF,
        })
    }
}

/// Parsed frame header fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub format: FrameFormat,
    pub destination: HdlcAddress,
    pub source: HdlcAddress,
    pub control: u8,
}

/// A complete HDLC frame candidate (flags excluded)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    raw: Vec<u8>,
    header: Option<FrameHeader>,
    /// Byte range of the information field within `raw`
    info_range: Option<(usize, usize)>,
    fcs_ok: bool,
    hcs_ok: bool,
}

impl HdlcFrame {
    /// Parse and validate a candidate segment (the bytes between two flag
    /// sequences, flags excluded).
    pub fn from_segment(raw: Vec<u8>) -> HdlcFrame {
        let (header, info_range, hcs_ok) = match parse_structure(&raw) {
            Some(parsed) => parsed,
            None => {
                return HdlcFrame {
                    raw,
                    header: None,
                    info_range: None,
                    fcs_ok: false,
                    hcs_ok: false,
                }
            }
        };

        // Feeding body + received FCS leaves the register in the good state
        let mut calc = FcsCalc::new();
        calc.update_slice(&raw);
        let fcs_ok = calc.is_good();

        HdlcFrame {
            raw,
            header: Some(header),
            info_range,
            fcs_ok,
            hcs_ok,
        }
    }

    /// Frame body as received, flags excluded
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Parsed header, if the frame structure could be established
    pub fn header(&self) -> Option<&FrameHeader> {
        self.header.as_ref()
    }

    /// The information field, without HCS and FCS. `None` when the frame
    /// has no information field or its structure could not be established.
    pub fn payload(&self) -> Option<&[u8]> {
        self.info_range.map(|(start, end)| &self.raw[start..end])
    }

    /// Length declared in the frame format field
    pub fn expected_length(&self) -> Option<u16> {
        self.header.as_ref().map(|h| h.format.length)
    }

    /// Whether the declared length matches the received byte count
    pub fn is_expected_length(&self) -> bool {
        self.expected_length()
            .map(|len| usize::from(len) == self.raw.len())
            .unwrap_or(false)
    }

    /// True when the frame check sequence verifies over the whole body
    pub fn is_good_fcs(&self) -> bool {
        self.fcs_ok
    }

    /// True when the header check sequence verifies (trivially true for
    /// frames without an information field, which carry no HCS)
    pub fn is_good_hcs(&self) -> bool {
        self.hcs_ok
    }

    /// A frame is valid when its structure parsed, the declared length
    /// matches, and the checksums verify.
    pub fn is_valid(&self) -> bool {
        self.header.is_some() && self.is_expected_length() && self.fcs_ok && self.hcs_ok
    }
}

/// Establish the frame structure: header fields, info field position and
/// HCS verification. `None` means the bytes cannot be a frame.
fn parse_structure(raw: &[u8]) -> Option<(FrameHeader, Option<(usize, usize)>, bool)> {
    if raw.len() < MIN_FRAME_LEN {
        return None;
    }

    let word = u16::from(raw[0]) << 8 | u16::from(raw[1]);
    let format = FrameFormat::parse(word)?;

    let (destination, pos) = read_address(raw, 2)?;
    let (source, pos) = read_address(raw, pos)?;
    let control = *raw.get(pos)?;

    let header = FrameHeader {
        format,
        destination,
        source,
        control,
    };

    // Bytes after the control field: either FCS alone, or HCS + info + FCS
    let remaining = raw.len() - (pos + 1);
    match remaining {
        2 => Some((header, None, true)),
        r if r >= 5 => {
            let mut calc = FcsCalc::new();
            calc.update_slice(&raw[..pos + 3]);
            let hcs_ok = calc.is_good();
            let info_range = (pos + 3, raw.len() - 2);
            Some((header, Some(info_range), hcs_ok))
        }
        // 0 or 1: no room for the FCS; 3 or 4: HCS present but the info
        // field cannot fit. Either way this is not a frame.
        _ => None,
    }
}

/// Read a variable-length address starting at `pos`. The LSB of each octet
/// is the stop bit; addresses longer than 4 octets are malformed.
fn read_address(raw: &[u8], pos: usize) -> Option<(HdlcAddress, usize)> {
    let mut octets = Vec::new();
    let mut i = pos;
    loop {
        let octet = *raw.get(i)?;
        octets.push(octet);
        i += 1;
        if octet & 0x01 != 0 {
            return Some((HdlcAddress { octets }, i));
        }
        if octets.len() == 4 {
            return None;
        }
    }
}
