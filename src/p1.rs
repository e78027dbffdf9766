//! # P1 Data Readout
//!
//! Parser for the P1 (DSMR) plaintext data readout pushed by meters with a
//! P1 port. A readout is a single telegram:
//!
//! ```text
//! '/' identification CR LF
//! CR LF
//! data line *
//! '!' [4 hex CRC digits] CR LF
//! ```
//!
//! It leverages the `nom` crate for the structural parse. The CRC-16 (ARC
//! polynomial) covers every byte from the leading `'/'` through the `'!'`
//! inclusive. Structure and validity are separated the same way as for
//! HDLC frames: a readout with a wrong or absent CRC still parses, and the
//! message gate decides what to do with it. OBIS data lines are carried
//! verbatim; interpreting them is downstream work.

use nom::bytes::complete::{tag, take_until, take_while};
use nom::Err as NomErr;
use nom::IResult;
use once_cell::sync::Lazy;
use thiserror::Error;

/// Reflected CRC-16 polynomial 0x8005 (ARC), as used by DSMR P1
const ARC_KEY: u16 = 0xA001;

/// Precomputed CRC table
static ARC_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for b in 0..=0xFFu16 {
        let mut v = b;
        for _ in 0..8 {
            v = if (v & 1) == 1 { (v >> 1) ^ ARC_KEY } else { v >> 1 };
        }
        table[b as usize] = v;
    }
    table
});

/// Compute the CRC-16/ARC checksum over a byte slice (initial value 0)
pub fn crc16_arc(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc = (crc >> 8) ^ ARC_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }
    crc
}

/// Errors from the structural readout parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadoutError {
    #[error("Readout does not start with '/'")]
    MissingStart,

    #[error("Readout has no identification line")]
    MissingIdentification,

    #[error("Missing blank line after the identification")]
    MissingSeparator,

    #[error("Readout has no '!' terminator line")]
    MissingTerminator,

    #[error("Malformed CRC digits in the terminator line")]
    MalformedCrc,

    #[error("Trailing bytes after the terminator line")]
    TrailingBytes,
}

/// A parsed P1 data readout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataReadout {
    raw: Vec<u8>,
    identification: String,
    expected_crc: Option<u16>,
    calculated_crc: u16,
}

impl DataReadout {
    /// Parse a complete readout. The parse is structural: checksum
    /// mismatches do not fail it, they show up in `is_valid`.
    pub fn parse(bytes: &[u8]) -> Result<DataReadout, ReadoutError> {
        if bytes.first() != Some(&b'/') {
            return Err(ReadoutError::MissingStart);
        }
        let (rest, ident) =
            identification_line(bytes).map_err(|_| ReadoutError::MissingIdentification)?;
        let (rest, _) = crlf(rest).map_err(|_| ReadoutError::MissingSeparator)?;

        // Walk the data lines up to the terminator line
        let mut cursor = rest;
        while cursor.first() != Some(&b'!') {
            let (next, _) = data_line(cursor).map_err(|_| ReadoutError::MissingTerminator)?;
            cursor = next;
        }

        let bang_index = bytes.len() - cursor.len();
        let (after, expected_crc) =
            terminator_line(cursor).map_err(|_| ReadoutError::MalformedCrc)?;
        if !after.is_empty() {
            return Err(ReadoutError::TrailingBytes);
        }

        let calculated_crc = crc16_arc(&bytes[..=bang_index]);
        Ok(DataReadout {
            raw: bytes.to_vec(),
            identification: String::from_utf8_lossy(ident).into_owned(),
            expected_crc,
            calculated_crc,
        })
    }

    /// The whole readout as received. Downstream decoders consume the
    /// telegram verbatim, so this doubles as the message payload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Identification line content (after the `'/'`)
    pub fn identification(&self) -> &str {
        &self.identification
    }

    /// CRC declared in the terminator line, when present
    pub fn expected_crc(&self) -> Option<u16> {
        self.expected_crc
    }

    /// CRC computed over `'/'` through `'!'`
    pub fn calculated_crc(&self) -> u16 {
        self.calculated_crc
    }

    /// A readout is valid only when it declares a CRC and the CRC
    /// verifies. Meters that omit the CRC digits produce readouts nothing
    /// downstream can trust.
    pub fn is_valid(&self) -> bool {
        self.expected_crc == Some(self.calculated_crc)
    }
}

fn identification_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, _) = tag(b"/")(input)?;
    let (input, ident) = take_until("\r\n")(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, ident))
}

fn crlf(input: &[u8]) -> IResult<&[u8], &[u8]> {
    tag(b"\r\n")(input)
}

fn data_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (input, line) = take_until("\r\n")(input)?;
    let (input, _) = crlf(input)?;
    Ok((input, line))
}

fn terminator_line(input: &[u8]) -> IResult<&[u8], Option<u16>> {
    let (input, _) = tag(b"!")(input)?;
    let (input, digits) = take_while(|b: u8| b.is_ascii_hexdigit())(input)?;
    let (input, _) = crlf(input)?;

    let crc = match digits.len() {
        0 => None,
        4 => {
            let mut value = 0u16;
            for &d in digits {
                // take_while guarantees hex digits
                value = value << 4 | (d as char).to_digit(16).unwrap_or(0) as u16;
            }
            Some(value)
        }
        _ => {
            return Err(NomErr::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::LengthValue,
            )))
        }
    };
    Ok((input, crc))
}
