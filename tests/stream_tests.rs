//! Integration tests for the stream reader that splits a raw HAN byte
//! stream into gated meter messages.

use han_rs::connection::{MeterStreamReader, StreamStats};
use han_rs::hdlc::{FcsCalc, FLAG_SEQUENCE};
use han_rs::p1::crc16_arc;
use han_rs::{MeterMessage, MeterMessageType};

fn han_frame(info: &[u8]) -> Vec<u8> {
    let mut body = vec![0, 0, 0x01, 0x02, 0x01, 0x10];
    let total = body.len() + 2 + info.len() + 2;
    let word = 0xA000u16 | (total as u16 & 0x07FF);
    body[0] = (word >> 8) as u8;
    body[1] = (word & 0xFF) as u8;

    let mut hcs = FcsCalc::new();
    hcs.update_slice(&body);
    body.extend_from_slice(&hcs.checksum_bytes());
    body.extend_from_slice(info);

    let mut fcs = FcsCalc::new();
    fcs.update_slice(&body);
    body.extend_from_slice(&fcs.checksum_bytes());
    body
}

fn flagged(body: &[u8]) -> Vec<u8> {
    let mut wire = vec![FLAG_SEQUENCE];
    wire.extend_from_slice(body);
    wire.push(FLAG_SEQUENCE);
    wire
}

fn build_readout(ident: &str, lines: &[&str]) -> Vec<u8> {
    let mut out = vec![b'/'];
    out.extend_from_slice(ident.as_bytes());
    out.extend_from_slice(b"\r\n\r\n");
    for line in lines {
        out.extend_from_slice(line.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.push(b'!');
    let crc = crc16_arc(&out);
    out.extend_from_slice(format!("{crc:04X}\r\n").as_bytes());
    out
}

/// Feed a byte stream in chunks of the given size and collect whatever
/// comes out.
fn read_chunked(reader: &mut MeterStreamReader, stream: &[u8], chunk: usize) -> Vec<MeterMessage> {
    let mut messages = Vec::new();
    for part in stream.chunks(chunk) {
        messages.extend(reader.read(part));
    }
    messages
}

/// Tests that an interleaved stream of frames and readouts splits into
/// the right message sequence.
#[test]
fn test_mixed_stream() {
    let frame = flagged(&han_frame(&[0xE6, 0xE7, 0x00, 0x0F]));
    let readout = build_readout("KFM5KAIFA-METER", &["1-3:0.2.8(42)"]);

    let mut stream = Vec::new();
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(&readout);
    stream.extend_from_slice(&frame);

    let mut reader = MeterStreamReader::new();
    let messages = reader.read(&stream);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].message_type(), MeterMessageType::Hdlc);
    assert_eq!(messages[1].message_type(), MeterMessageType::P1);
    assert_eq!(messages[2].message_type(), MeterMessageType::Hdlc);
    assert!(messages.iter().all(MeterMessage::is_valid));
    assert_eq!(reader.stats().messages_emitted, 3);
}

/// Tests that message boundaries survive single-byte delivery.
#[test]
fn test_byte_by_byte_delivery() {
    let frame = flagged(&han_frame(&[0x01, 0x02, 0x03]));
    let readout = build_readout("ISK5MT382-1000", &["1-0:1.8.0(002609.999*kWh)"]);

    let mut stream = Vec::new();
    stream.extend_from_slice(&frame);
    stream.extend_from_slice(&readout);

    let mut reader = MeterStreamReader::new();
    let messages = read_chunked(&mut reader, &stream, 1);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message_type(), MeterMessageType::Hdlc);
    assert_eq!(messages[1].message_type(), MeterMessageType::P1);
}

/// Tests the same stream across several chunk sizes; the output must not
/// depend on how the transport slices it.
#[test]
fn test_chunking_invariance() {
    let frame = flagged(&han_frame(&[0x10, 0x20, 0x30, 0x40]));
    let readout = build_readout("KFM5KAIFA-METER", &["0-0:1.0.0(161113205757W)"]);

    let mut stream = Vec::new();
    stream.extend_from_slice(&readout);
    stream.extend_from_slice(&frame);

    let mut reference_reader = MeterStreamReader::new();
    let reference = reference_reader.read(&stream);

    for chunk in [1, 2, 3, 7, 16, 64] {
        let mut reader = MeterStreamReader::new();
        let messages = read_chunked(&mut reader, &stream, chunk);
        assert_eq!(messages, reference, "chunk size {chunk}");
    }
}

/// Tests that an invalid frame is counted and withheld while the stream
/// keeps going.
#[test]
fn test_invalid_frame_is_gated() {
    let mut bad = han_frame(&[0xAA, 0xBB]);
    bad[8] ^= 0x01;
    let good = han_frame(&[0xCC, 0xDD]);

    let mut stream = flagged(&bad);
    stream.extend_from_slice(&good);
    stream.push(FLAG_SEQUENCE);

    let mut reader = MeterStreamReader::new();
    let messages = reader.read(&stream);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].payload(), Some(&[0xCC, 0xDD][..]));

    let stats: StreamStats = reader.stats();
    assert_eq!(stats.invalid_frames, 1);
    assert_eq!(stats.messages_emitted, 1);
}

/// Tests that an invalid readout is counted and withheld.
#[test]
fn test_invalid_readout_is_gated() {
    let mut readout = build_readout("KFM5KAIFA-METER", &["1-3:0.2.8(42)"]);
    let index = readout.iter().position(|&b| b == b'(').unwrap();
    readout[index] = b'[';

    let mut reader = MeterStreamReader::new();
    let messages = reader.read(&readout);
    assert!(messages.is_empty());
    assert_eq!(reader.stats().invalid_readouts, 1);
}

/// Tests that a slash inside a frame body does not open a readout.
#[test]
fn test_slash_inside_frame_body() {
    let info = [0x2F, 0x4B, 0x46, 0x4D]; // "/KFM"
    let frame = flagged(&han_frame(&info));

    let mut reader = MeterStreamReader::new();
    let messages = reader.read(&frame);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].message_type(), MeterMessageType::Hdlc);
    assert_eq!(messages[0].payload(), Some(&info[..]));
}

/// Tests that a readout directly after a closed frame is picked up.
#[test]
fn test_readout_follows_frame() {
    let frame = flagged(&han_frame(&[0x01]));
    let readout = build_readout("ISK5MT382-1000", &[]);

    let mut stream = frame;
    stream.extend_from_slice(&readout);

    let mut reader = MeterStreamReader::new();
    let messages = reader.read(&stream);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].message_type(), MeterMessageType::P1);
}

/// Tests that reset drops partial state and the reader recovers.
#[test]
fn test_reset_recovers() {
    let readout = build_readout("KFM5KAIFA-METER", &["1-3:0.2.8(42)"]);

    let mut reader = MeterStreamReader::new();
    reader.read(&readout[..10]);
    reader.reset();

    let messages = reader.read(&readout);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_valid());
}
