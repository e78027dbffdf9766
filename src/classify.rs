//! # Payload Classification
//!
//! Turns a raw payload into a typed meter message. HAN payloads arrive
//! with no out-of-band type information: the same serial port, TCP
//! bridge or MQTT topic may carry P1 text readouts, HDLC frames with or
//! without their flag sequences, hex renditions of either, or bare DLMS
//! data with no framing at all.
//!
//! ## Detection order
//!
//! 1. P1 data readout, attempted only when the payload starts with `/`
//! 2. HDLC frame, parsed by a fresh frame reader with synthetic flags so
//!    flag-stripped frames still complete
//! 3. One retry on the hex-decoded payload when it is an even-length hex
//!    string
//!
//! Classification itself never filters: [`try_read_framed`] returns a
//! message whether or not its checksums hold. The validity gate in
//! [`read_meter_message`] decides what is forwarded.

use crate::hdlc::{HdlcFrame, HdlcFrameReader, FLAG_SEQUENCE};
use crate::message::MeterMessage;
use crate::p1::DataReadout;
use crate::util::{hex_to_binary, is_hex_string, log_payload_hex};

/// Try to classify a payload as a framed meter message.
///
/// Returns `None` when the payload carries no recognizable framing. The
/// returned message may still be invalid; callers that only want
/// messages with good checksums go through [`read_meter_message`].
pub fn try_read_framed(payload: &[u8]) -> Option<MeterMessage> {
    let mut decoded: Option<Vec<u8>> = None;
    loop {
        let bytes = decoded.as_deref().unwrap_or(payload);
        if let Some(message) = detect_message(bytes) {
            return Some(message);
        }
        // At most one hex-decoding retry
        if decoded.is_some() || bytes.is_empty() || !is_hex_string(bytes) {
            return None;
        }
        match hex_to_binary(bytes) {
            Ok(binary) => decoded = Some(binary),
            Err(err) => {
                debug_assert!(false, "hex test passed but decoding failed: {err}");
                log::error!("Payload passed the hex test but failed to decode: {err}");
                return None;
            }
        }
    }
}

/// Classify a payload and apply the validity gate.
///
/// Framed messages are forwarded only when their checksums hold.
/// Unframed payloads are forwarded as raw DLMS data, hex-decoded first
/// when they are hex text; JSON objects are dropped, since bridges
/// publish status documents on the same topics as meter data. `source`
/// labels log lines and has no effect on the outcome.
pub fn read_meter_message(source: &str, payload: &[u8]) -> Option<MeterMessage> {
    if payload.is_empty() {
        log::debug!("Ignoring empty payload from {source}");
        return None;
    }
    match try_read_framed(payload) {
        Some(MeterMessage::P1(readout)) => {
            if readout.is_valid() {
                log_payload_hex(
                    &format!("Got valid P1 readout from {source}"),
                    readout.as_bytes(),
                );
                Some(MeterMessage::P1(readout))
            } else {
                log_payload_hex(
                    &format!("Got invalid P1 readout from {source}"),
                    readout.as_bytes(),
                );
                None
            }
        }
        Some(MeterMessage::Hdlc(frame)) => {
            if !frame.is_valid() {
                log_payload_hex(&format!("Got invalid frame from {source}"), frame.as_bytes());
                return None;
            }
            if frame.payload().map_or(true, |p| p.is_empty()) {
                log_payload_hex(
                    &format!("Got valid but empty frame from {source}"),
                    frame.as_bytes(),
                );
            } else {
                log_payload_hex(&format!("Got valid frame from {source}"), frame.as_bytes());
            }
            Some(MeterMessage::Hdlc(frame))
        }
        // Classification never yields raw messages, but the gate stays
        // total over the message type
        Some(message @ MeterMessage::RawDlms(_)) => Some(message),
        None => {
            if is_json_object(payload) {
                log::debug!("Ignoring JSON object payload from {source}");
                return None;
            }
            let bytes = if is_hex_string(payload) {
                match hex_to_binary(payload) {
                    Ok(binary) => binary,
                    Err(err) => {
                        debug_assert!(false, "hex test passed but decoding failed: {err}");
                        log::error!(
                            "Payload from {source} passed the hex test but failed to decode: {err}"
                        );
                        return None;
                    }
                }
            } else {
                payload.to_vec()
            };
            log_payload_hex(&format!("Got unframed payload from {source}"), &bytes);
            Some(MeterMessage::RawDlms(bytes))
        }
    }
}

/// One classification pass over a single rendition of the payload
fn detect_message(payload: &[u8]) -> Option<MeterMessage> {
    if payload.first() == Some(&b'/') {
        if let Ok(readout) = DataReadout::parse(payload) {
            return Some(MeterMessage::P1(readout));
        }
        // Starts like a readout but is not one structurally; it may
        // still be something else
    }
    detect_frame(payload).map(MeterMessage::Hdlc)
}

/// Run the payload through a fresh frame reader. Bridges routinely strip
/// the flag sequences, so a missing opening or closing flag is supplied
/// here. The first frame wins; trailing frames in the same payload are
/// discarded.
fn detect_frame(payload: &[u8]) -> Option<HdlcFrame> {
    let mut reader = HdlcFrameReader::new();
    let mut frames = Vec::new();
    if payload.first() != Some(&FLAG_SEQUENCE) {
        frames.extend(reader.read(&[FLAG_SEQUENCE]));
    }
    frames.extend(reader.read(payload));
    if frames.is_empty() {
        frames.extend(reader.read(&[FLAG_SEQUENCE]));
    }
    frames.into_iter().next()
}

/// Bridges publish JSON status documents on meter topics; those are not
/// meter data in any rendition.
fn is_json_object(payload: &[u8]) -> bool {
    matches!(
        serde_json::from_slice::<serde_json::Value>(payload),
        Ok(serde_json::Value::Object(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdlc::testdata::han_frame;
    use crate::p1::testdata::{build_readout, sample_readout};
    use crate::util::encode_hex;

    const SOURCE: &str = "test";

    fn flagged(body: &[u8]) -> Vec<u8> {
        let mut wire = vec![FLAG_SEQUENCE];
        wire.extend_from_slice(body);
        wire.push(FLAG_SEQUENCE);
        wire
    }

    #[test]
    fn test_classifies_flagged_frame() {
        let body = han_frame(Some(&[0xE6, 0xE7, 0x00, 0x0F]));
        let message = try_read_framed(&flagged(&body)).unwrap();
        match message {
            MeterMessage::Hdlc(ref frame) => {
                assert!(frame.is_valid());
                assert_eq!(frame.as_bytes(), &body[..]);
            }
            other => panic!("expected HDLC, got {other:?}"),
        }
    }

    #[test]
    fn test_classifies_frame_without_flags() {
        let body = han_frame(Some(&[0xE6, 0xE7, 0x00, 0x0F]));
        let message = try_read_framed(&body).unwrap();
        assert_eq!(message, MeterMessage::Hdlc(HdlcFrame::from_segment(body)));
    }

    #[test]
    fn test_classifies_frame_with_only_opening_flag() {
        let body = han_frame(Some(&[0x01, 0x02]));
        let mut payload = vec![FLAG_SEQUENCE];
        payload.extend_from_slice(&body);
        let message = try_read_framed(&payload).unwrap();
        assert!(message.is_valid());
    }

    #[test]
    fn test_classifies_hex_encoded_frame() {
        let body = han_frame(Some(&[0xE6, 0xE7, 0x00, 0x0F]));
        let raw = try_read_framed(&flagged(&body)).unwrap();

        let lower = encode_hex(&flagged(&body));
        assert_eq!(try_read_framed(lower.as_bytes()).unwrap(), raw);

        let upper = lower.to_uppercase();
        assert_eq!(try_read_framed(upper.as_bytes()).unwrap(), raw);
    }

    #[test]
    fn test_classifies_hex_encoded_frame_without_flags() {
        let body = han_frame(Some(&[0xAA, 0xBB]));
        let hex = encode_hex(&body);
        let message = try_read_framed(hex.as_bytes()).unwrap();
        assert!(message.is_valid());
        assert_eq!(message.as_bytes(), &body[..]);
    }

    #[test]
    fn test_classifies_p1_readout() {
        let readout = sample_readout();
        let message = try_read_framed(&readout).unwrap();
        match message {
            MeterMessage::P1(ref parsed) => assert!(parsed.is_valid()),
            other => panic!("expected P1, got {other:?}"),
        }
    }

    #[test]
    fn test_classifies_hex_encoded_p1_readout() {
        let readout = sample_readout();
        let hex = encode_hex(&readout);
        let message = try_read_framed(hex.as_bytes()).unwrap();
        assert!(matches!(message, MeterMessage::P1(_)));
        assert!(message.is_valid());
    }

    #[test]
    fn test_corrupted_p1_readout_is_classified_but_invalid() {
        let mut readout = sample_readout();
        let index = readout.iter().position(|&b| b == b'(').unwrap();
        readout[index] = b'[';
        let message = try_read_framed(&readout).unwrap();
        assert!(matches!(message, MeterMessage::P1(_)));
        assert!(!message.is_valid());
    }

    #[test]
    fn test_structurally_broken_readout_falls_through() {
        // Starts with '/' but never closes; neither P1 nor HDLC
        assert_eq!(try_read_framed(b"/KFM5KAIFA-METER"), None);
    }

    #[test]
    fn test_unframed_payload_is_not_classified() {
        assert_eq!(try_read_framed(&[0x0F, 0x00, 0x1C, 0x5A, 0x99]), None);
        assert_eq!(try_read_framed(b""), None);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let body = han_frame(Some(&[0x10, 0x20, 0x30]));
        let payload = flagged(&body);
        assert_eq!(try_read_framed(&payload), try_read_framed(&payload));
    }

    #[test]
    fn test_first_frame_wins() {
        let first = han_frame(Some(&[0x11; 4]));
        let second = han_frame(Some(&[0x22; 4]));
        let mut payload = flagged(&first);
        payload.extend_from_slice(&second);
        payload.push(FLAG_SEQUENCE);

        let message = try_read_framed(&payload).unwrap();
        match message {
            MeterMessage::Hdlc(ref frame) => assert_eq!(frame.payload(), Some(&[0x11; 4][..])),
            other => panic!("expected HDLC, got {other:?}"),
        }
    }

    #[test]
    fn test_gate_forwards_valid_frame() {
        let body = han_frame(Some(&[0xE6, 0xE7, 0x00]));
        let message = read_meter_message(SOURCE, &flagged(&body)).unwrap();
        assert!(message.is_valid());
        assert_eq!(message.message_type(), crate::message::MeterMessageType::Hdlc);
    }

    #[test]
    fn test_gate_forwards_valid_empty_frame() {
        let body = han_frame(None);
        let message = read_meter_message(SOURCE, &flagged(&body)).unwrap();
        assert!(message.is_valid());
        assert_eq!(message.payload(), None);
    }

    #[test]
    fn test_gate_drops_corrupted_frame() {
        let mut body = han_frame(Some(&[0xE6, 0xE7, 0x00]));
        let last = body.len() - 1;
        body[last] ^= 0x01;
        assert_eq!(read_meter_message(SOURCE, &flagged(&body)), None);
    }

    #[test]
    fn test_gate_drops_invalid_p1_readout() {
        let mut readout = sample_readout();
        let index = readout.iter().position(|&b| b == b'(').unwrap();
        readout[index] = b'[';
        assert_eq!(read_meter_message(SOURCE, &readout), None);
    }

    #[test]
    fn test_gate_forwards_valid_p1_readout() {
        let readout = build_readout("ISK5MT382-1000", &["1-0:1.8.0(002609.999*kWh)"]);
        let message = read_meter_message(SOURCE, &readout).unwrap();
        assert_eq!(message.as_bytes(), &readout[..]);
    }

    #[test]
    fn test_gate_drops_empty_payload() {
        assert_eq!(read_meter_message(SOURCE, b""), None);
    }

    #[test]
    fn test_gate_drops_json_object() {
        assert_eq!(
            read_meter_message(SOURCE, br#"{"status": "online", "rssi": -71}"#),
            None
        );
        // Leading whitespace still parses as an object
        assert_eq!(read_meter_message(SOURCE, b" {\"a\": 1} "), None);
    }

    #[test]
    fn test_gate_forwards_json_array_as_raw() {
        let message = read_meter_message(SOURCE, b"[1, 2]").unwrap();
        assert_eq!(message, MeterMessage::RawDlms(b"[1, 2]".to_vec()));
    }

    #[test]
    fn test_gate_forwards_short_unframed_payload_as_raw() {
        let payload = [0x9D, 0x31, 0x72, 0xC4, 0x08];
        let message = read_meter_message(SOURCE, &payload).unwrap();
        assert_eq!(message, MeterMessage::RawDlms(payload.to_vec()));
    }

    #[test]
    fn test_gate_forwards_long_unframed_payload_as_raw() {
        // Long enough to be a frame, but no frame structure anywhere
        let payload: Vec<u8> = (0u8..32).map(|i| i * 7 + 11).collect();
        assert!(!payload.contains(&FLAG_SEQUENCE));
        let message = read_meter_message(SOURCE, &payload).unwrap();
        assert_eq!(message, MeterMessage::RawDlms(payload));
    }

    #[test]
    fn test_gate_hex_decodes_unframed_payload() {
        let message = read_meter_message(SOURCE, b"0f001c5a99").unwrap();
        assert_eq!(
            message,
            MeterMessage::RawDlms(vec![0x0F, 0x00, 0x1C, 0x5A, 0x99])
        );
    }

    #[test]
    fn test_gate_keeps_odd_length_hex_text_as_bytes() {
        // Odd length fails the hex test, so the text goes through verbatim
        let message = read_meter_message(SOURCE, b"0f001").unwrap();
        assert_eq!(message, MeterMessage::RawDlms(b"0f001".to_vec()));
    }

    #[test]
    fn test_gate_forwards_broken_readout_as_raw() {
        let message = read_meter_message(SOURCE, b"/KFM5KAIFA-METER").unwrap();
        assert_eq!(message, MeterMessage::RawDlms(b"/KFM5KAIFA-METER".to_vec()));
    }
}
