//! # Meter Message Model
//!
//! The classification result for a received payload, plus the shared
//! output queue the sources push accepted messages onto. Exactly one
//! message kind comes out of a payload; validity travels on the message
//! so the gate can log and drop invalid ones uniformly.

use std::fmt;

use tokio::sync::mpsc;

use crate::hdlc::HdlcFrame;
use crate::p1::DataReadout;

/// The kind of meter message carried in a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterMessageType {
    /// HDLC-framed DLMS push message
    Hdlc,
    /// P1 plaintext data readout
    P1,
    /// Unframed DLMS payload forwarded as-is
    RawDlms,
}

impl fmt::Display for MeterMessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterMessageType::Hdlc => write!(f, "HDLC"),
            MeterMessageType::P1 => write!(f, "P1"),
            MeterMessageType::RawDlms => write!(f, "raw DLMS"),
        }
    }
}

/// A classified meter message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeterMessage {
    /// An HDLC frame, valid or not
    Hdlc(HdlcFrame),
    /// A P1 data readout, valid or not
    P1(DataReadout),
    /// An unframed payload, already hex-decoded when it arrived as hex
    /// text. Carries no checksum, so it is never gated on validity.
    RawDlms(Vec<u8>),
}

impl MeterMessage {
    pub fn message_type(&self) -> MeterMessageType {
        match self {
            MeterMessage::Hdlc(_) => MeterMessageType::Hdlc,
            MeterMessage::P1(_) => MeterMessageType::P1,
            MeterMessage::RawDlms(_) => MeterMessageType::RawDlms,
        }
    }

    /// Checksum verdict for framed kinds; raw payloads are always passed
    /// through.
    pub fn is_valid(&self) -> bool {
        match self {
            MeterMessage::Hdlc(frame) => frame.is_valid(),
            MeterMessage::P1(readout) => readout.is_valid(),
            MeterMessage::RawDlms(_) => true,
        }
    }

    /// The message bytes as received (frame body, full readout, or the
    /// raw payload)
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MeterMessage::Hdlc(frame) => frame.as_bytes(),
            MeterMessage::P1(readout) => readout.as_bytes(),
            MeterMessage::RawDlms(bytes) => bytes,
        }
    }

    /// What the downstream decoder should consume: the HDLC information
    /// field, the full P1 telegram, or the raw bytes. `None` only for an
    /// HDLC frame without an information field.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            MeterMessage::Hdlc(frame) => frame.payload(),
            MeterMessage::P1(readout) => Some(readout.as_bytes()),
            MeterMessage::RawDlms(bytes) => Some(bytes),
        }
    }
}

/// Sending side of the shared output queue
pub type MessageSender = mpsc::UnboundedSender<MeterMessage>;

/// Receiving side of the shared output queue
pub type MessageReceiver = mpsc::UnboundedReceiver<MeterMessage>;

/// Create the shared output queue. Sends never block; the channel closes
/// when every source handle is dropped, which is how consumers learn that
/// receiving has stopped.
pub fn message_channel() -> (MessageSender, MessageReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdlc::testdata::han_frame;
    use crate::p1::testdata::sample_readout;

    #[test]
    fn test_hdlc_message_surface() {
        let info = [0xE6, 0xE7, 0x00, 0x0F];
        let frame = HdlcFrame::from_segment(han_frame(Some(&info)));
        let msg = MeterMessage::Hdlc(frame);
        assert_eq!(msg.message_type(), MeterMessageType::Hdlc);
        assert!(msg.is_valid());
        assert_eq!(msg.payload(), Some(&info[..]));
    }

    #[test]
    fn test_hdlc_message_without_info() {
        let frame = HdlcFrame::from_segment(han_frame(None));
        let msg = MeterMessage::Hdlc(frame);
        assert!(msg.is_valid());
        assert_eq!(msg.payload(), None);
    }

    #[test]
    fn test_p1_message_surface() {
        let raw = sample_readout();
        let readout = DataReadout::parse(&raw).unwrap();
        let msg = MeterMessage::P1(readout);
        assert_eq!(msg.message_type(), MeterMessageType::P1);
        assert!(msg.is_valid());
        assert_eq!(msg.payload(), Some(&raw[..]));
        assert_eq!(msg.as_bytes(), &raw[..]);
    }

    #[test]
    fn test_raw_message_is_always_valid() {
        let msg = MeterMessage::RawDlms(vec![0x0F, 0x00, 0x01]);
        assert_eq!(msg.message_type(), MeterMessageType::RawDlms);
        assert!(msg.is_valid());
        assert_eq!(msg.payload(), Some(&[0x0F, 0x00, 0x01][..]));
    }

    #[test]
    fn test_message_type_display() {
        assert_eq!(MeterMessageType::Hdlc.to_string(), "HDLC");
        assert_eq!(MeterMessageType::P1.to_string(), "P1");
        assert_eq!(MeterMessageType::RawDlms.to_string(), "raw DLMS");
    }

    #[test]
    fn test_channel_closes_when_senders_drop() {
        let (tx, mut rx) = message_channel();
        tx.send(MeterMessage::RawDlms(vec![0x01])).unwrap();
        drop(tx);
        assert!(rx.try_recv().is_ok());
        // Channel closed: no sentinel message needed
        assert!(rx.try_recv().is_err());
    }
}
