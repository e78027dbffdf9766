//! # HDLC Framing
//!
//! This module implements the HDLC side of the HAN receive path: FCS-16
//! checksums, the DLMS frame model and an incremental frame reader that
//! tolerates the byte streams real meters and MQTT bridges produce
//! (missing flags, shared flags, line noise, flags inside frame bodies).

pub mod fcs;
pub mod frame;
pub mod reader;

pub use fcs::{fcs16, FcsCalc};
pub use frame::{FrameFormat, FrameHeader, HdlcAddress, HdlcFrame, FLAG_SEQUENCE, MIN_FRAME_LEN};
pub use reader::{HdlcFrameReader, HdlcReaderConfig, ReaderStats};
