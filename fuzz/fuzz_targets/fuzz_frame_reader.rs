#![no_main]

use han_rs::connection::MeterStreamReader;
use han_rs::hdlc::{HdlcFrameReader, HdlcReaderConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Whole input in one chunk, both framing profiles
    let mut reader = HdlcFrameReader::new();
    let _ = reader.read(data);

    let mut stuffed = HdlcFrameReader::with_config(HdlcReaderConfig {
        octet_stuffing: true,
        abort_sequence: true,
    });
    let _ = stuffed.read(data);

    // Chunked delivery must agree with single-chunk delivery
    if !data.is_empty() {
        let chunk = usize::from(data[0] % 7) + 1;
        let mut chunked = HdlcFrameReader::new();
        let mut frames = Vec::new();
        for part in data.chunks(chunk) {
            frames.extend(chunked.read(part));
        }
        let mut whole = HdlcFrameReader::new();
        assert_eq!(frames, whole.read(data));
    }

    // The mixed frame/readout stream reader over the same bytes
    let mut stream_reader = MeterStreamReader::new();
    let _ = stream_reader.read(data);
});
