#![no_main]

use han_rs::p1::{crc16_arc, DataReadout};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The structural parse must never panic
    let _ = DataReadout::parse(data);

    // A readout built around the input always parses; validity depends
    // only on the declared CRC
    let mut telegram = Vec::with_capacity(data.len() + 32);
    telegram.push(b'/');
    telegram.extend_from_slice(b"FUZ5METER\r\n\r\n");
    for chunk in data.chunks(32) {
        // The leading byte keeps the line from reading as the
        // terminator; CR and LF inside it would change the structure
        telegram.push(b'D');
        telegram.extend(chunk.iter().filter(|&&b| b != b'\r' && b != b'\n'));
        telegram.extend_from_slice(b"\r\n");
    }
    telegram.push(b'!');
    let crc = crc16_arc(&telegram);
    telegram.extend_from_slice(format!("{crc:04X}\r\n").as_bytes());

    let readout = DataReadout::parse(&telegram).expect("constructed telegram parses");
    assert!(readout.is_valid());
});
