#![no_main]

use han_rs::{read_meter_message, try_read_framed};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Classification must be total over arbitrary payloads
    let _ = try_read_framed(data);
    let _ = read_meter_message("fuzz", data);

    // Hex rendition takes the decode retry path
    let hex_text: String = data.iter().map(|b| format!("{b:02x}")).collect();
    let _ = try_read_framed(hex_text.as_bytes());

    // Flag-wrapped variant exercises the synthetic flag handling
    if data.len() < 4096 {
        let mut wrapped = Vec::with_capacity(data.len() + 2);
        wrapped.push(0x7E);
        wrapped.extend_from_slice(data);
        wrapped.push(0x7E);
        let _ = try_read_framed(&wrapped);
    }
});
