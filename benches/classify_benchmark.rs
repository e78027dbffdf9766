use criterion::{black_box, criterion_group, criterion_main, Criterion};
use han_rs::hdlc::{FcsCalc, HdlcFrameReader, FLAG_SEQUENCE};
use han_rs::p1::crc16_arc;
use han_rs::{read_meter_message, try_read_framed};

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

/// A push body around the size Kaifa meters send every 10 seconds.
fn push_info() -> Vec<u8> {
    let mut info = vec![0xE6, 0xE7, 0x00, 0x0F, 0x40, 0x00, 0x00, 0x00, 0x09, 0x0C];
    info.extend((0..64).map(|i| (i as u8).wrapping_mul(31)));
    info
}

fn benchmark_classify_frame(c: &mut Criterion) {
    let wire = flagged(&han_frame(&push_info()));
    c.bench_function("classify_flagged_frame", |b| {
        b.iter(|| black_box(try_read_framed(black_box(&wire))))
    });
}

fn benchmark_classify_hex_frame(c: &mut Criterion) {
    let hex_text = hex::encode(flagged(&han_frame(&push_info())));
    c.bench_function("classify_hex_frame", |b| {
        b.iter(|| black_box(try_read_framed(black_box(hex_text.as_bytes()))))
    });
}

fn benchmark_classify_readout(c: &mut Criterion) {
    let readout = build_readout(
        "KFM5KAIFA-METER",
        &[
            "1-3:0.2.8(42)",
            "0-0:1.0.0(161113205757W)",
            "1-0:1.8.1(001581.123*kWh)",
            "1-0:1.8.2(001435.706*kWh)",
            "1-0:21.7.0(01.111*kW)",
            "1-0:41.7.0(02.222*kW)",
        ],
    );
    c.bench_function("classify_p1_readout", |b| {
        b.iter(|| black_box(try_read_framed(black_box(&readout))))
    });
}

fn benchmark_gate_raw_payload(c: &mut Criterion) {
    let payload = push_info();
    c.bench_function("gate_raw_payload", |b| {
        b.iter(|| black_box(read_meter_message("bench", black_box(&payload))))
    });
}

fn benchmark_frame_reader(c: &mut Criterion) {
    // Ten frames back to back, the shape of a serial backlog after a
    // burst
    let mut stream = Vec::new();
    for _ in 0..10 {
        stream.extend_from_slice(&flagged(&han_frame(&push_info())));
    }
    c.bench_function("frame_reader_burst", |b| {
        b.iter(|| {
            let mut reader = HdlcFrameReader::new();
            black_box(reader.read(black_box(&stream)))
        })
    });
}

criterion_group!(
    benches,
    benchmark_classify_frame,
    benchmark_classify_hex_frame,
    benchmark_classify_readout,
    benchmark_gate_raw_payload,
    benchmark_frame_reader,
);
criterion_main!(benches);
