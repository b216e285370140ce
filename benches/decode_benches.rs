use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sunspec_modbus::{common_model, decode, parse_response, FieldLayout};

fn common_model_payload() -> Vec<u8> {
    let mut wire = vec![0x00, 0x01, 0x00, 0x42];
    let strings: [(&[u8], usize); 5] = [
        (b"SolarEdge", 32),
        (b"SE5000H", 32),
        (b"", 16),
        (b"0004.0018", 16),
        (b"7E123456", 32),
    ];
    for (text, size) in strings {
        let mut field = text.to_vec();
        field.resize(size, 0);
        wire.extend(field);
    }
    wire.extend([0x00, 0x01, 0x80, 0x00]);
    // register byte swap, as delivered by the frame codec
    wire.chunks_exact(2).flat_map(|pair| [pair[1], pair[0]]).collect()
}

fn response_frame(count: usize) -> Vec<u8> {
    let byte_count = count * 2;
    let mut frame = vec![0x00, 0x07, 0x00, 0x00];
    frame.extend(((byte_count + 3) as u16).to_be_bytes());
    frame.extend([0x01, 0x03, byte_count as u8]);
    frame.extend((0..byte_count).map(|i| i as u8));
    frame
}

fn bench_decode(c: &mut Criterion) {
    let layout = common_model();
    let payload = common_model_payload();
    c.bench_function("decode_common_model", |b| {
        b.iter(|| decode(black_box(&layout), black_box(&payload)))
    });

    let measurements = FieldLayout::from_entries([
        (0, "A", "uint16", 1),
        (1, "A_SF", "sunssf", 1),
        (2, "W", "int32", 2),
        (4, "WH", "acc64", 4),
        (8, "Hz", "float32", 2),
        (10, "Evt", "bitfield32", 2),
    ])
    .unwrap();
    let payload = vec![0x11u8; 24];
    c.bench_function("decode_numeric_fields", |b| {
        b.iter(|| decode(black_box(&measurements), black_box(&payload)))
    });
}

fn bench_frame(c: &mut Criterion) {
    let frame = response_frame(120);
    c.bench_function("parse_response_120_registers", |b| {
        b.iter(|| parse_response(black_box(&frame), 0x0007, 1))
    });
}

criterion_group!(benches, bench_decode, bench_frame);
criterion_main!(benches);
