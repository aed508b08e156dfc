use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use desk_core::{Calibration, Opcode, Reconciler, TelemetryLayout, decode_telemetry, encode};

// Synthetic climb trace in tenths: 2 units per report with a little jitter.
fn climb_trace(n: usize, seed: u32) -> Vec<[u8; 6]> {
    let mut state = seed.max(1);
    let mut jitter = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x % 5) as i16 - 2
    };
    (0..n)
        .map(|i| {
            let h = 6200 + (i as i16) * 20 + jitter();
            let [hi, lo] = h.to_be_bytes();
            [0x98, 0x98, 0x00, 0x00, hi, lo]
        })
        .collect()
}

fn bench_reconciler(c: &mut Criterion) {
    let cal = Calibration::new(620.0, 1270.0).unwrap();
    let trace = climb_trace(320, 7);

    c.bench_function("telemetry_to_stop", |b| {
        b.iter_batched(
            || {
                let mut r = Reconciler::new(2, 100);
                r.on_position_report(0);
                r.set_target(90);
                r
            },
            |mut r| {
                for raw in &trace {
                    let reading = decode_telemetry(raw, TelemetryLayout::Offset4).unwrap();
                    let pct = cal.height_to_percentage(reading.height());
                    if r.on_position_report(pct) == Some(Opcode::Stop) {
                        break;
                    }
                    black_box(r.next_command());
                }
                r
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("encode_frame", |b| {
        b.iter(|| black_box(encode(black_box(Opcode::Raise))))
    });
}

criterion_group!(benches, bench_reconciler);
criterion_main!(benches);
