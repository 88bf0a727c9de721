//! Circular Buffer Performance Benchmark
//!
//! Measures `pipeline::CircularBuffer` write/peek/advance throughput
//! against the 1 MS/s input rate this receiver's scheduler must sustain.
//!
//! **Goal:** buffer bookkeeping should be nearly free next to the DSP
//! work around it.
//! **Target:** >100x realtime at 1 MS/s (1e6 samples/s)

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fmrds_receiver::pipeline::CircularBuffer;

const CHUNK: usize = 1024;
// Large enough that a full iteration never has to stall waiting for the
// reader(s), which always advance by a full chunk immediately after.
const CAPACITY: usize = 1 << 16;

fn bench_single_reader_write_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_operations");

    group.bench_function("write_peek_advance_1024", |b| {
        let buf: CircularBuffer<f32> = CircularBuffer::new(CAPACITY);
        let reader = buf.add_reader(0, CHUNK, CHUNK);
        let chunk = vec![0.5f32; CHUNK];

        b.iter(|| {
            buf.write(black_box(&chunk));
            let data = buf.peek(reader, CHUNK);
            buf.advance(reader, data.len());
            black_box(&data);
        });
    });

    group.bench_function("write_peek_advance_1024_hist_64", |b| {
        let buf: CircularBuffer<f32> = CircularBuffer::new(CAPACITY);
        let reader = buf.add_reader(64, CHUNK, CHUNK);
        let chunk = vec![0.5f32; CHUNK];

        b.iter(|| {
            buf.write(black_box(&chunk));
            let window = buf.peek(reader, CHUNK + 64);
            buf.advance(reader, CHUNK);
            black_box(&window);
        });
    });

    group.finish();
}

fn bench_multi_reader_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_operations");

    group.bench_function("write_advance_4_readers", |b| {
        let buf: CircularBuffer<f32> = CircularBuffer::new(CAPACITY);
        let readers: Vec<usize> = (0..4).map(|_| buf.add_reader(0, CHUNK, CHUNK)).collect();
        let chunk = vec![0.5f32; CHUNK];

        b.iter(|| {
            buf.write(black_box(&chunk));
            for &r in &readers {
                let data = buf.peek(r, CHUNK);
                buf.advance(r, data.len());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_single_reader_write_advance, bench_multi_reader_fan_out);
criterion_main!(benches);
