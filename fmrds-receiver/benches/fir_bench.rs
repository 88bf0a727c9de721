//! FIR Convolution Performance Benchmark
//!
//! Measures `dsp::Fir` throughput on both real and complex sample types at
//! the tap counts the FM receiver graph actually instantiates (baseband
//! channel-select and audio decimation), to verify the direct-form
//! convolution keeps up with the 1 MS/s input rate.
//!
//! **Goal:** real-time margin at the graph's heaviest FIR stage.
//! **Target:** >50x realtime at 1 MS/s input for the baseband filter.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fmrds_receiver::dsp::{design_lowpass, Fir};
use num_complex::Complex32;

const INPUT_SAMPLING_RATE: u32 = 1_000_000;
const CHUNK: usize = 4096;

fn bench_fir_real(c: &mut Criterion) {
    let mut group = c.benchmark_group("fir_real");

    for taps_count in [31usize, 127, 255] {
        let taps = design_lowpass(INPUT_SAMPLING_RATE, 100_000.0, taps_count);
        group.bench_with_input(BenchmarkId::from_parameter(taps_count), &taps, |b, taps| {
            let mut filter = Fir::<f32>::new(taps.clone(), 1);
            let input = vec![0.1f32; CHUNK];
            b.iter(|| {
                let out = filter.process(black_box(&input));
                black_box(out);
            });
        });
    }

    group.finish();
}

fn bench_fir_complex_decimating(c: &mut Criterion) {
    let mut group = c.benchmark_group("fir_complex_decimating");

    let taps = design_lowpass(INPUT_SAMPLING_RATE, 100_000.0, 127);
    group.bench_function("decimate_by_4", |b| {
        let mut filter = Fir::<Complex32>::new(taps.clone(), 4);
        let input = vec![Complex32::new(0.1, -0.1); CHUNK];
        b.iter(|| {
            let out = filter.process(black_box(&input));
            black_box(out);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_fir_real, bench_fir_complex_decimating);
criterion_main!(benches);
