//! CMA Equalizer Performance Benchmark
//!
//! Measures `dsp::CmaEqualizer` throughput at its 32-tap graph
//! configuration to verify the adaptive tap update doesn't dominate the
//! baseband stage's real-time budget.
//!
//! **Goal:** adaptation overhead stays small regardless of how far into
//! convergence the equalizer is (cold start adapts every sample; a
//! converged equalizer relaxes its update cadence considerably).
//! **Target:** >20x realtime at 250 kHz (the equalizer's input rate).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fmrds_receiver::dsp::CmaEqualizer;
use num_complex::Complex32;

const CHUNK: usize = 4096;

fn synthetic_if_signal(n: usize) -> Vec<Complex32> {
    (0..n)
        .map(|i| {
            let t = i as f32 / 250_000.0;
            let phase = 2.0 * std::f32::consts::PI * 1000.0 * t;
            Complex32::new(phase.cos(), phase.sin())
        })
        .collect()
}

fn bench_cma_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("cma_equalizer");

    group.bench_function("process_4096_cold_start", |b| {
        let input = synthetic_if_signal(CHUNK);
        b.iter(|| {
            let mut eq = CmaEqualizer::new(32);
            let out = eq.process(black_box(&input));
            black_box(out);
        });
    });

    group.bench_function("process_4096_after_convergence", |b| {
        let mut eq = CmaEqualizer::new(32);
        // Run it in well past its adaptive cadence settling down.
        let warmup = synthetic_if_signal(200_000);
        let _ = eq.process(&warmup);
        let input = synthetic_if_signal(CHUNK);
        b.iter(|| {
            let out = eq.process(black_box(&input));
            black_box(out);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_cma_steady_state);
criterion_main!(benches);
