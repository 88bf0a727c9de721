//! Overlap-save block convolution via FFT, for the tap counts where a
//! direct [`super::fir::Fir`] convolution loop starts costing more than
//! a transform pair.
//!
//! Ported from `hvylya::filters::FftFilter`: the filter's impulse
//! response is zero-padded to a power-of-two block size and transformed
//! once at construction; each call transforms a block of fresh input
//! (prefixed with the tail of the previous block), multiplies by the tap
//! spectrum, inverse-transforms, and keeps only the back
//! `block_size - (taps_count - 1)` samples -- the front samples are
//! corrupted by the circular wraparound overlap-save discards. The
//! reference additionally supports writing the decimated output back
//! into the unused front of the same buffer to avoid a second
//! allocation; that's a memory-reuse optimization, not a behavioral
//! difference, and is skipped here.

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

fn next_pow2(n: usize) -> usize {
    let mut p = 1usize;
    while p < n {
        p <<= 1;
    }
    p
}

/// Block-convolution engine shared by the real-tap and complex-tap (i.e.
/// translating) filter wrappers below. Always operates on `Complex32`
/// internally since `rustfft` only transforms complex sequences.
struct OverlapSave {
    block_size: usize,
    shift: usize,
    decimation: usize,
    fft_fwd: Arc<dyn Fft<f32>>,
    fft_inv: Arc<dyn Fft<f32>>,
    tap_spectrum: Vec<Complex32>,
    /// Tail of the previous block's input, length `shift`.
    history: Vec<Complex32>,
    /// Samples buffered but not yet enough to fill a block.
    pending: Vec<Complex32>,
}

impl OverlapSave {
    fn new(taps: &[Complex32], decimation: usize) -> Self {
        assert!(!taps.is_empty());
        assert!(decimation > 0);
        let shift = taps.len() - 1;
        // At least 4x the overlap so overlap-save isn't dominated by
        // transform overhead on every block.
        let block_size = next_pow2((shift + 1).max(64) * 4);

        let mut planner = FftPlanner::new();
        let fft_fwd = planner.plan_fft_forward(block_size);
        let fft_inv = planner.plan_fft_inverse(block_size);

        let mut tap_spectrum = vec![Complex32::new(0.0, 0.0); block_size];
        tap_spectrum[..taps.len()].copy_from_slice(taps);
        fft_fwd.process(&mut tap_spectrum);

        OverlapSave {
            block_size,
            shift,
            decimation,
            fft_fwd,
            fft_inv,
            tap_spectrum,
            history: vec![Complex32::new(0.0, 0.0); shift],
            pending: Vec::new(),
        }
    }

    fn reset(&mut self) {
        for h in self.history.iter_mut() {
            *h = Complex32::new(0.0, 0.0);
        }
        self.pending.clear();
    }

    /// Valid (linear-convolution) outputs produced per processed block.
    fn fresh_per_block(&self) -> usize {
        self.block_size - self.shift
    }

    fn process(&mut self, input: &[Complex32]) -> Vec<Complex32> {
        self.pending.extend_from_slice(input);

        let fresh_per_block = self.fresh_per_block();
        let mut output = Vec::new();
        let mut consumed = 0usize;

        while self.pending.len() - consumed >= fresh_per_block {
            let fresh = &self.pending[consumed..consumed + fresh_per_block];

            let mut window = vec![Complex32::new(0.0, 0.0); self.block_size];
            window[..self.shift].copy_from_slice(&self.history);
            window[self.shift..self.shift + fresh.len()].copy_from_slice(fresh);

            self.fft_fwd.process(&mut window);
            for (w, &h) in window.iter_mut().zip(self.tap_spectrum.iter()) {
                *w *= h;
            }
            self.fft_inv.process(&mut window);

            let scale = 1.0 / self.block_size as f32;
            let mut valid_index = 0usize;
            let valid = &window[self.shift..self.block_size];
            while valid_index < valid.len() {
                output.push(valid[valid_index] * scale);
                valid_index += self.decimation;
            }

            self.history.copy_from_slice(fresh[fresh.len() - self.shift..].as_ref());
            consumed += fresh_per_block;
        }

        self.pending.drain(0..consumed);
        output
    }
}

/// Real-tap FFT filter, API-compatible with [`super::fir::Fir<f32>`]:
/// real samples in, real samples out (decimated).
pub struct FftFilter {
    inner: OverlapSave,
}

impl FftFilter {
    pub fn new(taps: Vec<f32>, decimation: usize) -> Self {
        let complex_taps: Vec<Complex32> = taps.into_iter().map(|t| Complex32::new(t, 0.0)).collect();
        FftFilter {
            inner: OverlapSave::new(&complex_taps, decimation),
        }
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let complex_input: Vec<Complex32> = input.iter().map(|&s| Complex32::new(s, 0.0)).collect();
        self.inner.process(&complex_input).into_iter().map(|c| c.re).collect()
    }
}

/// Complex-tap FFT filter translating a real input directly to a
/// frequency-shifted complex (analytic) baseband, in one transform pass
/// -- the FFT-domain equivalent of [`super::fir::HilbertFir`], used when
/// the tap count is large enough that the transform overhead pays off.
/// Build the tap set with [`super::rotator::Rotator::create_taps`] from a
/// real lowpass prototype.
pub struct FftTranslatingFilter {
    inner: OverlapSave,
}

impl FftTranslatingFilter {
    pub fn new(complex_taps: Vec<Complex32>, decimation: usize) -> Self {
        FftTranslatingFilter {
            inner: OverlapSave::new(&complex_taps, decimation),
        }
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<Complex32> {
        let complex_input: Vec<Complex32> = input.iter().map(|&s| Complex32::new(s, 0.0)).collect();
        self.inner.process(&complex_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::fir::{design_lowpass, Fir};

    #[test]
    fn matches_direct_fir_within_tolerance() {
        let sample_rate = 250_000u32;
        let taps = design_lowpass(sample_rate, 10_000.0, 129);

        let mut fir: Fir<f32> = Fir::new(taps.clone(), 1);
        let mut fft = FftFilter::new(taps, 1);

        let n = 4000;
        let input: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                (2.0 * std::f32::consts::PI * 3_000.0 * t).sin()
                    + 0.5 * (2.0 * std::f32::consts::PI * 40_000.0 * t).sin()
            })
            .collect();

        let direct = fir.process(&input);
        let via_fft = fft.process(&input);

        assert_eq!(direct.len(), via_fft.len());
        for (a, b) in direct.iter().zip(via_fft.iter()).skip(500) {
            assert!((a - b).abs() < 1e-2, "direct {a} vs fft {b} diverge");
        }
    }

    #[test]
    fn decimation_matches_direct_fir() {
        let sample_rate = 250_000u32;
        let taps = design_lowpass(sample_rate, 10_000.0, 65);

        let mut fir: Fir<f32> = Fir::new(taps.clone(), 5);
        let mut fft = FftFilter::new(taps, 5);

        let n = 3000;
        let input: Vec<f32> = (0..n).map(|i| (i as f32 * 0.01).sin()).collect();

        let direct = fir.process(&input);
        let via_fft = fft.process(&input);

        let len = direct.len().min(via_fft.len());
        assert!(len > 100);
        for (a, b) in direct[..len].iter().zip(via_fft[..len].iter()).skip(50) {
            assert!((a - b).abs() < 1e-2, "direct {a} vs fft {b} diverge");
        }
    }

    #[test]
    fn translating_filter_shifts_to_target_band() {
        use crate::dsp::rotator::Rotator;

        let sample_rate = 250_000u32;
        let proto = design_lowpass(sample_rate, 500.0, 129);
        let complex_taps = Rotator::create_taps(19_000.0 / sample_rate as f32, &proto);
        let mut filt = FftTranslatingFilter::new(complex_taps, 1);

        let n = 4000;
        let input: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 19_000.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let out = filt.process(&input);
        let tail = &out[1000..];
        let mean_mag: f32 = tail.iter().map(|c| c.norm()).sum::<f32>() / tail.len() as f32;
        assert!(mean_mag > 0.1, "expected energy near the 19 kHz tone, got {mean_mag}");
    }
}
