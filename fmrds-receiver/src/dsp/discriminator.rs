//! FM discriminator: recovers the instantaneous frequency (the composite
//! baseband) from the complex baseband via a delay-and-conjugate phase
//! detector.
//!
//! Ported from `hvylya::filters::fm::FmDecoder`: for each sample, forms
//! `x[n] * conj(x[n-1])`, whose phase is the instantaneous frequency, and
//! reads that phase with the approximate `atan2` scaled so its `[-2, 2)`
//! normalized output maps onto `+-75 kHz` deviation.

use num_complex::Complex32;

use crate::simd::trig::approx_normalized_atan2;

pub struct FmDiscriminator {
    sample_rate: u32,
    last_sample: Complex32,
    has_history: bool,
}

impl FmDiscriminator {
    const FM_BANDWIDTH: f32 = 75_000.0;

    pub fn new(sample_rate: u32) -> Self {
        assert_ne!(sample_rate, 0);
        FmDiscriminator {
            sample_rate,
            last_sample: Complex32::new(0.0, 0.0),
            has_history: false,
        }
    }

    pub fn reset(&mut self) {
        self.last_sample = Complex32::new(0.0, 0.0);
        self.has_history = false;
    }

    pub fn process(&mut self, input: &[Complex32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }

        // The approximate atan2's normalized output is in [-2, 2)
        // representing [-pi, pi), so the usual `sample_rate / (2*pi*2*bw)`
        // gain collapses to `sample_rate / (4 * bandwidth)`.
        let fm_gain = self.sample_rate as f32 / (4.0 * Self::FM_BANDWIDTH);

        let mut output = Vec::with_capacity(input.len());
        let mut prev = if self.has_history {
            self.last_sample
        } else {
            input[0]
        };
        let start = if self.has_history { 0 } else { 1 };
        if !self.has_history {
            // No history: the first sample has no predecessor to
            // discriminate against, so it's dropped (mirrors the
            // reference's `setHistorySize(1)` input contract).
        }

        for &sample in &input[start..] {
            let diff = sample * prev.conj();
            let freq = approx_normalized_atan2(diff.im, diff.re);
            output.push(fm_gain * freq);
            prev = sample;
        }

        self.last_sample = prev;
        self.has_history = true;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn constant_frequency_tone_yields_constant_output() {
        // A complex tone at a fixed offset frequency has constant
        // instantaneous frequency equal to that offset.
        let sample_rate = 1_000_000;
        let offset = 10_000.0_f32;
        let n = 200;
        let input: Vec<Complex32> = (0..n)
            .map(|i| {
                let phase = 2.0 * PI * offset * (i as f32) / (sample_rate as f32);
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();

        let mut disc = FmDiscriminator::new(sample_rate);
        let out = disc.process(&input);
        // Skip the first few samples (approx-atan2 settling) and check
        // later samples cluster near a single value.
        let tail = &out[50..];
        let mean = tail.iter().sum::<f32>() / tail.len() as f32;
        for &v in tail {
            assert!((v - mean).abs() < 0.05 * mean.abs().max(1.0));
        }
    }
}
